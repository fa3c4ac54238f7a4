use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::AssetError;
use crate::config::RemoteConfig;

/// Source of chassis pictures.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, chassis_index: u32) -> Result<Vec<u8>, AssetError>;
}

/// Fetches `<asset-base>/<chassisIndex>.png` over HTTP.
#[derive(Clone)]
pub struct HttpAssetFetcher {
    client: Client,
    base_url: String,
}

impl HttpAssetFetcher {
    pub fn new(config: &RemoteConfig) -> Result<Self, AssetError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.asset_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, chassis_index: u32) -> String {
        format!("{}/{}.png", self.base_url, chassis_index)
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, chassis_index: u32) -> Result<Vec<u8>, AssetError> {
        let url = self.url_for(chassis_index);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AssetError::Status(response.status()));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        debug!(chassis_index, size = bytes.len(), "Chassis picture downloaded");
        Ok(bytes.to_vec())
    }
}
