//! Firestore REST client implementing `RemoteSource`.
//!
//! Queries go through the `documents:runQuery` endpoint with structured
//! queries; rate-limited responses are retried with exponential backoff.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::firestore::{decode_documents, integer_value, string_value, Direction, StructuredQuery, MAX_IN_VALUES};
use super::{RemoteError, RemoteResult, RemoteSource};
use crate::config::RemoteConfig;
use crate::models::{Car, Chassis};

// ============================================================================
// Constants
// ============================================================================

const CARS_COLLECTION: &str = "cars";
const CHASSIS_COLLECTION: &str = "chassis";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Firestore client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    base_url: String,
    project_id: String,
    api_key: Option<String>,
}

impl FirestoreClient {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.firestore_base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn run_query_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents:runQuery",
            self.base_url, self.project_id
        )
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> RemoteResult<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::from_status(status, &body))
        }
    }

    async fn run_query<T: serde::de::DeserializeOwned>(
        &self,
        query: &StructuredQuery,
    ) -> RemoteResult<Vec<T>> {
        let url = self.run_query_url();
        let body = query.to_body();
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.post(&url).json(&body);
            if let Some(ref key) = self.api_key {
                request = request.query(&[("key", key.as_str())]);
            }
            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    warn!(url = %url, "Firestore query timed out");
                }
                RemoteError::NetworkError(e)
            })?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return decode_documents(&text);
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(RemoteError::RateLimited);
                    }
                    warn!(retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl RemoteSource for FirestoreClient {
    async fn first_car_from(&self, min_index: u32) -> RemoteResult<Option<Car>> {
        let query = StructuredQuery::collection(CARS_COLLECTION)
            .where_gte("carIndex", integer_value(min_index.into()))
            .order_by("carIndex", Direction::Ascending)
            .limit(1);
        let cars: Vec<Car> = self.run_query(&query).await?;
        debug!(min_index, found = cars.len(), "Sample car query finished");
        Ok(cars.into_iter().next())
    }

    async fn chassis_by_indexes(&self, indexes: &[u32]) -> RemoteResult<Vec<Chassis>> {
        let unique: Vec<u32> = indexes.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let mut found = Vec::new();

        for chunk in unique.chunks(MAX_IN_VALUES) {
            let values = chunk.iter().map(|&i| integer_value(i.into())).collect();
            let query = StructuredQuery::collection(CHASSIS_COLLECTION)
                .where_in("chassisIndex", values)
                .order_by("name", Direction::Ascending);
            let mut batch: Vec<Chassis> = self.run_query(&query).await?;
            found.append(&mut batch);
        }

        // Chunks are each ordered; the merged result must be too
        found.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(requested = unique.len(), found = found.len(), "Chassis membership query finished");
        Ok(found)
    }

    async fn chassis_by_brand(&self, brand: &str) -> RemoteResult<Vec<Chassis>> {
        let query = StructuredQuery::collection(CHASSIS_COLLECTION)
            .where_eq("brand", string_value(brand))
            .order_by("name", Direction::Ascending);
        self.run_query(&query).await
    }

    async fn cars_by_chassis(&self, chassis: &str) -> RemoteResult<Vec<Car>> {
        let query = StructuredQuery::collection(CARS_COLLECTION)
            .where_eq("chassis", string_value(chassis))
            .order_by("engine", Direction::Ascending);
        self.run_query(&query).await
    }
}
