//! Session sync: seed the brand catalog, sample the remote catalog, expand
//! the sampled cars into their chassis (with pictures), and derive the
//! active brands the selection starts from.
//!
//! Remote and picture failures are recorded in the report and never abort
//! the run. A local store failure does.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, FuturesUnordered, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::ChassisSummaryCache;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{Brand, Chassis};
use crate::remote::{random_sample_indexes, AssetError, AssetFetcher, RemoteError, RemoteSource};
use crate::store::{LocalStore, StoreResult, BRAND_CATALOG, BRAND_CATALOG_VERSION};
use crate::utils::normalize_key;

/// A non-fatal problem met during a sync.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("Sample query from index {min_index} failed: {reason}")]
    Sample { min_index: u32, reason: String },

    #[error("Chassis lookup failed: {reason}")]
    ChassisLookup { reason: String },

    #[error("Picture for chassis {chassis_index} unavailable: {reason}")]
    Picture { chassis_index: u32, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub online: bool,
    pub queries_issued: usize,
    pub cars_stored: usize,
    pub chassis_stored: usize,
    pub pictures_attached: usize,
    pub failures: Vec<SyncFailure>,
    /// Catalog brands with at least one stored car, in catalog order
    pub active_brands: Vec<Brand>,
}

pub struct SyncPopulator {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteSource>,
    assets: Arc<dyn AssetFetcher>,
    connectivity: ConnectivityMonitor,
    config: SyncConfig,
    timeout: Duration,
    cache: Option<Arc<ChassisSummaryCache>>,
}

impl SyncPopulator {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteSource>,
        assets: Arc<dyn AssetFetcher>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            assets,
            connectivity,
            config,
            timeout,
            cache: None,
        }
    }

    /// Invalidate per-brand listings for brands that gain chassis.
    pub fn with_cache(mut self, cache: Arc<ChassisSummaryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn run(&self) -> StoreResult<SyncReport> {
        let mut report = SyncReport::default();

        self.seed_brands().await?;

        report.online = self.connectivity.is_online();
        if report.online {
            let chassis_indexes = self.sample_cars(&mut report).await?;
            self.expand_chassis(chassis_indexes, &mut report).await?;
            self.store.mark_synced(Utc::now()).await?;
        } else {
            info!("Offline, skipping remote sampling");
        }

        report.active_brands = derive_active_brands(self.store.as_ref()).await?;
        info!(
            online = report.online,
            queries = report.queries_issued,
            cars = report.cars_stored,
            chassis = report.chassis_stored,
            pictures = report.pictures_attached,
            failures = report.failures.len(),
            active_brands = report.active_brands.len(),
            "Sync complete"
        );
        Ok(report)
    }

    /// Rewrite the brand set when it was never seeded or the catalog changed.
    async fn seed_brands(&self) -> StoreResult<()> {
        let version = self.store.catalog_version().await?;
        if version == Some(BRAND_CATALOG_VERSION) {
            return Ok(());
        }
        debug!(?version, current = BRAND_CATALOG_VERSION, "Seeding brand catalog");
        self.store
            .replace_brands(BRAND_CATALOG_VERSION, BRAND_CATALOG)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to seed brand catalog"))
    }

    /// Issue every sample query at once and store cars as they arrive.
    /// Returns the distinct chassis indexes of the stored cars.
    async fn sample_cars(&self, report: &mut SyncReport) -> StoreResult<BTreeSet<u32>> {
        let indexes = random_sample_indexes(self.config.sample_size, self.config.sample_range());
        report.queries_issued = indexes.len();
        debug!(?indexes, "Sampling remote catalog");

        let mut pending: FuturesUnordered<_> = indexes
            .into_iter()
            .map(|min_index| async move {
                let result = tokio::time::timeout(self.timeout, self.remote.first_car_from(min_index))
                    .await
                    .unwrap_or_else(|_| Err(RemoteError::Timeout(self.timeout)));
                (min_index, result)
            })
            .collect();

        let mut chassis_indexes = BTreeSet::new();
        while let Some((min_index, result)) = pending.next().await {
            match result {
                Ok(Some(car)) => {
                    debug!(car_index = car.car_index, brand = %car.brand, "Sampled car");
                    chassis_indexes.insert(car.chassis_index);
                    self.store
                        .upsert_car(car)
                        .await
                        .inspect_err(|e| error!(error = %e, "Failed to store sampled car"))?;
                    report.cars_stored += 1;
                }
                Ok(None) => debug!(min_index, "No car at or after sample index"),
                Err(e) => {
                    warn!(min_index, error = %e, "Sample query failed");
                    report.failures.push(SyncFailure::Sample {
                        min_index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(chassis_indexes)
    }

    /// Look up the sampled chassis in one query and store them with pictures.
    async fn expand_chassis(&self, indexes: BTreeSet<u32>, report: &mut SyncReport) -> StoreResult<()> {
        if indexes.is_empty() {
            return Ok(());
        }
        let indexes: Vec<u32> = indexes.into_iter().collect();

        let lookup = tokio::time::timeout(self.timeout, self.remote.chassis_by_indexes(&indexes))
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.timeout)));
        let chassis = match lookup {
            Ok(chassis) => chassis,
            Err(e) => {
                warn!(count = indexes.len(), error = %e, "Chassis lookup failed");
                report.failures.push(SyncFailure::ChassisLookup { reason: e.to_string() });
                return Ok(());
            }
        };

        let prepared: Vec<StoreResult<(Chassis, Option<SyncFailure>)>> = stream::iter(chassis)
            .map(|chassis| self.attach_picture(chassis))
            .buffer_unordered(self.config.image_concurrency.max(1))
            .collect()
            .await;

        let mut touched_brands = HashSet::new();
        for entry in prepared {
            let (chassis, failure) = entry?;
            if let Some(failure) = failure {
                report.failures.push(failure);
            }
            if chassis.has_picture() {
                report.pictures_attached += 1;
            }
            touched_brands.insert(chassis.brand.clone());
            self.store
                .upsert_chassis(chassis)
                .await
                .inspect_err(|e| error!(error = %e, "Failed to store chassis"))?;
            report.chassis_stored += 1;
        }

        if let Some(cache) = &self.cache {
            for brand in &touched_brands {
                if let Err(e) = cache.invalidate(brand) {
                    warn!(brand, error = %e, "Failed to invalidate summary cache");
                }
            }
        }
        Ok(())
    }

    /// Attach the chassis picture, reusing one already stored. A fetch
    /// failure leaves the chassis without a picture.
    async fn attach_picture(&self, mut chassis: Chassis) -> StoreResult<(Chassis, Option<SyncFailure>)> {
        if !chassis.has_img {
            return Ok((chassis, None));
        }

        let chassis_index = chassis.chassis_index;
        if let Some(stored) = self.store.chassis_by_index(chassis_index).await? {
            if stored.picture.is_some() {
                debug!(chassis_index, "Reusing stored picture");
                chassis.picture = stored.picture;
                return Ok((chassis, None));
            }
        }

        let fetched = tokio::time::timeout(self.timeout, self.assets.fetch(chassis_index))
            .await
            .unwrap_or_else(|_| Err(AssetError::Timeout(self.timeout)))
            .and_then(|bytes| if bytes.is_empty() { Err(AssetError::Empty) } else { Ok(bytes) });

        match fetched {
            Ok(bytes) => {
                debug!(chassis_index, bytes = bytes.len(), "Picture fetched");
                chassis.picture = Some(bytes);
                Ok((chassis, None))
            }
            Err(e) => {
                warn!(chassis_index, error = %e, "Picture fetch failed, storing chassis without it");
                let failure = SyncFailure::Picture {
                    chassis_index,
                    reason: e.to_string(),
                };
                Ok((chassis, Some(failure)))
            }
        }
    }
}

/// Catalog brands whose name (case-insensitive) appears on a stored car,
/// in catalog order.
pub async fn derive_active_brands(store: &dyn LocalStore) -> StoreResult<Vec<Brand>> {
    let car_brands: HashSet<String> = store
        .cars()
        .await?
        .iter()
        .map(|car| normalize_key(&car.brand))
        .collect();

    Ok(store
        .brands()
        .await?
        .into_iter()
        .filter(|brand| car_brands.contains(&normalize_key(&brand.name)))
        .collect())
}
