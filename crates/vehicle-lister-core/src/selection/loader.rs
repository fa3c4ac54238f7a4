//! Tier sources for stage advances.
//!
//! Chassis listings are read through the per-brand summary cache, then the
//! local store. When the store holds nothing for a label and the remote
//! source is reachable, the tier is fetched remotely and written through to
//! the store (and, for chassis, the summary cache).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{LookupTarget, PendingLookup, Tier};
use crate::cache::ChassisSummaryCache;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{Car, Chassis};
use crate::remote::RemoteSource;
use crate::store::{LocalStore, StoreResult};

/// A car together with its parent chassis (and picture, when stored).
#[derive(Debug, Clone)]
pub struct CarDetail {
    pub car: Car,
    pub chassis: Option<Chassis>,
}

#[derive(Clone)]
struct RemoteFallback {
    source: Arc<dyn RemoteSource>,
    connectivity: ConnectivityMonitor,
    timeout: Duration,
}

#[derive(Clone)]
pub struct TierLoader {
    store: Arc<dyn LocalStore>,
    cache: Option<Arc<ChassisSummaryCache>>,
    remote: Option<RemoteFallback>,
}

impl TierLoader {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            cache: None,
            remote: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ChassisSummaryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_remote(
        mut self,
        source: Arc<dyn RemoteSource>,
        connectivity: ConnectivityMonitor,
        timeout: Duration,
    ) -> Self {
        self.remote = Some(RemoteFallback {
            source,
            connectivity,
            timeout,
        });
        self
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    fn online_remote(&self) -> Option<&RemoteFallback> {
        self.remote
            .as_ref()
            .filter(|remote| remote.connectivity.is_online())
    }

    /// Load the tier a pending advance asked for.
    pub async fn load(&self, pending: &PendingLookup) -> StoreResult<Tier> {
        match pending.target() {
            LookupTarget::ChassisOf { brand } => Ok(Tier::Chassis(self.chassis_for_brand(brand).await?)),
            LookupTarget::CarsOf { chassis } => Ok(Tier::Cars(self.cars_for_chassis(chassis).await?)),
        }
    }

    /// Chassis of `brand`, ordered by name. Unknown brands yield an empty tier.
    pub async fn chassis_for_brand(&self, brand: &str) -> StoreResult<Vec<Chassis>> {
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(brand)) {
            return Ok(cached);
        }

        let stored = self.store.chassis_by_brand(brand).await?;
        if !stored.is_empty() {
            self.remember(brand, &stored);
            return Ok(stored);
        }

        let Some(remote) = self.online_remote() else {
            debug!(brand, "No stored chassis and remote unavailable");
            return Ok(Vec::new());
        };

        let fetched =
            match tokio::time::timeout(remote.timeout, remote.source.chassis_by_brand(brand)).await {
                Ok(Ok(chassis)) => chassis,
                Ok(Err(e)) => {
                    warn!(brand, error = %e, "Remote chassis lookup failed");
                    return Ok(Vec::new());
                }
                Err(_) => {
                    warn!(brand, timeout = ?remote.timeout, "Remote chassis lookup timed out");
                    return Ok(Vec::new());
                }
            };

        for chassis in &fetched {
            self.store.upsert_chassis(chassis.clone()).await?;
        }
        if !fetched.is_empty() {
            info!(brand, count = fetched.len(), "Fetched chassis from remote");
            self.remember(brand, &fetched);
        }
        Ok(fetched)
    }

    /// Cars of the chassis named `chassis`, ordered by engine.
    pub async fn cars_for_chassis(&self, chassis: &str) -> StoreResult<Vec<Car>> {
        let stored = self.store.cars_by_chassis(chassis).await?;
        if !stored.is_empty() {
            return Ok(stored);
        }

        let Some(remote) = self.online_remote() else {
            debug!(chassis, "No stored cars and remote unavailable");
            return Ok(Vec::new());
        };

        let fetched =
            match tokio::time::timeout(remote.timeout, remote.source.cars_by_chassis(chassis)).await {
                Ok(Ok(cars)) => cars,
                Ok(Err(e)) => {
                    warn!(chassis, error = %e, "Remote car lookup failed");
                    return Ok(Vec::new());
                }
                Err(_) => {
                    warn!(chassis, timeout = ?remote.timeout, "Remote car lookup timed out");
                    return Ok(Vec::new());
                }
            };

        for car in &fetched {
            self.store.upsert_car(car.clone()).await?;
        }
        if !fetched.is_empty() {
            info!(chassis, count = fetched.len(), "Fetched cars from remote");
        }
        Ok(fetched)
    }

    /// Offline detail view of one car.
    pub async fn car_detail(&self, car_index: u32) -> StoreResult<Option<CarDetail>> {
        let Some(car) = self.store.car_by_index(car_index).await? else {
            return Ok(None);
        };
        let chassis = self.store.chassis_by_index(car.chassis_index).await?;
        Ok(Some(CarDetail { car, chassis }))
    }

    fn remember(&self, brand: &str, chassis: &[Chassis]) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(brand, chassis) {
                warn!(brand, error = %e, "Failed to write summary cache");
            }
        }
    }
}
