//! Local persistent store for offline catalog access.
//!
//! The store owns every persisted `Brand`, `Chassis` and `Car`. It is the
//! cache of record that the selection stages read from, whether or not the
//! remote source is reachable.
//!
//! Indexes:
//! - Brand: by name (case-insensitive)
//! - Chassis: by `chassis_index` (primary), by brand
//! - Car: by `car_index` (primary), by chassis name

pub mod catalog;
pub mod error;
pub mod file;

pub use catalog::{BRAND_CATALOG, BRAND_CATALOG_VERSION};
pub use error::StoreError;
pub use file::FileStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Brand, Car, Chassis};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Record counts per set, used for status display and idempotence checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub brands: usize,
    pub chassis: usize,
    pub cars: usize,
    pub pictures: usize,
}

#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Clear the brand set and rewrite it from `names`, ids assigned in order.
    async fn replace_brands(&self, version: u32, names: &[&str]) -> StoreResult<()>;
    /// Catalog version the brand set was seeded with, None if never seeded.
    async fn catalog_version(&self) -> StoreResult<Option<u32>>;
    async fn brands(&self) -> StoreResult<Vec<Brand>>;
    async fn brand_by_name(&self, name: &str) -> StoreResult<Option<Brand>>;

    async fn upsert_chassis(&self, chassis: Chassis) -> StoreResult<()>;
    async fn chassis_by_index(&self, chassis_index: u32) -> StoreResult<Option<Chassis>>;
    async fn chassis_by_brand(&self, brand: &str) -> StoreResult<Vec<Chassis>>;

    async fn upsert_car(&self, car: Car) -> StoreResult<()>;
    async fn car_by_index(&self, car_index: u32) -> StoreResult<Option<Car>>;
    async fn cars_by_chassis(&self, chassis: &str) -> StoreResult<Vec<Car>>;
    async fn cars(&self) -> StoreResult<Vec<Car>>;

    async fn counts(&self) -> StoreResult<StoreCounts>;
    async fn mark_synced(&self, at: DateTime<Utc>) -> StoreResult<()>;
    async fn last_synced(&self) -> StoreResult<Option<DateTime<Utc>>>;
}
