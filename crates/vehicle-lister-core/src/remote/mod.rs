//! Remote catalog source.
//!
//! The remote side is a document collection service queried read-only. Every
//! query may legitimately return nothing; a failed query always surfaces as a
//! `RemoteError` so callers can tell "no data" from "fetch failed".
//!
//! - `RemoteSource`: the query verbs the core consumes
//! - `FirestoreClient`: implementation over the Firestore REST API
//! - `AssetFetcher` / `HttpAssetFetcher`: chassis picture downloads

pub mod assets;
pub mod client;
pub mod error;
pub mod firestore;

pub use assets::{AssetFetcher, HttpAssetFetcher};
pub use client::FirestoreClient;
pub use error::{AssetError, RemoteError};

use std::ops::RangeInclusive;

use async_trait::async_trait;
use rand::Rng;

use crate::models::{Car, Chassis};

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Default bounds for random car sampling. The catalog's `carIndex` space is
/// sparse, so a sample picks the first car at or after a random index.
pub const SAMPLE_INDEX_RANGE: RangeInclusive<u32> = 1..=20_000;

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// First car with `car_index >= min_index`, ascending by `car_index`.
    async fn first_car_from(&self, min_index: u32) -> RemoteResult<Option<Car>>;

    /// Chassis whose `chassis_index` is in `indexes`, ordered by name.
    async fn chassis_by_indexes(&self, indexes: &[u32]) -> RemoteResult<Vec<Chassis>>;

    /// Chassis of one brand (exact match), ordered by name.
    async fn chassis_by_brand(&self, brand: &str) -> RemoteResult<Vec<Chassis>>;

    /// Cars of one chassis (exact name match), ordered by engine.
    async fn cars_by_chassis(&self, chassis: &str) -> RemoteResult<Vec<Car>>;
}

/// Draw `count` independent sample start indexes from `range`.
pub fn random_sample_indexes(count: usize, range: RangeInclusive<u32>) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(range.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sample_indexes_within_range() {
        let indexes = random_sample_indexes(500, SAMPLE_INDEX_RANGE);
        assert_eq!(indexes.len(), 500);
        assert!(indexes.iter().all(|i| SAMPLE_INDEX_RANGE.contains(i)));
    }

    #[test]
    fn test_random_sample_degenerate_range() {
        assert_eq!(random_sample_indexes(3, 7..=7), vec![7, 7, 7]);
        assert!(random_sample_indexes(0, SAMPLE_INDEX_RANGE).is_empty());
    }
}
