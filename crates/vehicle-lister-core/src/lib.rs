//! Offline-first vehicle catalog browsing.
//!
//! A session syncs a small random sample of the remote catalog into the
//! local store, then drills down brand -> chassis -> car with in-memory
//! filters over whatever the store holds.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod filter;
pub mod models;
pub mod remote;
pub mod selection;
pub mod store;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod testing;

pub use cache::ChassisSummaryCache;
pub use config::Config;
pub use connectivity::ConnectivityMonitor;
pub use filter::{BrandQuery, CarQuery, ChassisQuery, FilterError};
pub use models::{Brand, Car, Chassis, YearRange};
pub use selection::{Applied, CarDetail, Selection, SelectionError, Stage, Tier, TierLoader};
pub use store::{FileStore, LocalStore, StoreError};
pub use sync::{SyncFailure, SyncPopulator, SyncReport};
