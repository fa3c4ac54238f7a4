//! Staged brand -> chassis -> car selection.
//!
//! A `Selection` holds a read copy of the tier loaded for the current stage
//! plus the filtered view over it (indices into the tier, so the view is
//! always a subset of what was loaded). Tiers are replaced wholesale on every
//! stage change and never merged.
//!
//! Stage advances are split in two so lookups can run without holding the
//! selection: `begin_advance` issues a `PendingLookup` stamped with a
//! generation number, and `complete` applies a result only if no newer lookup
//! (or back/reset) has happened since. `advance` does both in one call.

pub mod loader;
pub mod stage;

pub use loader::{CarDetail, TierLoader};
pub use stage::Stage;

use thiserror::Error;
use tracing::debug;

use crate::filter::{self, BrandQuery, CarQuery, ChassisQuery, FilterError};
use crate::models::{Brand, Car, Chassis};
use crate::store::StoreError;
use crate::sync::SyncReport;
use crate::utils::{eq_ignore_case, strip_line_breaks};

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Cannot {action} from the {from} stage")]
    IllegalTransition { from: Stage, action: &'static str },

    #[error("{operation} needs the {expected} stage, currently at {actual}")]
    WrongStage {
        operation: &'static str,
        expected: Stage,
        actual: Stage,
    },

    #[error("Lookup result for the {expected} stage was a {actual} tier")]
    TierMismatch { expected: Stage, actual: Stage },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The records loaded for one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier {
    Brands(Vec<Brand>),
    Chassis(Vec<Chassis>),
    Cars(Vec<Car>),
}

impl Tier {
    pub fn stage(&self) -> Stage {
        match self {
            Tier::Brands(_) => Stage::Brand,
            Tier::Chassis(_) => Stage::Chassis,
            Tier::Cars(_) => Stage::Car,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Tier::Brands(b) => b.len(),
            Tier::Chassis(c) => c.len(),
            Tier::Cars(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display label of one record: brand name, chassis name or car engine.
    pub fn label(&self, index: usize) -> Option<&str> {
        match self {
            Tier::Brands(b) => b.get(index).map(|b| b.name.as_str()),
            Tier::Chassis(c) => c.get(index).map(|c| c.name.as_str()),
            Tier::Cars(c) => c.get(index).map(|c| c.engine.as_str()),
        }
    }

    fn iter_labels(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len()).filter_map(move |i| self.label(i))
    }
}

/// What a pending lookup will load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    ChassisOf { brand: String },
    CarsOf { chassis: String },
}

impl LookupTarget {
    pub fn stage(&self) -> Stage {
        match self {
            LookupTarget::ChassisOf { .. } => Stage::Chassis,
            LookupTarget::CarsOf { .. } => Stage::Car,
        }
    }
}

/// An issued stage advance awaiting its tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLookup {
    generation: u64,
    target: LookupTarget,
}

impl PendingLookup {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> &LookupTarget {
        &self.target
    }
}

/// Outcome of completing a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Loaded { stage: Stage, count: usize },
    /// A newer lookup or stage change superseded this one; nothing changed
    Stale,
}

pub struct Selection {
    loader: TierLoader,
    active_brands: Vec<Brand>,
    stage: Stage,
    active_brand: Option<String>,
    active_chassis: Option<String>,
    tier: Tier,
    filtered: Vec<usize>,
    generation: u64,
}

impl Selection {
    /// Start at the brand stage over the brands a completed sync found active.
    pub fn from_report(report: &SyncReport, loader: TierLoader) -> Self {
        let active_brands = report.active_brands.clone();
        let filtered = (0..active_brands.len()).collect();
        Self {
            loader,
            tier: Tier::Brands(active_brands.clone()),
            active_brands,
            stage: Stage::Brand,
            active_brand: None,
            active_chassis: None,
            filtered,
            generation: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn active_brand(&self) -> Option<&str> {
        self.active_brand.as_deref()
    }

    pub fn active_chassis(&self) -> Option<&str> {
        self.active_chassis.as_deref()
    }

    pub fn active_brands(&self) -> &[Brand] {
        &self.active_brands
    }

    pub fn tier(&self) -> &Tier {
        &self.tier
    }

    pub fn filtered_indices(&self) -> &[usize] {
        &self.filtered
    }

    pub fn loader(&self) -> &TierLoader {
        &self.loader
    }

    /// Labels of the filtered view, in tier order.
    pub fn labels(&self) -> Vec<String> {
        self.filtered
            .iter()
            .filter_map(|&i| self.tier.label(i))
            .map(str::to_string)
            .collect()
    }

    /// Cars in the filtered view; empty outside the car stage.
    pub fn filtered_cars(&self) -> Vec<&Car> {
        match &self.tier {
            Tier::Cars(cars) => self.filtered.iter().filter_map(|&i| cars.get(i)).collect(),
            _ => Vec::new(),
        }
    }

    fn target_stage(&self, to: Option<Stage>, action: &'static str) -> Result<Stage, SelectionError> {
        to.filter(|to| Stage::can_transition(self.stage, *to))
            .ok_or(SelectionError::IllegalTransition {
                from: self.stage,
                action,
            })
    }

    /// Issue a stage advance for `label` without loading anything yet.
    /// Any lookup issued earlier becomes stale.
    pub fn begin_advance(&mut self, label: &str) -> Result<PendingLookup, SelectionError> {
        let to = self.target_stage(self.stage.next(), "advance")?;
        let label = strip_line_breaks(label);
        // Prefer the record's own spelling so remote lookups match exactly
        let canonical = self
            .tier
            .iter_labels()
            .find(|name| eq_ignore_case(name, &label))
            .map(str::to_string)
            .unwrap_or(label);

        let target = match to {
            Stage::Chassis => LookupTarget::ChassisOf { brand: canonical },
            _ => LookupTarget::CarsOf { chassis: canonical },
        };

        self.generation += 1;
        debug!(generation = self.generation, ?target, "Lookup issued");
        Ok(PendingLookup {
            generation: self.generation,
            target,
        })
    }

    /// Apply a loaded tier if `pending` is still the latest lookup.
    pub fn complete(&mut self, pending: PendingLookup, tier: Tier) -> Result<Applied, SelectionError> {
        if pending.generation != self.generation {
            debug!(
                generation = pending.generation,
                latest = self.generation,
                "Discarding stale lookup"
            );
            return Ok(Applied::Stale);
        }

        let expected = pending.target.stage();
        if tier.stage() != expected {
            return Err(SelectionError::TierMismatch {
                expected,
                actual: tier.stage(),
            });
        }

        match pending.target {
            LookupTarget::ChassisOf { brand } => {
                self.active_brand = Some(brand);
                self.active_chassis = None;
            }
            LookupTarget::CarsOf { chassis } => {
                self.active_chassis = Some(chassis);
            }
        }
        self.install(tier);
        // Consumed: a second completion for the same generation is stale
        self.generation += 1;
        Ok(Applied::Loaded {
            stage: self.stage,
            count: self.tier.len(),
        })
    }

    /// Advance to the next stage for the selected `label`.
    /// An unknown label yields an empty tier, not an error.
    pub async fn advance(&mut self, label: &str) -> Result<Applied, SelectionError> {
        let pending = self.begin_advance(label)?;
        let tier = self.loader.load(&pending).await?;
        self.complete(pending, tier)
    }

    /// Step back one stage, restoring that stage's full unfiltered tier.
    /// At the brand stage nothing changes, not even the active filter.
    pub async fn retreat(&mut self) -> Result<Stage, SelectionError> {
        if self.stage == Stage::Brand {
            return Ok(Stage::Brand);
        }
        let to = self.target_stage(self.stage.previous(), "go back")?;

        let tier = match to {
            Stage::Chassis => {
                let brand = self.active_brand.clone().unwrap_or_default();
                Tier::Chassis(self.loader.chassis_for_brand(&brand).await?)
            }
            _ => Tier::Brands(self.active_brands.clone()),
        };

        self.generation += 1;
        if to == Stage::Brand {
            self.active_brand = None;
        }
        self.active_chassis = None;
        self.install(tier);
        Ok(self.stage)
    }

    /// Back to the brand stage from anywhere.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.active_brand = None;
        self.active_chassis = None;
        self.install(Tier::Brands(self.active_brands.clone()));
    }

    fn install(&mut self, tier: Tier) {
        self.stage = tier.stage();
        self.filtered = (0..tier.len()).collect();
        self.tier = tier;
    }

    fn wrong_stage(&self, operation: &'static str, expected: Stage) -> SelectionError {
        SelectionError::WrongStage {
            operation,
            expected,
            actual: self.stage,
        }
    }

    /// Narrow the brand view. Returns the number of matches.
    pub fn filter_brands(&mut self, query: &BrandQuery) -> Result<usize, SelectionError> {
        let Tier::Brands(brands) = &self.tier else {
            return Err(self.wrong_stage("Brand filter", Stage::Brand));
        };
        self.filtered = filter::filter_brands(brands, query);
        Ok(self.filtered.len())
    }

    /// Narrow the chassis view. An invalid query keeps the previous view.
    pub fn filter_chassis(&mut self, query: &ChassisQuery) -> Result<usize, SelectionError> {
        let Tier::Chassis(chassis) = &self.tier else {
            return Err(self.wrong_stage("Chassis filter", Stage::Chassis));
        };
        self.filtered = filter::filter_chassis(chassis, query)?;
        Ok(self.filtered.len())
    }

    /// Narrow the car view. An invalid query keeps the previous view.
    pub fn filter_cars(&mut self, query: &CarQuery) -> Result<usize, SelectionError> {
        let Tier::Cars(cars) = &self.tier else {
            return Err(self.wrong_stage("Car filter", Stage::Car));
        };
        self.filtered = filter::filter_cars(cars, query)?;
        Ok(self.filtered.len())
    }

    /// A car with its parent chassis, read from the local store only.
    pub async fn car_detail(&self, car_index: u32) -> Result<Option<CarDetail>, SelectionError> {
        Ok(self.loader.car_detail(car_index).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::store::{FileStore, LocalStore};
    use crate::testing::{car, chassis, FakeRemote};

    fn report(brands: &[&str]) -> SyncReport {
        SyncReport {
            active_brands: brands
                .iter()
                .enumerate()
                .map(|(i, name)| Brand::new(i as u32, *name))
                .collect(),
            ..SyncReport::default()
        }
    }

    async fn seeded_store() -> Arc<FileStore> {
        let store = Arc::new(FileStore::in_memory());
        store.upsert_chassis(chassis(10, "BMW", "3 Series (E46)", false)).await.unwrap();
        store.upsert_chassis(chassis(11, "BMW", "X5 (E53)", false)).await.unwrap();
        store.upsert_chassis(chassis(20, "AUDI", "A4 (B6)", false)).await.unwrap();
        store.upsert_car(car(100, 10, "BMW", "3 Series (E46)")).await.unwrap();
        store.upsert_car(car(101, 10, "BMW", "3 Series (E46)")).await.unwrap();
        store
    }

    async fn selection() -> Selection {
        let store = seeded_store().await;
        Selection::from_report(&report(&["AUDI", "BMW"]), TierLoader::new(store))
    }

    #[tokio::test]
    async fn test_starts_at_brand_stage_with_active_brands() {
        let sel = selection().await;
        assert_eq!(sel.stage(), Stage::Brand);
        assert_eq!(sel.labels(), vec!["AUDI", "BMW"]);
    }

    #[tokio::test]
    async fn test_advance_unknown_brand_yields_empty_tier() {
        let store = Arc::new(FileStore::in_memory());
        let mut sel = Selection::from_report(&report(&["BMW"]), TierLoader::new(store));

        let applied = sel.advance("BMW").await.unwrap();
        assert_eq!(
            applied,
            Applied::Loaded {
                stage: Stage::Chassis,
                count: 0
            }
        );
        assert!(sel.tier().is_empty());
        assert_eq!(sel.active_brand(), Some("BMW"));
    }

    #[tokio::test]
    async fn test_advance_normalizes_label() {
        let mut sel = selection().await;
        sel.advance("bm\r\nw\n").await.unwrap();
        assert_eq!(sel.stage(), Stage::Chassis);
        assert_eq!(sel.active_brand(), Some("BMW"));
        assert_eq!(sel.labels(), vec!["3 Series (E46)", "X5 (E53)"]);

        sel.advance("3 series (e46)").await.unwrap();
        assert_eq!(sel.stage(), Stage::Car);
        assert_eq!(sel.active_chassis(), Some("3 Series (E46)"));
        assert_eq!(sel.filtered_cars().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_lookup_is_discarded() {
        let mut sel = selection().await;
        let first = sel.begin_advance("BMW").unwrap();
        let second = sel.begin_advance("AUDI").unwrap();

        let second_tier = sel.loader().load(&second).await.unwrap();
        let first_tier = sel.loader().load(&first).await.unwrap();

        assert!(matches!(sel.complete(second, second_tier).unwrap(), Applied::Loaded { .. }));
        assert_eq!(sel.complete(first, first_tier).unwrap(), Applied::Stale);
        assert_eq!(sel.active_brand(), Some("AUDI"));
        assert_eq!(sel.labels(), vec!["A4 (B6)"]);
    }

    #[tokio::test]
    async fn test_lookup_stale_after_retreat() {
        let mut sel = selection().await;
        sel.advance("BMW").await.unwrap();
        let pending = sel.begin_advance("X5 (E53)").unwrap();
        sel.retreat().await.unwrap();

        let tier = Tier::Cars(Vec::new());
        assert_eq!(sel.complete(pending, tier).unwrap(), Applied::Stale);
        assert_eq!(sel.stage(), Stage::Brand);
    }

    #[tokio::test]
    async fn test_retreat_at_brand_stage_is_a_no_op() {
        let mut sel = selection().await;
        sel.filter_brands(&BrandQuery { text: "b".to_string() }).unwrap();
        let generation = sel.generation;

        assert_eq!(sel.retreat().await.unwrap(), Stage::Brand);
        assert_eq!(sel.retreat().await.unwrap(), Stage::Brand);
        assert_eq!(sel.stage(), Stage::Brand);
        assert_eq!(sel.labels(), vec!["BMW"]);
        assert_eq!(sel.tier().len(), 2);
        assert_eq!(sel.generation, generation);
    }

    #[tokio::test]
    async fn test_illegal_transitions_leave_state_unchanged() {
        let mut sel = selection().await;
        sel.advance("BMW").await.unwrap();
        sel.advance("3 Series (E46)").await.unwrap();
        let before = sel.labels();
        assert!(sel.advance("engine 100").await.is_err());
        assert_eq!(sel.stage(), Stage::Car);
        assert_eq!(sel.labels(), before);
    }

    #[tokio::test]
    async fn test_retreat_restores_unfiltered_tiers() {
        let mut sel = selection().await;
        sel.advance("BMW").await.unwrap();
        sel.filter_chassis(&ChassisQuery {
            text: "X".to_string(),
            year: String::new(),
        })
        .unwrap();
        assert_eq!(sel.labels(), vec!["X5 (E53)"]);

        sel.advance("X5 (E53)").await.unwrap();
        assert_eq!(sel.retreat().await.unwrap(), Stage::Chassis);
        assert_eq!(sel.labels(), vec!["3 Series (E46)", "X5 (E53)"]);
        assert_eq!(sel.active_chassis(), None);

        sel.filter_chassis(&ChassisQuery {
            text: "3".to_string(),
            year: String::new(),
        })
        .unwrap();
        assert_eq!(sel.retreat().await.unwrap(), Stage::Brand);
        assert_eq!(sel.labels(), vec!["AUDI", "BMW"]);
        assert_eq!(sel.active_brand(), None);
    }

    #[tokio::test]
    async fn test_filter_at_wrong_stage_is_rejected() {
        let mut sel = selection().await;
        let err = sel.filter_cars(&CarQuery::default()).unwrap_err();
        assert!(matches!(
            err,
            SelectionError::WrongStage {
                expected: Stage::Car,
                actual: Stage::Brand,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_year_keeps_previous_view() {
        let mut sel = selection().await;
        sel.advance("BMW").await.unwrap();
        sel.filter_chassis(&ChassisQuery {
            text: "X".to_string(),
            year: String::new(),
        })
        .unwrap();

        let err = sel
            .filter_chassis(&ChassisQuery {
                text: String::new(),
                year: "20".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SelectionError::Filter(FilterError::InvalidYear(_))));
        assert_eq!(sel.labels(), vec!["X5 (E53)"]);
    }

    #[tokio::test]
    async fn test_brand_filter_then_reset() {
        let mut sel = selection().await;
        assert_eq!(sel.filter_brands(&BrandQuery { text: "b".to_string() }).unwrap(), 1);
        sel.advance("BMW").await.unwrap();
        sel.advance("3 Series (E46)").await.unwrap();
        sel.reset();
        assert_eq!(sel.stage(), Stage::Brand);
        assert_eq!(sel.labels(), vec!["AUDI", "BMW"]);
    }

    #[tokio::test]
    async fn test_car_detail_includes_parent_chassis() {
        let store = Arc::new(FileStore::in_memory());
        let mut with_picture = chassis(10, "BMW", "3 Series (E46)", true);
        with_picture.picture = Some(vec![0x89, b'P', b'N', b'G']);
        store.upsert_chassis(with_picture).await.unwrap();
        store.upsert_car(car(100, 10, "BMW", "3 Series (E46)")).await.unwrap();
        let sel = Selection::from_report(&report(&["BMW"]), TierLoader::new(store));

        let detail = sel.car_detail(100).await.unwrap().unwrap();
        assert_eq!(detail.car.engine, "engine 100");
        let parent = detail.chassis.unwrap();
        assert!(parent.has_picture());
        assert!(sel.car_detail(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_fallback_writes_through_when_online() {
        let store = Arc::new(FileStore::in_memory());
        let remote = Arc::new(FakeRemote {
            chassis: vec![chassis(30, "SAAB", "9-3", false)],
            cars: vec![car(300, 30, "SAAB", "9-3")],
            ..FakeRemote::default()
        });
        let monitor = ConnectivityMonitor::new(true);
        let loader = TierLoader::new(store.clone()).with_remote(
            remote,
            monitor.clone(),
            Duration::from_secs(5),
        );
        let mut sel = Selection::from_report(&report(&["SAAB"]), loader);

        sel.advance("SAAB").await.unwrap();
        assert_eq!(sel.labels(), vec!["9-3"]);
        assert_eq!(store.chassis_by_brand("SAAB").await.unwrap().len(), 1);

        monitor.went_offline();
        sel.advance("9-3").await.unwrap();
        assert!(sel.tier().is_empty());

        sel.retreat().await.unwrap();
        monitor.went_online();
        sel.advance("9-3").await.unwrap();
        assert_eq!(sel.filtered_cars().len(), 1);
        assert!(store.car_by_index(300).await.unwrap().is_some());
    }
}
