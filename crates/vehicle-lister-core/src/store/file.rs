//! JSON-file backed implementation of `LocalStore`.
//!
//! All records live in memory behind a `RwLock` with hand-maintained
//! secondary indexes. Every mutation is written through to disk before the
//! lock is released, so a crash never leaves a file half-written (each file
//! is replaced via a temporary sibling and a rename).
//!
//! Layout of the store directory:
//!
//! ```text
//! brands.json
//! chassis.json
//! cars.json
//! meta.json
//! pictures/<chassis_index>.png
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{LocalStore, StoreCounts, StoreError, StoreResult};
use crate::models::{Brand, Car, Chassis};
use crate::utils::normalize_key;

const BRANDS_FILE: &str = "brands.json";
const CHASSIS_FILE: &str = "chassis.json";
const CARS_FILE: &str = "cars.json";
const META_FILE: &str = "meta.json";
const PICTURES_DIR: &str = "pictures";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreMeta {
    catalog_version: Option<u32>,
    last_synced: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    brands: Vec<Brand>,
    brand_by_name: HashMap<String, usize>,
    chassis: BTreeMap<u32, Chassis>,
    chassis_by_brand: HashMap<String, BTreeSet<u32>>,
    cars: BTreeMap<u32, Car>,
    cars_by_chassis: HashMap<String, BTreeSet<u32>>,
    meta: StoreMeta,
}

impl StoreState {
    fn set_brands(&mut self, brands: Vec<Brand>) {
        self.brand_by_name.clear();
        for (pos, brand) in brands.iter().enumerate() {
            // First occurrence wins for duplicate names
            self.brand_by_name
                .entry(normalize_key(&brand.name))
                .or_insert(pos);
        }
        self.brands = brands;
    }

    fn insert_chassis(&mut self, chassis: Chassis) -> Option<Chassis> {
        let previous = self.chassis.remove(&chassis.chassis_index);
        if let Some(ref old) = previous {
            remove_from_index(&mut self.chassis_by_brand, &old.brand, old.chassis_index);
        }
        self.chassis_by_brand
            .entry(normalize_key(&chassis.brand))
            .or_default()
            .insert(chassis.chassis_index);
        self.chassis.insert(chassis.chassis_index, chassis);
        previous
    }

    fn insert_car(&mut self, car: Car) {
        if let Some(old) = self.cars.remove(&car.car_index) {
            remove_from_index(&mut self.cars_by_chassis, &old.chassis, old.car_index);
        }
        self.cars_by_chassis
            .entry(normalize_key(&car.chassis))
            .or_default()
            .insert(car.car_index);
        self.cars.insert(car.car_index, car);
    }
}

fn remove_from_index(index: &mut HashMap<String, BTreeSet<u32>>, key: &str, id: u32) {
    let key = normalize_key(key);
    if let Some(ids) = index.get_mut(&key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(&key);
        }
    }
}

pub struct FileStore {
    dir: Option<PathBuf>,
    state: RwLock<StoreState>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`, loading any persisted records.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(dir.join(PICTURES_DIR))
            .await
            .map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {}", dir.display(), e))
            })?;

        let mut state = StoreState::default();

        let brands: Vec<Brand> = read_json(&dir.join(BRANDS_FILE)).await?.unwrap_or_default();
        state.set_brands(brands);

        let chassis: Vec<Chassis> = read_json(&dir.join(CHASSIS_FILE)).await?.unwrap_or_default();
        for mut c in chassis {
            c.picture = read_picture(&dir, c.chassis_index).await?;
            state.insert_chassis(c);
        }

        let cars: Vec<Car> = read_json(&dir.join(CARS_FILE)).await?.unwrap_or_default();
        for car in cars {
            state.insert_car(car);
        }

        state.meta = read_json(&dir.join(META_FILE)).await?.unwrap_or_default();

        info!(
            dir = %dir.display(),
            brands = state.brands.len(),
            chassis = state.chassis.len(),
            cars = state.cars.len(),
            "Local store opened"
        );

        Ok(Self {
            dir: Some(dir),
            state: RwLock::new(state),
        })
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            state: RwLock::new(StoreState::default()),
        }
    }

    async fn persist<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> StoreResult<()> {
        let Some(ref dir) = self.dir else {
            return Ok(());
        };
        write_json(&dir.join(name), value).await
    }

    async fn persist_picture(&self, chassis_index: u32, picture: Option<&[u8]>) -> StoreResult<()> {
        let Some(ref dir) = self.dir else {
            return Ok(());
        };
        let path = picture_path(dir, chassis_index);
        match picture {
            Some(bytes) => write_atomic(&path, bytes).await,
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::io(&path, e)),
            },
        }
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn replace_brands(&self, version: u32, names: &[&str]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let brands: Vec<Brand> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Brand::new(i as u32, *name))
            .collect();

        self.persist(BRANDS_FILE, &brands).await?;
        let mut meta = state.meta.clone();
        meta.catalog_version = Some(version);
        self.persist(META_FILE, &meta).await?;

        state.set_brands(brands);
        state.meta = meta;
        info!(version, count = names.len(), "Brand catalog seeded");
        Ok(())
    }

    async fn catalog_version(&self) -> StoreResult<Option<u32>> {
        Ok(self.state.read().await.meta.catalog_version)
    }

    async fn brands(&self) -> StoreResult<Vec<Brand>> {
        Ok(self.state.read().await.brands.clone())
    }

    async fn brand_by_name(&self, name: &str) -> StoreResult<Option<Brand>> {
        let state = self.state.read().await;
        Ok(state
            .brand_by_name
            .get(&normalize_key(name))
            .and_then(|&pos| state.brands.get(pos))
            .cloned())
    }

    async fn upsert_chassis(&self, chassis: Chassis) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let chassis_index = chassis.chassis_index;

        // Disk first; memory only changes once every write succeeded
        let picture_changed =
            state.chassis.get(&chassis_index).map(|p| &p.picture) != Some(&chassis.picture);
        if picture_changed {
            self.persist_picture(chassis_index, chassis.picture.as_deref()).await?;
        }
        let all = with_upserted(&state.chassis, chassis_index, &chassis);
        self.persist(CHASSIS_FILE, &all).await?;

        state.insert_chassis(chassis);
        debug!(chassis_index, "Chassis upserted");
        Ok(())
    }

    async fn chassis_by_index(&self, chassis_index: u32) -> StoreResult<Option<Chassis>> {
        Ok(self.state.read().await.chassis.get(&chassis_index).cloned())
    }

    async fn chassis_by_brand(&self, brand: &str) -> StoreResult<Vec<Chassis>> {
        let state = self.state.read().await;
        let mut found: Vec<Chassis> = state
            .chassis_by_brand
            .get(&normalize_key(brand))
            .into_iter()
            .flatten()
            .filter_map(|idx| state.chassis.get(idx).cloned())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn upsert_car(&self, car: Car) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let car_index = car.car_index;
        let all = with_upserted(&state.cars, car_index, &car);
        self.persist(CARS_FILE, &all).await?;
        state.insert_car(car);
        debug!(car_index, "Car upserted");
        Ok(())
    }

    async fn car_by_index(&self, car_index: u32) -> StoreResult<Option<Car>> {
        Ok(self.state.read().await.cars.get(&car_index).cloned())
    }

    async fn cars_by_chassis(&self, chassis: &str) -> StoreResult<Vec<Car>> {
        let state = self.state.read().await;
        let mut found: Vec<Car> = state
            .cars_by_chassis
            .get(&normalize_key(chassis))
            .into_iter()
            .flatten()
            .filter_map(|idx| state.cars.get(idx).cloned())
            .collect();
        found.sort_by(|a, b| a.engine.cmp(&b.engine));
        Ok(found)
    }

    async fn cars(&self) -> StoreResult<Vec<Car>> {
        Ok(self.state.read().await.cars.values().cloned().collect())
    }

    async fn counts(&self) -> StoreResult<StoreCounts> {
        let state = self.state.read().await;
        Ok(StoreCounts {
            brands: state.brands.len(),
            chassis: state.chassis.len(),
            cars: state.cars.len(),
            pictures: state.chassis.values().filter(|c| c.has_picture()).count(),
        })
    }

    async fn mark_synced(&self, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let mut meta = state.meta.clone();
        meta.last_synced = Some(at);
        self.persist(META_FILE, &meta).await?;
        state.meta = meta;
        Ok(())
    }

    async fn last_synced(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.state.read().await.meta.last_synced)
    }
}

/// All records in key order as they will be once `record` is upserted.
fn with_upserted<'a, T>(records: &'a BTreeMap<u32, T>, key: u32, record: &'a T) -> Vec<&'a T> {
    let mut merged: BTreeMap<u32, &T> = records.iter().map(|(k, v)| (*k, v)).collect();
    merged.insert(key, record);
    merged.into_values().collect()
}

fn picture_path(dir: &Path, chassis_index: u32) -> PathBuf {
    dir.join(PICTURES_DIR).join(format!("{}.png", chassis_index))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::corrupt(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn read_picture(dir: &Path, chassis_index: u32) -> StoreResult<Option<Vec<u8>>> {
    let path = picture_path(dir, chassis_index);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(&path, e)),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let contents = serde_json::to_vec_pretty(value).map_err(|e| StoreError::corrupt(path, e))?;
    write_atomic(path, &contents).await
}

async fn write_atomic(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
