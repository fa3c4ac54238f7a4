//! In-crate fakes for the remote and asset boundaries.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::{Car, Chassis};
use crate::remote::{AssetError, AssetFetcher, RemoteError, RemoteResult, RemoteSource};

pub fn car(car_index: u32, chassis_index: u32, brand: &str, chassis: &str) -> Car {
    Car {
        car_index,
        chassis_index,
        brand: brand.to_string(),
        chassis: chassis.to_string(),
        engine: format!("engine {}", car_index),
        engine_code: "M54B30".to_string(),
        year: "2000/01 - 2005/12 XX".to_string(),
        kw: "170".to_string(),
        hp: "231".to_string(),
        fuel: "Petrol".to_string(),
    }
}

pub fn chassis(chassis_index: u32, brand: &str, name: &str, has_img: bool) -> Chassis {
    Chassis {
        chassis_index,
        brand: brand.to_string(),
        name: name.to_string(),
        year: "1998/02 - 2005/12 XX".to_string(),
        has_img,
        picture: None,
    }
}

/// Remote catalog held in memory. Cars are answered by `first_car_from`
/// in ascending index order, like the real collection.
#[derive(Default)]
pub struct FakeRemote {
    pub cars: Vec<Car>,
    pub chassis: Vec<Chassis>,
    pub fail_chassis_lookup: bool,
    /// Every second sample query (the 2nd, 4th, ...) fails with a server error.
    pub fail_alternate_samples: bool,
    pub sample_delay: Option<Duration>,
    pub sample_calls: AtomicUsize,
    pub chassis_calls: AtomicUsize,
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn first_car_from(&self, min_index: u32) -> RemoteResult<Option<Car>> {
        let call = self.sample_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.sample_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_alternate_samples && call % 2 == 1 {
            return Err(RemoteError::ServerError("sampling unavailable".to_string()));
        }
        Ok(self
            .cars
            .iter()
            .filter(|c| c.car_index >= min_index)
            .min_by_key(|c| c.car_index)
            .cloned())
    }

    async fn chassis_by_indexes(&self, indexes: &[u32]) -> RemoteResult<Vec<Chassis>> {
        self.chassis_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_chassis_lookup {
            return Err(RemoteError::ServerError("chassis lookup failed".to_string()));
        }
        let wanted: HashSet<u32> = indexes.iter().copied().collect();
        let mut found: Vec<Chassis> = self
            .chassis
            .iter()
            .filter(|c| wanted.contains(&c.chassis_index))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn chassis_by_brand(&self, brand: &str) -> RemoteResult<Vec<Chassis>> {
        let mut found: Vec<Chassis> =
            self.chassis.iter().filter(|c| c.brand == brand).cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn cars_by_chassis(&self, chassis: &str) -> RemoteResult<Vec<Car>> {
        let mut found: Vec<Car> = self.cars.iter().filter(|c| c.chassis == chassis).cloned().collect();
        found.sort_by(|a, b| a.engine.cmp(&b.engine));
        Ok(found)
    }
}

/// Picture source; indexes without an entry answer 404.
#[derive(Default)]
pub struct FakeAssets {
    pub pictures: HashMap<u32, Vec<u8>>,
    pub calls: Mutex<Vec<u32>>,
}

impl FakeAssets {
    pub fn with(pictures: &[(u32, &[u8])]) -> Self {
        Self {
            pictures: pictures.iter().map(|(idx, bytes)| (*idx, bytes.to_vec())).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AssetFetcher for FakeAssets {
    async fn fetch(&self, chassis_index: u32) -> Result<Vec<u8>, AssetError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(chassis_index);
        }
        self.pictures
            .get(&chassis_index)
            .cloned()
            .ok_or(AssetError::Status(StatusCode::NOT_FOUND))
    }
}
