use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Chassis, ChassisSummary};
use crate::utils::{age_display, normalize_key};

/// Consider a brand listing stale after one day.
pub const DEFAULT_TTL_MINUTES: i64 = 24 * 60;

/// Bump when `ChassisSummary` changes shape; older entries become misses.
pub const SUMMARY_CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u32,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            version: SUMMARY_CACHE_VERSION,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }

    pub fn is_stale(&self, ttl_minutes: i64) -> bool {
        self.age_minutes() > ttl_minutes
    }

    pub fn is_current_version(&self) -> bool {
        self.version == SUMMARY_CACHE_VERSION
    }
}

/// What a cache entry holds: the brand's canonical name and its chassis.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BrandListing {
    brand: String,
    chassis: Vec<ChassisSummary>,
}

pub struct ChassisSummaryCache {
    cache_dir: PathBuf,
    ttl_minutes: i64,
}

impl ChassisSummaryCache {
    pub fn new(cache_dir: PathBuf, ttl_minutes: Option<i64>) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            ttl_minutes: ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
        })
    }

    /// File name for a brand: normalized, with anything outside `[a-z0-9]`
    /// hex-escaped so "ROLLS-ROYCE" and "ROLLS ROYCE" never collide.
    fn cache_path(&self, brand: &str) -> PathBuf {
        let mut name = String::new();
        for b in normalize_key(brand).bytes() {
            if b.is_ascii_alphanumeric() {
                name.push(b as char);
            } else {
                name.push_str(&format!("_{:02x}", b));
            }
        }
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, brand: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(brand);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, brand: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(brand);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Fresh listing for `brand`, expanded into chassis records.
    /// Stale, foreign-version or unreadable entries are misses.
    pub fn get(&self, brand: &str) -> Option<Vec<Chassis>> {
        match self.load::<BrandListing>(brand) {
            Ok(Some(cached)) if !cached.is_current_version() => {
                debug!(brand, version = cached.version, "Summary cache version mismatch");
                None
            }
            Ok(Some(cached)) if cached.is_stale(self.ttl_minutes) => {
                debug!(brand, age = %cached.age_display(), "Summary cache stale");
                None
            }
            Ok(Some(cached)) => {
                let listing = cached.data;
                debug!(brand, count = listing.chassis.len(), "Summary cache hit");
                Some(
                    listing
                        .chassis
                        .into_iter()
                        .map(|summary| summary.into_chassis(&listing.brand))
                        .collect(),
                )
            }
            Ok(None) => None,
            Err(e) => {
                debug!(brand, error = %e, "Failed to load summary cache");
                None
            }
        }
    }

    pub fn put(&self, brand: &str, chassis: &[Chassis]) -> Result<()> {
        let listing = BrandListing {
            brand: chassis
                .first()
                .map(|c| c.brand.clone())
                .unwrap_or_else(|| brand.to_string()),
            chassis: chassis.iter().map(Chassis::summary).collect(),
        };
        self.save(brand, &listing)
    }

    pub fn invalidate(&self, brand: &str) -> Result<()> {
        let path = self.cache_path(brand);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Age label of a brand's listing, or None if absent.
    pub fn age(&self, brand: &str) -> Option<String> {
        match self.load::<serde_json::Value>(brand) {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(brand, error = %e, "Failed to load summary cache for age display");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn e46() -> Chassis {
        Chassis {
            chassis_index: 412,
            brand: "BMW".to_string(),
            name: "3 Series (E46)".to_string(),
            year: "1998/02 - 2005/12 E46".to_string(),
            has_img: true,
            picture: Some(vec![1, 2, 3]),
        }
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale(60));

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale(60));
        assert_eq!(fresh.age_display(), "just now");
    }

    #[test]
    fn test_put_then_get_by_normalized_brand() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChassisSummaryCache::new(dir.path().to_path_buf(), None).unwrap();
        cache.put("BMW", &[e46()]).unwrap();

        let hit = cache.get(" bmw ").expect("normalized key should hit");
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].chassis_index, 412);
        assert_eq!(hit[0].brand, "BMW");
        // Pictures never go into the summary cache
        assert!(hit[0].picture.is_none());
        assert!(cache.age("BMW").is_some());
    }

    #[test]
    fn test_stale_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChassisSummaryCache::new(dir.path().to_path_buf(), Some(0)).unwrap();
        let mut old = CachedData::new(BrandListing {
            brand: "BMW".to_string(),
            chassis: vec![e46().summary()],
        });
        old.cached_at = Utc::now() - Duration::minutes(5);
        std::fs::write(cache.cache_path("BMW"), serde_json::to_string(&old).unwrap()).unwrap();

        assert!(cache.get("BMW").is_none());
    }

    #[test]
    fn test_version_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChassisSummaryCache::new(dir.path().to_path_buf(), None).unwrap();
        let mut foreign = CachedData::new(BrandListing {
            brand: "BMW".to_string(),
            chassis: vec![e46().summary()],
        });
        foreign.version = SUMMARY_CACHE_VERSION + 1;
        std::fs::write(cache.cache_path("BMW"), serde_json::to_string(&foreign).unwrap()).unwrap();

        assert!(cache.get("BMW").is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChassisSummaryCache::new(dir.path().to_path_buf(), None).unwrap();
        cache.put("BMW", &[e46()]).unwrap();
        cache.put("AUDI", &[]).unwrap();

        cache.invalidate("bmw").unwrap();
        assert!(cache.get("BMW").is_none());
        assert!(cache.get("AUDI").is_some());

        cache.clear().unwrap();
        assert!(cache.get("AUDI").is_none());
    }

    #[test]
    fn test_cache_paths_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChassisSummaryCache::new(dir.path().to_path_buf(), None).unwrap();
        assert_ne!(cache.cache_path("ROLLS-ROYCE"), cache.cache_path("ROLLS ROYCE"));
        assert_eq!(cache.cache_path("Rolls-Royce"), cache.cache_path("ROLLS-ROYCE"));
    }
}
