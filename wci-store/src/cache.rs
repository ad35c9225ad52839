//! Write-through cache over the fast and durable tiers.

use crate::{ObjectStore, Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wci_core::score::{HistoryMap, IndicesMap};

/// Key of the unit → `CompositeResult` document.
pub const INDICES_KEY: &str = "wci/indices.json";
/// Key of the unit → score history document.
pub const HISTORY_KEY: &str = "wci/history.json";

/// Reads the fast tier first and falls back to the durable tier; writes go
/// to both.
///
/// The durable tier is optional so a process without remote credentials
/// still runs against local files.
pub struct DurableCache<F, D> {
    fast: F,
    durable: Option<D>,
}

impl<F: ObjectStore, D: ObjectStore> DurableCache<F, D> {
    pub fn new(fast: F, durable: Option<D>) -> Self {
        if durable.is_none() {
            log::warn!("[WCI] store: no durable tier configured, persisting to {} only", fast.name());
        }
        Self { fast, durable }
    }

    pub fn fast(&self) -> &F {
        &self.fast
    }

    pub fn durable(&self) -> Option<&D> {
        self.durable.as_ref()
    }

    /// Persisted results, empty when neither tier has any.
    pub async fn load_indices(&self) -> Result<IndicesMap> {
        Ok(self.read_through(INDICES_KEY).await?.unwrap_or_default())
    }

    /// Persisted score history, empty when neither tier has any.
    pub async fn load_history(&self) -> Result<HistoryMap> {
        Ok(self.read_through(HISTORY_KEY).await?.unwrap_or_default())
    }

    pub async fn save_indices(&self, indices: &IndicesMap) -> Result<()> {
        self.write_both(INDICES_KEY, indices).await
    }

    pub async fn save_history(&self, history: &HistoryMap) -> Result<()> {
        self.write_both(HISTORY_KEY, history).await
    }

    async fn read_through<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.fast.get(key).await {
            Ok(Some(bytes)) => match decode(key, &bytes) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => log::warn!("[WCI] store: {} copy of {} unreadable: {}", self.fast.name(), key, e),
            },
            Ok(None) => log::debug!("[WCI] store: {} miss for {}", self.fast.name(), key),
            Err(e) => log::warn!("[WCI] store: {} read of {} failed: {}", self.fast.name(), key, e),
        }

        let Some(durable) = &self.durable else {
            return Ok(None);
        };
        let Some(bytes) = durable.get(key).await? else {
            return Ok(None);
        };
        let value = decode(key, &bytes)?;
        log::info!("[WCI] store: warming {} tier with {} from {}", self.fast.name(), key, durable.name());
        if let Err(e) = self.fast.put(key, bytes).await {
            log::warn!("[WCI] store: could not warm {} with {}: {}", self.fast.name(), key, e);
        }
        Ok(Some(value))
    }

    /// Both tiers are attempted even when the first fails; the first error
    /// is returned.
    async fn write_both<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;

        let fast = self.fast.put(key, bytes.clone()).await;
        if let Err(e) = &fast {
            log::warn!("[WCI] store: {} write of {} failed: {}", self.fast.name(), key, e);
        }
        let durable = match &self.durable {
            Some(durable) => {
                let result = durable.put(key, bytes).await;
                if let Err(e) = &result {
                    log::warn!("[WCI] store: {} write of {} failed: {}", durable.name(), key, e);
                }
                result
            }
            None => Ok(()),
        };
        fast.and(durable)
    }
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use chrono::{TimeZone, Utc};
    use wci_core::score::{CompositeResult, IndexScore, IndexSet, ScoreHistoryEntry, Trend};

    fn result(unit: &str, composite: u8) -> CompositeResult {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let score = IndexScore::new(40.0, 70.0, Trend::Stable, 12, now);
        CompositeResult {
            unit: unit.to_string(),
            state: "MD".to_string(),
            indices: IndexSet {
                load_velocity: score.clone(),
                infrastructure_failure: score.clone(),
                permit_risk_exposure: score.clone(),
                watershed_recovery: score.clone(),
                ecological_health: score.clone(),
                per_capita_load: score.clone(),
                waterfront_exposure: score.clone(),
                governance_response: score.clone(),
                ej_vulnerability: score,
            },
            composite,
            composite_confidence: 70,
            coastal: false,
            projection_7d: None,
            projection_30d: None,
            last_calculated: now,
        }
    }

    fn sample_maps() -> (IndicesMap, HistoryMap) {
        let mut indices = IndicesMap::new();
        indices.insert("02060003".to_string(), result("02060003", 44));
        indices.insert("02060004".to_string(), result("02060004", 61));
        let mut history = HistoryMap::new();
        history.insert(
            "02060003".to_string(),
            vec![ScoreHistoryEntry {
                date: Utc.with_ymd_and_hms(2024, 6, 29, 12, 0, 0).unwrap(),
                composite_value: 43,
            }],
        );
        (indices, history)
    }

    #[tokio::test]
    async fn empty_tiers_load_empty_maps() {
        let cache = DurableCache::new(MemoryStore::new(), Some(MemoryStore::new()));
        assert!(cache.load_indices().await.unwrap().is_empty());
        assert!(cache.load_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_writes_both_tiers() {
        let fast = MemoryStore::new();
        let durable = MemoryStore::new();
        let cache = DurableCache::new(fast.clone(), Some(durable.clone()));
        let (indices, history) = sample_maps();
        cache.save_indices(&indices).await.unwrap();
        cache.save_history(&history).await.unwrap();

        assert!(fast.get(INDICES_KEY).await.unwrap().is_some());
        assert!(durable.get(INDICES_KEY).await.unwrap().is_some());
        assert!(fast.get(HISTORY_KEY).await.unwrap().is_some());
        assert!(durable.get(HISTORY_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cold_fast_tier_falls_back_and_warms() {
        let fast = MemoryStore::new();
        let durable = MemoryStore::new();
        let cache = DurableCache::new(fast.clone(), Some(durable.clone()));
        let (indices, history) = sample_maps();
        cache.save_indices(&indices).await.unwrap();
        cache.save_history(&history).await.unwrap();

        fast.clear();
        assert_eq!(cache.load_indices().await.unwrap(), indices);
        assert_eq!(cache.load_history().await.unwrap(), history);
        assert_eq!(fast.len(), 2, "fast tier should be warmed from durable");
    }

    #[tokio::test]
    async fn fast_tier_alone_reproduces_maps() {
        let fast = MemoryStore::new();
        let durable = MemoryStore::new();
        let cache = DurableCache::new(fast.clone(), Some(durable.clone()));
        let (indices, history) = sample_maps();
        cache.save_indices(&indices).await.unwrap();
        cache.save_history(&history).await.unwrap();

        durable.clear();
        assert_eq!(cache.load_indices().await.unwrap(), indices);
        assert_eq!(cache.load_history().await.unwrap(), history);
    }

    #[tokio::test]
    async fn corrupt_fast_copy_falls_back_to_durable() {
        let fast = MemoryStore::new();
        let durable = MemoryStore::new();
        let cache = DurableCache::new(fast.clone(), Some(durable.clone()));
        let (indices, _) = sample_maps();
        cache.save_indices(&indices).await.unwrap();
        fast.put(INDICES_KEY, b"not json".to_vec()).await.unwrap();

        assert_eq!(cache.load_indices().await.unwrap(), indices);
    }

    #[tokio::test]
    async fn works_without_durable_tier() {
        let cache: DurableCache<MemoryStore, MemoryStore> = DurableCache::new(MemoryStore::new(), None);
        let (indices, _) = sample_maps();
        cache.save_indices(&indices).await.unwrap();
        assert_eq!(cache.load_indices().await.unwrap(), indices);
        assert!(cache.durable().is_none());
    }
}
