//! TOML configuration.
//!
//! ```toml
//! [paths]
//! centroids_csv = "reference/centroids.csv"
//! adjacency_csv = "reference/adjacency.csv"
//! source_cache_dir = "cache"
//! local_store_dir = "store"
//!
//! [remote]
//! base_url = "https://objects.example.org/watershed"
//! token_env = "WCI_STORE_TOKEN"
//!
//! [batch]
//! batch_size = 10
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wci_core::baseline::Baselines;
use wci_core::unit::GeoReference;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub paths: PathSettings,
    pub remote: RemoteSettings,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    pub centroids_csv: PathBuf,
    pub adjacency_csv: PathBuf,
    /// Directory of source-cache CSV snapshots.
    pub source_cache_dir: PathBuf,
    /// Root of the fast persistence tier; also holds the run lease.
    pub local_store_dir: PathBuf,
    pub economics_csv: Option<PathBuf>,
    pub species_csv: Option<PathBuf>,
    pub equity_csv: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            centroids_csv: PathBuf::from("data/centroids.csv"),
            adjacency_csv: PathBuf::from("data/adjacency.csv"),
            source_cache_dir: PathBuf::from("data/cache"),
            local_store_dir: PathBuf::from("data/store"),
            economics_csv: None,
            species_csv: None,
            equity_csv: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSettings {
    /// Durable object store; no durable tier when unset.
    pub base_url: Option<String>,
    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,
}

impl RemoteSettings {
    pub fn token(&self) -> Option<String> {
        let var = self.token_env.as_deref()?;
        match std::env::var(var) {
            Ok(token) if !token.is_empty() => Some(token),
            _ => {
                log::warn!("[WCI] config: {} is not set, remote requests are unauthenticated", var);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub lock_ttl_secs: u64,
    pub time_budget_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            batch_size: 10,
            lock_ttl_secs: 720,
            time_budget_secs: 600,
        }
    }
}

/// Longest lease a run may take.
pub const MAX_LOCK_TTL_SECS: u64 = 24 * 60 * 60;

impl BatchSettings {
    /// The budget must end before the lease does, or a slow run could
    /// still be writing after another run has taken over.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch.batch_size must be at least 1");
        }
        if self.lock_ttl_secs == 0 || self.lock_ttl_secs > MAX_LOCK_TTL_SECS {
            anyhow::bail!(
                "batch.lock_ttl_secs must be between 1 and {}, got {}",
                MAX_LOCK_TTL_SECS,
                self.lock_ttl_secs
            );
        }
        if self.time_budget_secs >= self.lock_ttl_secs {
            anyhow::bail!(
                "batch.time_budget_secs ({}) must be less than batch.lock_ttl_secs ({})",
                self.time_budget_secs,
                self.lock_ttl_secs
            );
        }
        Ok(())
    }

    pub fn lease_ttl(&self) -> anyhow::Result<chrono::Duration> {
        i64::try_from(self.lock_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| anyhow::anyhow!("batch.lock_ttl_secs {} is out of range", self.lock_ttl_secs))
    }

    pub fn time_budget(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.time_budget_secs)
    }
}

impl Settings {
    /// Read settings from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings = Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("[WCI] config: loaded {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.batch.validate()?;
        Ok(settings)
    }

    pub fn geo_reference(&self) -> anyhow::Result<GeoReference> {
        let centroids = read(&self.paths.centroids_csv)?;
        let adjacency = read(&self.paths.adjacency_csv)?;
        GeoReference::from_csv(&centroids, &adjacency)
    }

    /// Embedded state tables, each replaced by its configured file if set.
    pub fn baselines(&self) -> anyhow::Result<Baselines> {
        let paths = &self.paths;
        if paths.economics_csv.is_none() && paths.species_csv.is_none() && paths.equity_csv.is_none() {
            return Baselines::embedded();
        }
        let economics = read_or(&paths.economics_csv, wci_core::baseline::ECONOMICS_CSV)?;
        let species = read_or(&paths.species_csv, wci_core::baseline::SPECIES_CSV)?;
        let equity = read_or(&paths.equity_csv, wci_core::baseline::EQUITY_CSV)?;
        Baselines::from_csv(&economics, &species, &equity)
    }

    pub fn lease_path(&self) -> PathBuf {
        self.paths.local_store_dir.join("wci").join("run.lock")
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_or(path: &Option<PathBuf>, embedded: &str) -> anyhow::Result<String> {
    match path {
        Some(path) => read(path),
        None => Ok(embedded.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.batch.batch_size, 10);
        assert_eq!(settings.batch.lock_ttl_secs, 720);
        assert_eq!(settings.batch.time_budget_secs, 600);
        assert!(settings.remote.base_url.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            [paths]
            source_cache_dir = "/srv/cache"

            [batch]
            batch_size = 4
            "#,
        )
        .unwrap();
        assert_eq!(settings.paths.source_cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(settings.paths.centroids_csv, PathBuf::from("data/centroids.csv"));
        assert_eq!(settings.batch.batch_size, 4);
        assert_eq!(settings.batch.lock_ttl_secs, 720);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("[batch]\nbatchsize = 3\n").is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(Settings::from_toml("[batch]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn lease_ttl_is_bounded() {
        assert!(Settings::from_toml("[batch]\nlock_ttl_secs = 0\ntime_budget_secs = 0\n").is_err());
        assert!(Settings::from_toml("[batch]\nlock_ttl_secs = 18446744073709551615\n").is_err());
        let settings = Settings::from_toml("[batch]\nlock_ttl_secs = 86400\n").unwrap();
        assert_eq!(settings.batch.lease_ttl().unwrap(), chrono::Duration::days(1));
    }

    #[test]
    fn time_budget_must_end_before_lease() {
        assert!(Settings::from_toml("[batch]\ntime_budget_secs = 720\n").is_err());
        assert!(Settings::from_toml("[batch]\nlock_ttl_secs = 300\n").is_err());
        let settings = Settings::from_toml("[batch]\nlock_ttl_secs = 300\ntime_budget_secs = 240\n").unwrap();
        assert_eq!(settings.batch.time_budget(), std::time::Duration::from_secs(240));
    }

    #[test]
    fn out_of_range_ttl_is_an_error_not_a_panic() {
        let batch = BatchSettings {
            lock_ttl_secs: u64::MAX,
            ..BatchSettings::default()
        };
        assert!(batch.validate().is_err());
        assert!(batch.lease_ttl().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
        assert!(Settings::load(None).is_ok());
    }

    #[test]
    fn baseline_override_replaces_one_table() {
        let dir = tempfile::tempdir().unwrap();
        let species = dir.path().join("species.csv");
        std::fs::write(&species, "state,aquatic_te_count,total_listed_species,critical_habitat_count\nMD,99,120,9\n").unwrap();

        let mut settings = Settings::default();
        settings.paths.species_csv = Some(species);
        let baselines = settings.baselines().unwrap();
        assert_eq!(baselines.species("MD").unwrap().aquatic_te_count, 99);
        assert!(baselines.economics("MD").is_some());
    }

    #[test]
    fn lease_lives_under_local_store() {
        let mut settings = Settings::default();
        settings.paths.local_store_dir = PathBuf::from("/tmp/wci-store");
        assert_eq!(settings.lease_path(), PathBuf::from("/tmp/wci-store/wci/run.lock"));
    }
}
