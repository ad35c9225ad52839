//! State-level baseline tables used by the economic, ecological and
//! equity indices.
//!
//! The tables ship as CSV fixtures embedded at compile time and can be
//! replaced by files named in the configuration. They are loaded once and
//! treated as immutable configuration data.

use anyhow::Context;
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Embedded per-state economics table.
pub static ECONOMICS_CSV: &str = include_str!("../../fixtures/state_economics.csv");

/// Embedded per-state listed-species table.
pub static SPECIES_CSV: &str = include_str!("../../fixtures/state_species.csv");

/// Embedded per-state equity table.
pub static EQUITY_CSV: &str = include_str!("../../fixtures/state_equity.csv");

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StateEconomics {
    pub state: String,
    /// Median owner-occupied home value in dollars.
    pub median_home_value: f64,
    /// Typical price premium of waterfront property, percent.
    pub waterfront_premium_pct: f64,
    /// Share of housing stock near water, 0..1.
    pub proximity_factor: f64,
    /// Multiplier for the water-dependent share of state GDP.
    pub water_gdp_multiplier: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StateSpecies {
    pub state: String,
    /// Threatened and endangered aquatic species.
    pub aquatic_te_count: u32,
    pub total_listed_species: u32,
    pub critical_habitat_count: u32,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StateEquity {
    pub state: String,
    pub low_income_pct: f64,
    pub minority_pct: f64,
    pub linguistic_isolation_pct: f64,
}

/// All three state tables, keyed by upper-case two-letter state code.
#[derive(Debug, Default, Clone)]
pub struct Baselines {
    economics: HashMap<String, StateEconomics>,
    species: HashMap<String, StateSpecies>,
    equity: HashMap<String, StateEquity>,
}

/// Anything keyed by a state code.
trait StateKeyed {
    fn state(&self) -> &str;
}

impl StateKeyed for StateEconomics {
    fn state(&self) -> &str {
        &self.state
    }
}

impl StateKeyed for StateSpecies {
    fn state(&self) -> &str {
        &self.state
    }
}

impl StateKeyed for StateEquity {
    fn state(&self) -> &str {
        &self.state
    }
}

fn parse_table<T>(csv_data: &str, table: &str) -> anyhow::Result<HashMap<String, T>>
where
    T: DeserializeOwned + StateKeyed,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());
    let mut rows = HashMap::new();
    for row in rdr.deserialize::<T>() {
        let row = row.with_context(|| format!("parsing {} table", table))?;
        rows.insert(row.state().to_uppercase(), row);
    }
    log::info!("[WCI] baseline: loaded {} rows into {}", rows.len(), table);
    Ok(rows)
}

impl Baselines {
    /// The tables compiled into the binary.
    pub fn embedded() -> anyhow::Result<Self> {
        Baselines::from_csv(ECONOMICS_CSV, SPECIES_CSV, EQUITY_CSV)
    }

    pub fn from_csv(economics: &str, species: &str, equity: &str) -> anyhow::Result<Self> {
        Ok(Baselines {
            economics: parse_table(economics, "state_economics")?,
            species: parse_table(species, "state_species")?,
            equity: parse_table(equity, "state_equity")?,
        })
    }

    pub fn economics(&self, state: &str) -> Option<&StateEconomics> {
        self.economics.get(&state.to_uppercase())
    }

    pub fn species(&self, state: &str) -> Option<&StateSpecies> {
        self.species.get(&state.to_uppercase())
    }

    pub fn equity(&self, state: &str) -> Option<&StateEquity> {
        self.equity.get(&state.to_uppercase())
    }
}
