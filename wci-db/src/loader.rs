//! CSV snapshot loading for the source-cache tables.
//!
//! Every snapshot has a header row. Dates accept `YYYY-MM-DD`, `YYYYMMDD`
//! or an ISO timestamp. Flags accept `Y`/`N`, `true`/`false`, `1`/`0`.
//! Rows with a missing id, an unparseable date or coordinate are skipped and
//! counted.
//!
//! # CSV Formats
//!
//! - **wq_samples**: `station_id,state,lat,lng,date,parameter,value,unit`
//! - **permits**: `permit_id,facility_name,state,lat,lng,design_flow_mgd`
//! - **permit_violations**: `permit_id,date,violation_code,rnc`
//! - **dmr_records**: `permit_id,date,parameter,value,limit`
//! - **enforcement_actions**: `permit_id,date,action_type,penalty`
//! - **inspections**: `permit_id,date,compliant`
//! - **dw_systems**: `pwsid,name,state,lat,lng,population_served,source`
//! - **dw_violations**: `pwsid,date,violation_code,major,health_based`
//! - **dw_enforcement**: `pwsid,date,action_type`
//! - **waterbodies**: `assessment_unit_id,name,state,huc12,water_type,category,tmdl_status,causes,assessed_on`
//!   where `causes` is `;`-separated

use crate::schema::grid_cell;
use crate::Database;
use anyhow::Context;
use chrono::NaiveDate;
use csv::StringRecord;
use rusqlite::{params, Transaction};
use std::path::Path;
use wci_utils::dates::parse_flexible;

/// Snapshot file names, in load order.
pub const SNAPSHOT_FILES: [&str; 10] = [
    "wq_samples.csv",
    "permits.csv",
    "permit_violations.csv",
    "dmr_records.csv",
    "enforcement_actions.csv",
    "inspections.csv",
    "dw_systems.csv",
    "dw_violations.csv",
    "dw_enforcement.csv",
    "waterbodies.csv",
];

fn field(r: &StringRecord, i: usize) -> &str {
    r.get(i).unwrap_or("").trim()
}

fn date_field(r: &StringRecord, i: usize) -> Option<NaiveDate> {
    parse_flexible(field(r, i)).ok()
}

/// Finite numbers only; `NaN` and `inf` count as unparseable.
fn number_field(r: &StringRecord, i: usize) -> Option<f64> {
    field(r, i).parse().ok().filter(|v: &f64| v.is_finite())
}

fn flag_field(r: &StringRecord, i: usize) -> bool {
    matches!(
        field(r, i).to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "t" | "1"
    )
}

/// Run `insert` for every record, inside one transaction.
///
/// `insert` returns `Ok(false)` to skip a row. Returns `(loaded, skipped)`.
fn load_rows<F>(db: &Database, csv_data: &str, table: &str, mut insert: F) -> anyhow::Result<(u32, u32)>
where
    F: FnMut(&Transaction, &StringRecord) -> anyhow::Result<bool>,
{
    let mut conn = db.conn()?;
    let tx = conn.transaction()?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let mut count = 0u32;
    let mut skipped = 0u32;
    for result in rdr.records() {
        let r = result.with_context(|| format!("reading {} row", table))?;
        if insert(&tx, &r)? {
            count += 1;
        } else {
            skipped += 1;
        }
    }
    tx.commit()?;
    log::info!(
        "[WCI] loader: Loaded {} {}, skipped {} invalid",
        count,
        table,
        skipped
    );
    Ok((count, skipped))
}

impl Database {
    /// Load every snapshot found in `dir`. Missing files leave their table
    /// empty.
    pub fn load_dir(&self, dir: &Path) -> anyhow::Result<()> {
        for name in SNAPSHOT_FILES {
            let path = dir.join(name);
            if !path.exists() {
                log::warn!("[WCI] loader: {} not found, table left empty", path.display());
                continue;
            }
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            match name {
                "wq_samples.csv" => self.load_samples(&data)?,
                "permits.csv" => self.load_permits(&data)?,
                "permit_violations.csv" => self.load_permit_violations(&data)?,
                "dmr_records.csv" => self.load_dmr_records(&data)?,
                "enforcement_actions.csv" => self.load_enforcement_actions(&data)?,
                "inspections.csv" => self.load_inspections(&data)?,
                "dw_systems.csv" => self.load_dw_systems(&data)?,
                "dw_violations.csv" => self.load_dw_violations(&data)?,
                "dw_enforcement.csv" => self.load_dw_enforcement(&data)?,
                _ => self.load_waterbodies(&data)?,
            };
        }
        Ok(())
    }

    /// Load water-quality samples. Rows with a non-numeric value are skipped.
    pub fn load_samples(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "wq_samples", |tx, r| {
            let (Some(lat), Some(lng), Some(date), Some(value)) = (
                number_field(r, 2),
                number_field(r, 3),
                date_field(r, 4),
                number_field(r, 6),
            ) else {
                return Ok(false);
            };
            let station_id = field(r, 0);
            if station_id.is_empty() {
                return Ok(false);
            }
            let (cell_lat, cell_lng) = grid_cell(lat, lng);
            tx.execute(
                "INSERT INTO wq_samples
                 (station_id, state, lat, lng, cell_lat, cell_lng, date, parameter, value, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    station_id,
                    field(r, 1).to_uppercase(),
                    lat,
                    lng,
                    cell_lat,
                    cell_lng,
                    date,
                    field(r, 5),
                    value,
                    field(r, 7)
                ],
            )?;
            Ok(true)
        })
    }

    pub fn load_permits(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "permits", |tx, r| {
            let (Some(lat), Some(lng)) = (number_field(r, 3), number_field(r, 4)) else {
                return Ok(false);
            };
            let permit_id = field(r, 0);
            if permit_id.is_empty() {
                return Ok(false);
            }
            let (cell_lat, cell_lng) = grid_cell(lat, lng);
            tx.execute(
                "INSERT OR REPLACE INTO permits
                 (permit_id, facility_name, state, lat, lng, cell_lat, cell_lng, design_flow_mgd)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    permit_id,
                    field(r, 1),
                    field(r, 2).to_uppercase(),
                    lat,
                    lng,
                    cell_lat,
                    cell_lng,
                    number_field(r, 5).unwrap_or(0.0)
                ],
            )?;
            Ok(true)
        })
    }

    pub fn load_permit_violations(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "permit_violations", |tx, r| {
            let (permit_id, Some(date)) = (field(r, 0), date_field(r, 1)) else {
                return Ok(false);
            };
            if permit_id.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO permit_violations (permit_id, date, violation_code, rnc)
                 VALUES (?1, ?2, ?3, ?4)",
                params![permit_id, date, field(r, 2), flag_field(r, 3)],
            )?;
            Ok(true)
        })
    }

    /// Load DMRs. An empty or non-numeric limit is stored as NULL.
    pub fn load_dmr_records(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "dmr_records", |tx, r| {
            let (permit_id, Some(date), Some(value)) =
                (field(r, 0), date_field(r, 1), number_field(r, 3))
            else {
                return Ok(false);
            };
            if permit_id.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO dmr_records (permit_id, date, parameter, value, limit_value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![permit_id, date, field(r, 2), value, number_field(r, 4)],
            )?;
            Ok(true)
        })
    }

    pub fn load_enforcement_actions(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "enforcement_actions", |tx, r| {
            let (permit_id, Some(date)) = (field(r, 0), date_field(r, 1)) else {
                return Ok(false);
            };
            if permit_id.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO enforcement_actions (permit_id, date, action_type, penalty)
                 VALUES (?1, ?2, ?3, ?4)",
                params![permit_id, date, field(r, 2), number_field(r, 3).unwrap_or(0.0)],
            )?;
            Ok(true)
        })
    }

    pub fn load_inspections(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "inspections", |tx, r| {
            let (permit_id, Some(date)) = (field(r, 0), date_field(r, 1)) else {
                return Ok(false);
            };
            if permit_id.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO inspections (permit_id, date, compliant) VALUES (?1, ?2, ?3)",
                params![permit_id, date, flag_field(r, 2)],
            )?;
            Ok(true)
        })
    }

    pub fn load_dw_systems(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "dw_systems", |tx, r| {
            let (Some(lat), Some(lng)) = (number_field(r, 3), number_field(r, 4)) else {
                return Ok(false);
            };
            let pwsid = field(r, 0);
            if pwsid.is_empty() {
                return Ok(false);
            }
            let population: i64 = field(r, 5).parse().unwrap_or(0).max(0);
            let (cell_lat, cell_lng) = grid_cell(lat, lng);
            tx.execute(
                "INSERT OR REPLACE INTO dw_systems
                 (pwsid, name, state, lat, lng, cell_lat, cell_lng, population_served, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    pwsid,
                    field(r, 1),
                    field(r, 2).to_uppercase(),
                    lat,
                    lng,
                    cell_lat,
                    cell_lng,
                    population,
                    field(r, 6)
                ],
            )?;
            Ok(true)
        })
    }

    pub fn load_dw_violations(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "dw_violations", |tx, r| {
            let (pwsid, Some(date)) = (field(r, 0), date_field(r, 1)) else {
                return Ok(false);
            };
            if pwsid.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO dw_violations (pwsid, date, violation_code, major, health_based)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![pwsid, date, field(r, 2), flag_field(r, 3), flag_field(r, 4)],
            )?;
            Ok(true)
        })
    }

    pub fn load_dw_enforcement(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "dw_enforcement", |tx, r| {
            let (pwsid, Some(date)) = (field(r, 0), date_field(r, 1)) else {
                return Ok(false);
            };
            if pwsid.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO dw_enforcement (pwsid, date, action_type) VALUES (?1, ?2, ?3)",
                params![pwsid, date, field(r, 2)],
            )?;
            Ok(true)
        })
    }

    /// Load waterbody assessments. `assessed_on` may be empty.
    pub fn load_waterbodies(&self, csv_data: &str) -> anyhow::Result<(u32, u32)> {
        load_rows(self, csv_data, "waterbodies", |tx, r| {
            let id = field(r, 0);
            if id.is_empty() {
                return Ok(false);
            }
            tx.execute(
                "INSERT OR REPLACE INTO waterbodies
                 (assessment_unit_id, name, state, huc12, water_type, category, tmdl_status, causes, assessed_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    field(r, 1),
                    field(r, 2).to_uppercase(),
                    field(r, 3),
                    field(r, 4),
                    field(r, 5),
                    field(r, 6),
                    field(r, 7),
                    date_field(r, 8)
                ],
            )?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn load_samples_skips_bad_rows() {
        let db = Database::new().unwrap();
        let csv = "\
station_id,state,lat,lng,date,parameter,value,unit
USGS-01589300,md,39.30,-76.70,2024-05-01,Phosphorus,0.12,mg/l
USGS-01589300,MD,39.30,-76.70,20240401,Nitrogen,2.5,mg/l
USGS-01589300,MD,39.30,-76.70,2024-03-01,Phosphorus,---,mg/l
USGS-01589300,MD,,-76.70,2024-03-01,Phosphorus,0.2,mg/l
,MD,39.30,-76.70,2024-03-01,Phosphorus,0.2,mg/l
";
        assert_eq!(db.load_samples(csv).unwrap(), (2, 3));
    }

    #[test]
    fn load_samples_skips_non_finite_values() {
        let db = Database::new().unwrap();
        let csv = "\
station_id,state,lat,lng,date,parameter,value,unit
USGS-01589300,MD,39.35,-76.55,2024-05-01,Phosphorus,0.12,mg/l
USGS-01589300,MD,39.35,-76.55,2024-05-02,Phosphorus,NaN,mg/l
USGS-01589300,MD,39.35,-76.55,2024-05-03,Phosphorus,inf,mg/l
USGS-01589300,MD,NaN,-76.55,2024-05-04,Phosphorus,0.2,mg/l
";
        assert_eq!(db.load_samples(csv).unwrap(), (1, 3));
        let samples = db.query_samples_near(39.35, -76.55).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 0.12);
    }

    #[test]
    fn load_dmr_records_skips_non_finite_values() {
        let db = Database::new().unwrap();
        let (loaded, skipped) = db
            .load_dmr_records(
                "permit_id,date,parameter,value,limit\nMD0021555,2024-02-29,Nitrogen,NaN,4.0\nMD0021555,2024-03-31,Nitrogen,3.5,inf\n",
            )
            .unwrap();
        assert_eq!((loaded, skipped), (1, 1));
        let conn = db.conn().unwrap();
        let null_limits: i64 = conn
            .query_row("SELECT COUNT(*) FROM dmr_records WHERE limit_value IS NULL", [], |row| row.get(0))
            .unwrap();
        assert_eq!(null_limits, 1, "an infinite limit is stored as no limit");
    }

    #[test]
    fn load_flags_and_optional_limits() {
        let db = Database::new().unwrap();
        db.load_permit_violations(
            "permit_id,date,violation_code,rnc\nMD0021555,2024-02-01,E90,Y\nMD0021555,2024-03-01,E90,N\n",
        )
        .unwrap();
        db.load_dmr_records(
            "permit_id,date,parameter,value,limit\nMD0021555,2024-02-29,\"Phosphorus, total [as P]\",1.5,\nMD0021555,2024-03-31,\"Phosphorus, total [as P]\",1.5,1.0\n",
        )
        .unwrap();
        let conn = db.conn().unwrap();
        let rnc: i64 = conn
            .query_row("SELECT SUM(rnc) FROM permit_violations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rnc, 1);
        let null_limits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM dmr_records WHERE limit_value IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(null_limits, 1);
    }

    #[test]
    fn load_dir_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("permits.csv"),
            "permit_id,facility_name,state,lat,lng,design_flow_mgd\nMD0021555,Back River WWTP,MD,39.30,-76.50,180\n",
        )
        .unwrap();
        let db = Database::new().unwrap();
        db.load_dir(dir.path()).unwrap();
        let conn = db.conn().unwrap();
        let permits: i64 = conn
            .query_row("SELECT COUNT(*) FROM permits", [], |row| row.get(0))
            .unwrap();
        assert_eq!(permits, 1);
        let samples: i64 = conn
            .query_row("SELECT COUNT(*) FROM wq_samples", [], |row| row.get(0))
            .unwrap();
        assert_eq!(samples, 0);
    }
}
