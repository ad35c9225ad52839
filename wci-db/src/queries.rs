//! Source-cache lookups backed by the SQLite tables.
//!
//! # Neighbourhood Convention
//!
//! Coordinate lookups return every record whose grid cell lies in the 3×3
//! block centred on the query point's cell. With 0.1° cells that is roughly
//! a 30 km square at mid latitudes. Results are in load order.

use crate::schema::grid_cell;
use crate::Database;
use rusqlite::{params, Connection, Row};
use wci_core::bundle::{DrinkingWaterRecords, PermitRecords};
use wci_core::records::{
    AssessmentCategory, DmrRecord, DrinkingWaterEnforcement, DrinkingWaterSystem,
    DrinkingWaterViolation, EnforcementAction, Inspection, Permit, PermitViolation, TmdlStatus,
    WaterQualitySample, WaterSource, Waterbody,
};
use wci_core::source::SourceCaches;

/// 3×3 block filter; `?1` and `?2` are the centre cell.
const BLOCK: &str = "cell_lat BETWEEN ?1 - 1 AND ?1 + 1 AND cell_lng BETWEEN ?2 - 1 AND ?2 + 1";

/// Run `sql` with the centre cell bound and map every row.
fn query_block<T, F>(conn: &Connection, sql: &str, cell: (i64, i64), map: F) -> anyhow::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![cell.0, cell.1], map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    /// Water-quality samples in the 3×3 block around a coordinate.
    pub fn query_samples_near(&self, lat: f64, lng: f64) -> anyhow::Result<Vec<WaterQualitySample>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT station_id, state, lat, lng, date, parameter, value, unit
             FROM wq_samples WHERE {} ORDER BY rowid",
            BLOCK
        );
        let rows = query_block(&conn, &sql, grid_cell(lat, lng), |row| {
            Ok(WaterQualitySample {
                station_id: row.get(0)?,
                state: row.get(1)?,
                lat: row.get(2)?,
                lng: row.get(3)?,
                date: row.get(4)?,
                parameter: row.get(5)?,
                value: row.get(6)?,
                unit: row.get(7)?,
            })
        })?;
        log::debug!("[WCI] query: samples near ({}, {}) returned {} records", lat, lng, rows.len());
        Ok(rows)
    }

    /// Permits in the 3×3 block plus all of their child records.
    pub fn query_permits_near(&self, lat: f64, lng: f64) -> anyhow::Result<PermitRecords> {
        let conn = self.conn()?;
        let cell = grid_cell(lat, lng);
        let parents = format!("SELECT permit_id FROM permits WHERE {}", BLOCK);

        let permits = query_block(
            &conn,
            &format!(
                "SELECT permit_id, facility_name, state, lat, lng, design_flow_mgd
                 FROM permits WHERE {} ORDER BY rowid",
                BLOCK
            ),
            cell,
            |row| {
                Ok(Permit {
                    permit_id: row.get(0)?,
                    facility_name: row.get(1)?,
                    state: row.get(2)?,
                    lat: row.get(3)?,
                    lng: row.get(4)?,
                    design_flow_mgd: row.get(5)?,
                })
            },
        )?;
        let violations = query_block(
            &conn,
            &format!(
                "SELECT permit_id, date, violation_code, rnc FROM permit_violations
                 WHERE permit_id IN ({}) ORDER BY rowid",
                parents
            ),
            cell,
            |row| {
                Ok(PermitViolation {
                    permit_id: row.get(0)?,
                    date: row.get(1)?,
                    violation_code: row.get(2)?,
                    rnc: row.get(3)?,
                })
            },
        )?;
        let dmrs = query_block(
            &conn,
            &format!(
                "SELECT permit_id, date, parameter, value, limit_value FROM dmr_records
                 WHERE permit_id IN ({}) ORDER BY rowid",
                parents
            ),
            cell,
            |row| {
                Ok(DmrRecord {
                    permit_id: row.get(0)?,
                    date: row.get(1)?,
                    parameter: row.get(2)?,
                    value: row.get(3)?,
                    limit: row.get(4)?,
                })
            },
        )?;
        let enforcement = query_block(
            &conn,
            &format!(
                "SELECT permit_id, date, action_type, penalty FROM enforcement_actions
                 WHERE permit_id IN ({}) ORDER BY rowid",
                parents
            ),
            cell,
            |row| {
                Ok(EnforcementAction {
                    permit_id: row.get(0)?,
                    date: row.get(1)?,
                    action_type: row.get(2)?,
                    penalty: row.get(3)?,
                })
            },
        )?;
        let inspections = query_block(
            &conn,
            &format!(
                "SELECT permit_id, date, compliant FROM inspections
                 WHERE permit_id IN ({}) ORDER BY rowid",
                parents
            ),
            cell,
            |row| {
                Ok(Inspection {
                    permit_id: row.get(0)?,
                    date: row.get(1)?,
                    compliant: row.get(2)?,
                })
            },
        )?;

        log::debug!(
            "[WCI] query: permits near ({}, {}) returned {} permits, {} violations, {} DMRs",
            lat,
            lng,
            permits.len(),
            violations.len(),
            dmrs.len()
        );
        Ok(PermitRecords {
            permits,
            violations,
            dmrs,
            enforcement,
            inspections,
        })
    }

    /// Drinking-water systems in the 3×3 block plus their violations and
    /// enforcement actions.
    pub fn query_drinking_water_near(&self, lat: f64, lng: f64) -> anyhow::Result<DrinkingWaterRecords> {
        let conn = self.conn()?;
        let cell = grid_cell(lat, lng);
        let parents = format!("SELECT pwsid FROM dw_systems WHERE {}", BLOCK);

        let systems = query_block(
            &conn,
            &format!(
                "SELECT pwsid, name, state, lat, lng, population_served, source
                 FROM dw_systems WHERE {} ORDER BY rowid",
                BLOCK
            ),
            cell,
            |row| {
                let population: i64 = row.get(5)?;
                let source: String = row.get(6)?;
                Ok(DrinkingWaterSystem {
                    pwsid: row.get(0)?,
                    name: row.get(1)?,
                    state: row.get(2)?,
                    lat: row.get(3)?,
                    lng: row.get(4)?,
                    population_served: population.max(0) as u64,
                    source: WaterSource::from_code(&source),
                })
            },
        )?;
        let violations = query_block(
            &conn,
            &format!(
                "SELECT pwsid, date, violation_code, major, health_based FROM dw_violations
                 WHERE pwsid IN ({}) ORDER BY rowid",
                parents
            ),
            cell,
            |row| {
                Ok(DrinkingWaterViolation {
                    pwsid: row.get(0)?,
                    date: row.get(1)?,
                    violation_code: row.get(2)?,
                    major: row.get(3)?,
                    health_based: row.get(4)?,
                })
            },
        )?;
        let enforcement = query_block(
            &conn,
            &format!(
                "SELECT pwsid, date, action_type FROM dw_enforcement
                 WHERE pwsid IN ({}) ORDER BY rowid",
                parents
            ),
            cell,
            |row| {
                Ok(DrinkingWaterEnforcement {
                    pwsid: row.get(0)?,
                    date: row.get(1)?,
                    action_type: row.get(2)?,
                })
            },
        )?;

        Ok(DrinkingWaterRecords {
            systems,
            violations,
            enforcement,
        })
    }

    /// Every waterbody assessed in `state`, case-insensitive.
    pub fn query_waterbodies_in_state(&self, state: &str) -> anyhow::Result<Vec<Waterbody>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT assessment_unit_id, name, state, huc12, water_type, category,
                    tmdl_status, causes, assessed_on
             FROM waterbodies WHERE state = ?1 ORDER BY assessment_unit_id",
        )?;
        let rows = stmt
            .query_map(params![state.trim().to_uppercase()], |row| {
                let category: String = row.get(5)?;
                let tmdl: String = row.get(6)?;
                let causes: String = row.get(7)?;
                Ok(Waterbody {
                    assessment_unit_id: row.get(0)?,
                    name: row.get(1)?,
                    state: row.get(2)?,
                    huc12: row.get(3)?,
                    water_type: row.get(4)?,
                    category: AssessmentCategory::from_code(&category),
                    tmdl_status: TmdlStatus::from_code(&tmdl),
                    causes: causes
                        .split(';')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .collect(),
                    assessed_on: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("[WCI] query: waterbodies in {} returned {} records", state, rows.len());
        Ok(rows)
    }
}

impl SourceCaches for Database {
    fn water_quality_near(&self, lat: f64, lng: f64) -> anyhow::Result<Vec<WaterQualitySample>> {
        self.query_samples_near(lat, lng)
    }

    fn permits_near(&self, lat: f64, lng: f64) -> anyhow::Result<PermitRecords> {
        self.query_permits_near(lat, lng)
    }

    fn drinking_water_near(&self, lat: f64, lng: f64) -> anyhow::Result<DrinkingWaterRecords> {
        self.query_drinking_water_near(lat, lng)
    }

    fn waterbodies_in_state(&self, state: &str) -> anyhow::Result<Vec<Waterbody>> {
        self.query_waterbodies_in_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Helper to create a database with two facilities: one near Baltimore,
    /// one ~1° away.
    fn sample_db() -> Database {
        let db = Database::new().unwrap();
        db.load_samples(
            "\
station_id,state,lat,lng,date,parameter,value,unit
NEAR-1,MD,39.31,-76.61,2024-05-01,Phosphorus,0.12,mg/l
EDGE-1,PA,39.42,-76.52,2024-05-01,Phosphorus,0.30,mg/l
FAR-1,MD,38.30,-76.61,2024-05-01,Phosphorus,0.50,mg/l
",
        )
        .unwrap();
        db.load_permits(
            "\
permit_id,facility_name,state,lat,lng,design_flow_mgd
MD0021555,Back River WWTP,MD,39.29,-76.55,180
MD0021601,Patapsco WWTP,MD,38.20,-76.55,73
",
        )
        .unwrap();
        db.load_permit_violations(
            "\
permit_id,date,violation_code,rnc
MD0021555,2024-02-01,E90,Y
MD0021601,2024-02-01,E90,N
",
        )
        .unwrap();
        db.load_inspections("permit_id,date,compliant\nMD0021555,2024-01-15,N\n")
            .unwrap();
        db.load_dw_systems(
            "\
pwsid,name,state,lat,lng,population_served,source
MD0300002,Baltimore City,MD,39.30,-76.60,1600000,SW
MD0100001,Far Town,MD,37.00,-76.60,1500,GW
",
        )
        .unwrap();
        db.load_dw_violations(
            "\
pwsid,date,violation_code,major,health_based
MD0300002,2024-03-01,02,true,true
MD0100001,2024-03-01,02,false,false
",
        )
        .unwrap();
        db.load_waterbodies(
            "\
assessment_unit_id,name,state,huc12,water_type,category,tmdl_status,causes,assessed_on
MD-02060003-1,Back River,MD,020600030101,ESTUARY,5,Needed,Nitrogen; Phosphorus,2022-04-01
MD-02130903-1,Patapsco,MD,021309030101,RIVER,4a,Completed,Sediment,
VA-02070010-1,Potomac,VA,020700100101,RIVER,2,,,
",
        )
        .unwrap();
        db
    }

    #[test]
    fn samples_cover_three_by_three_block() {
        let db = sample_db();
        let samples = db.query_samples_near(39.35, -76.55).unwrap();
        let ids: Vec<&str> = samples.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["NEAR-1", "EDGE-1"]);
        assert_eq!(samples[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn permit_children_follow_parents() {
        let db = sample_db();
        let records = db.query_permits_near(39.35, -76.55).unwrap();
        assert_eq!(records.permits.len(), 1);
        assert_eq!(records.permits[0].permit_id, "MD0021555");
        assert_eq!(records.violations.len(), 1);
        assert!(records.violations[0].rnc);
        assert_eq!(records.inspections.len(), 1);
        assert!(!records.inspections[0].compliant);
        assert!(records.dmrs.is_empty());
    }

    #[test]
    fn drinking_water_near() {
        let db = sample_db();
        let records = db.query_drinking_water_near(39.35, -76.55).unwrap();
        assert_eq!(records.systems.len(), 1);
        assert_eq!(records.systems[0].population_served, 1_600_000);
        assert_eq!(records.systems[0].source, WaterSource::SurfaceWater);
        assert_eq!(records.violations.len(), 1);
        assert!(records.violations[0].health_based);
    }

    #[test]
    fn waterbodies_by_state() {
        let db = sample_db();
        let md = db.query_waterbodies_in_state("md").unwrap();
        assert_eq!(md.len(), 2);
        assert_eq!(md[0].category, AssessmentCategory::Cat5);
        assert_eq!(md[0].causes, vec!["Nitrogen", "Phosphorus"]);
        assert!(md[0].is_coastal());
        assert_eq!(md[1].tmdl_status, TmdlStatus::Completed);
        assert_eq!(md[1].assessed_on, None);
        assert!(db.query_waterbodies_in_state("DE").unwrap().is_empty());
    }

    #[test]
    fn empty_database_returns_nothing() {
        let db = Database::new().unwrap();
        assert!(db.water_quality_near(39.3, -76.6).unwrap().is_empty());
        assert_eq!(db.permits_near(39.3, -76.6).unwrap(), PermitRecords::default());
    }
}
