//! SQL schema for the source-cache tables.
//!
//! Coordinate-keyed tables carry `cell_lat`/`cell_lng`, the 0.1° grid cell
//! of the record, so a neighbourhood lookup is a range scan on an index.
//! Child tables hang off their parent's id.

/// Grid cells per degree.
pub const CELLS_PER_DEGREE: f64 = 10.0;

/// The grid cell holding a coordinate.
pub fn grid_cell(lat: f64, lng: f64) -> (i64, i64) {
    (
        (lat * CELLS_PER_DEGREE).floor() as i64,
        (lng * CELLS_PER_DEGREE).floor() as i64,
    )
}

/// Returns the full SQL schema as a single batch string.
///
/// **Grid-keyed tables:** `wq_samples`, `permits`, `dw_systems`
///
/// **Permit children:** `permit_violations`, `dmr_records`,
/// `enforcement_actions`, `inspections`
///
/// **Drinking-water children:** `dw_violations`, `dw_enforcement`
///
/// **State-keyed:** `waterbodies`
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS wq_samples (
        station_id TEXT NOT NULL,
        state TEXT NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        cell_lat INTEGER NOT NULL,
        cell_lng INTEGER NOT NULL,
        date TEXT NOT NULL,
        parameter TEXT NOT NULL,
        value REAL NOT NULL,
        unit TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_wq_cell ON wq_samples(cell_lat, cell_lng);

    CREATE TABLE IF NOT EXISTS permits (
        permit_id TEXT PRIMARY KEY,
        facility_name TEXT NOT NULL,
        state TEXT NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        cell_lat INTEGER NOT NULL,
        cell_lng INTEGER NOT NULL,
        design_flow_mgd REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_permits_cell ON permits(cell_lat, cell_lng);

    CREATE TABLE IF NOT EXISTS permit_violations (
        permit_id TEXT NOT NULL,
        date TEXT NOT NULL,
        violation_code TEXT NOT NULL,
        rnc INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_violations_permit ON permit_violations(permit_id);

    CREATE TABLE IF NOT EXISTS dmr_records (
        permit_id TEXT NOT NULL,
        date TEXT NOT NULL,
        parameter TEXT NOT NULL,
        value REAL NOT NULL,
        limit_value REAL
    );
    CREATE INDEX IF NOT EXISTS idx_dmr_permit ON dmr_records(permit_id);

    CREATE TABLE IF NOT EXISTS enforcement_actions (
        permit_id TEXT NOT NULL,
        date TEXT NOT NULL,
        action_type TEXT NOT NULL,
        penalty REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_enforcement_permit ON enforcement_actions(permit_id);

    CREATE TABLE IF NOT EXISTS inspections (
        permit_id TEXT NOT NULL,
        date TEXT NOT NULL,
        compliant INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_inspections_permit ON inspections(permit_id);

    CREATE TABLE IF NOT EXISTS dw_systems (
        pwsid TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        state TEXT NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        cell_lat INTEGER NOT NULL,
        cell_lng INTEGER NOT NULL,
        population_served INTEGER NOT NULL,
        source TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dw_systems_cell ON dw_systems(cell_lat, cell_lng);

    CREATE TABLE IF NOT EXISTS dw_violations (
        pwsid TEXT NOT NULL,
        date TEXT NOT NULL,
        violation_code TEXT NOT NULL,
        major INTEGER NOT NULL,
        health_based INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dw_violations_pwsid ON dw_violations(pwsid);

    CREATE TABLE IF NOT EXISTS dw_enforcement (
        pwsid TEXT NOT NULL,
        date TEXT NOT NULL,
        action_type TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dw_enforcement_pwsid ON dw_enforcement(pwsid);

    CREATE TABLE IF NOT EXISTS waterbodies (
        assessment_unit_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        state TEXT NOT NULL,
        huc12 TEXT NOT NULL,
        water_type TEXT NOT NULL,
        category TEXT NOT NULL,
        tmdl_status TEXT NOT NULL,
        causes TEXT NOT NULL,
        assessed_on TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_waterbodies_state ON waterbodies(state);
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema())
            .expect("Schema SQL should be valid");
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        let expected_tables = [
            "wq_samples",
            "permits",
            "permit_violations",
            "dmr_records",
            "enforcement_actions",
            "inspections",
            "dw_systems",
            "dw_violations",
            "dw_enforcement",
            "waterbodies",
        ];

        for table in &expected_tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }

    #[test]
    fn grid_cell_floors_negative_coordinates() {
        assert_eq!(grid_cell(38.95, -76.65), (389, -767));
        assert_eq!(grid_cell(0.05, 0.0), (0, 0));
        assert_eq!(grid_cell(-0.01, 179.99), (-1, 1799));
    }
}
