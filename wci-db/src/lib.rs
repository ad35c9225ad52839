//! In-memory SQLite source caches for watershed scoring.
//!
//! The upstream caches are warmed by a separate process that writes CSV
//! snapshots. This crate loads those snapshots into an in-memory SQLite
//! database and serves the [`SourceCaches`](wci_core::source::SourceCaches)
//! lookups the collector needs.
//!
//! # Architecture
//!
//! - `Arc<Mutex<Connection>>` so one loaded database is shared by every
//!   batch worker thread
//! - Coordinate-keyed tables store a 0.1° grid cell; the 3×3 neighbourhood
//!   expansion is a range query (see [`schema::grid_cell`])
//! - Child tables (violations, DMRs, enforcement, inspections) are returned
//!   for the parents found in the neighbourhood
//!
//! # Usage
//!
//! ```rust
//! use wci_db::Database;
//!
//! let db = Database::new().unwrap();
//! db.load_permits("permit_id,facility_name,state,lat,lng,design_flow_mgd\nMD0021555,Back River WWTP,MD,39.29,-76.55,180\n").unwrap();
//! let records = db.query_permits_near(39.35, -76.55).unwrap();
//! assert_eq!(records.permits.len(), 1);
//! ```

mod loader;
mod queries;
pub mod schema;

pub use loader::SNAPSHOT_FILES;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory SQLite database holding the source-cache snapshots.
///
/// Cheaply cloneable; clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    pub fn new() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a database and load every snapshot in `dir`.
    pub fn open_snapshot_dir(dir: &Path) -> anyhow::Result<Self> {
        let db = Database::new()?;
        db.load_dir(dir)?;
        Ok(db)
    }

    pub(crate) fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }
}
