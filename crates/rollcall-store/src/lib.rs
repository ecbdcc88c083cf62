//! rollcall-store: Durable attendance, roster and image storage.
//!
//! One SQLite file holds three tables (`attendance`, `images`, `students`).
//! They are created if absent every time the store is opened; there are no
//! migrations.

pub mod attendance;
pub mod day;
pub mod export;
pub mod images;
pub mod roster;

pub use attendance::{Attendance, AttendanceRecord, CommitReport, Status, Transition};
pub use day::{operational_day, parse_utc_offset, InvalidOffset};
pub use export::{export_day, ExportError};
pub use images::ImageStore;
pub use roster::{Roster, Student};

use chrono::FixedOffset;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("corrupt {table} row {id}: {reason}")]
    Corrupt {
        table: &'static str,
        id: i64,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('Present', 'Absent')),
    day TEXT NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE UNIQUE INDEX IF NOT EXISTS attendance_name_day ON attendance (name, day);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    image BLOB NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    identifier TEXT NOT NULL UNIQUE
);
";

/// Handle to the attendance database.
///
/// `offset` fixes the civil-time offset used to decide which operational day
/// a timestamp belongs to, independent of the machine's timezone.
pub struct Store {
    conn: Connection,
    offset: FixedOffset,
}

impl Store {
    /// Open (or create) the database file and ensure the tables exist.
    pub fn open(path: &Path, offset: FixedOffset) -> Result<Self> {
        let conn = Connection::open(path).map_err(|err| {
            tracing::error!(path = %path.display(), error = %err, "failed to open database");
            err
        })?;
        tracing::debug!(path = %path.display(), %offset, "database opened");
        Self::bootstrap(conn, offset)
    }

    pub fn open_in_memory(offset: FixedOffset) -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?, offset)
    }

    fn bootstrap(conn: Connection, offset: FixedOffset) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn roster(&self) -> Roster<'_> {
        Roster::new(&self.conn)
    }

    pub fn images(&self) -> ImageStore<'_> {
        ImageStore::new(&self.conn)
    }

    pub fn attendance(&mut self) -> Attendance<'_> {
        Attendance::new(&mut self.conn, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.db");
        let utc = FixedOffset::east_opt(0).unwrap();

        {
            let store = Store::open(&path, utc).unwrap();
            assert!(store.roster().add("Ada", "S1").unwrap());
        }

        let store = Store::open(&path, utc).unwrap();
        assert_eq!(store.roster().list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_open_in_unwritable_location_fails() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let result = Store::open(Path::new("/nonexistent-dir/sub/attendance.db"), utc);
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }
}
