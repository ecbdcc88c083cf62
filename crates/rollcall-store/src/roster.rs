//! Enrolled students. The identifier is the identity key; the name is for
//! display and may change.

use crate::{Result, StoreError};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub name: String,
    pub identifier: String,
}

pub struct Roster<'a> {
    conn: &'a Connection,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl<'a> Roster<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Enroll a student. Returns `false` if the identifier is already taken.
    pub fn add(&self, name: &str, identifier: &str) -> Result<bool> {
        match self.conn.execute(
            "INSERT INTO students (name, identifier) VALUES (?1, ?2)",
            params![name, identifier],
        ) {
            Ok(_) => {
                tracing::info!(name, identifier, "student added");
                Ok(true)
            }
            Err(err) if is_constraint_violation(&err) => {
                tracing::warn!(name, identifier, "duplicate identifier");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns whether a student was removed.
    pub fn remove(&self, identifier: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM students WHERE identifier = ?1", params![identifier])?;
        tracing::info!(identifier, removed, "student removed");
        Ok(removed > 0)
    }

    /// Rename and/or re-key a student.
    ///
    /// Returns `false` if `new_identifier` belongs to someone else.
    pub fn update(&self, old_identifier: &str, new_name: &str, new_identifier: &str) -> Result<bool> {
        match self.conn.execute(
            "UPDATE students SET name = ?1, identifier = ?2 WHERE identifier = ?3",
            params![new_name, new_identifier, old_identifier],
        ) {
            Ok(0) => Err(StoreError::StudentNotFound(old_identifier.to_string())),
            Ok(_) => {
                tracing::info!(old_identifier, new_name, new_identifier, "student updated");
                Ok(true)
            }
            Err(err) if is_constraint_violation(&err) => {
                tracing::warn!(old_identifier, new_identifier, "duplicate identifier");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn get(&self, identifier: &str) -> Result<Option<Student>> {
        Ok(self
            .conn
            .query_row(
                "SELECT name, identifier FROM students WHERE identifier = ?1",
                params![identifier],
                |row| Ok(Student { name: row.get(0)?, identifier: row.get(1)? }),
            )
            .optional()?)
    }

    /// Every student, sorted by name.
    pub fn list_all(&self) -> Result<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, identifier FROM students ORDER BY name, identifier")?;
        let students = stmt
            .query_map([], |row| Ok(Student { name: row.get(0)?, identifier: row.get(1)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(students)
    }
}
