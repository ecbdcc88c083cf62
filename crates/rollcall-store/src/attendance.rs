//! Per-day attendance ledger.
//!
//! Each `(student, operational day)` pair has at most one record. Writes are
//! a monotone join: `Present` dominates `Absent`, so repeated sessions on the
//! same day can only upgrade a student, never regress them.

use crate::day::operational_day;
use crate::{Result, StoreError};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Present" => Ok(Status::Present),
            "Absent" => Ok(Status::Absent),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub student_name: String,
    pub status: Status,
    pub day: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

/// What [`Attendance::commit_status`] did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    /// First observation of the student for the day.
    Inserted,
    /// Absent → Present; the timestamp moved to the new observation.
    Upgraded,
    Unchanged,
}

impl Transition {
    /// The transition rule, independent of storage.
    pub fn decide(existing: Option<Status>, incoming: Status) -> Self {
        match (existing, incoming) {
            (None, _) => Transition::Inserted,
            (Some(Status::Absent), Status::Present) => Transition::Upgraded,
            (Some(Status::Absent), Status::Absent) => Transition::Unchanged,
            (Some(Status::Present), _) => Transition::Unchanged,
        }
    }
}

/// Outcome of committing one session's worth of statuses.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub applied: Vec<(String, Status, Transition)>,
    pub failed: Vec<(String, Status, StoreError)>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn count(&self, transition: Transition) -> usize {
        self.applied.iter().filter(|(_, _, t)| *t == transition).count()
    }
}

pub struct Attendance<'a> {
    conn: &'a mut Connection,
    offset: FixedOffset,
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl<'a> Attendance<'a> {
    pub(crate) fn new(conn: &'a mut Connection, offset: FixedOffset) -> Self {
        Self { conn, offset }
    }

    /// Record `status` for `student_name` on the operational day containing `now`.
    ///
    /// Idempotent: only a first observation or an Absent → Present upgrade
    /// writes anything. The lookup and the write share one transaction.
    pub fn commit_status(&mut self, student_name: &str, status: Status, now: DateTime<Utc>) -> Result<Transition> {
        let day = operational_day(now, self.offset).format(DAY_FORMAT).to_string();
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, status FROM attendance WHERE name = ?1 AND day = ?2",
                params![student_name, day],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let existing = existing
            .map(|(id, text)| {
                Status::from_str(&text)
                    .map(|s| (id, s))
                    .map_err(|reason| StoreError::Corrupt { table: "attendance", id, reason })
            })
            .transpose()?;

        let transition = Transition::decide(existing.map(|(_, s)| s), status);
        match (transition, existing) {
            (Transition::Inserted, _) => {
                tx.execute(
                    "INSERT INTO attendance (name, status, day, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    params![student_name, status.as_str(), day, format_timestamp(now)],
                )?;
            }
            (Transition::Upgraded, Some((id, _))) => {
                tx.execute(
                    "UPDATE attendance SET status = ?1, timestamp = ?2 WHERE id = ?3",
                    params![Status::Present.as_str(), format_timestamp(now), id],
                )?;
            }
            _ => {}
        }
        tx.commit()?;

        tracing::debug!(student = student_name, %status, %day, ?transition, "attendance committed");
        Ok(transition)
    }

    /// Commit a whole session. Every student is attempted even if some fail.
    pub fn commit_session(&mut self, present: &[String], absent: &[String], now: DateTime<Utc>) -> CommitReport {
        let mut report = CommitReport::default();
        let batch = present
            .iter()
            .map(|n| (n, Status::Present))
            .chain(absent.iter().map(|n| (n, Status::Absent)));

        for (name, status) in batch {
            match self.commit_status(name, status, now) {
                Ok(transition) => report.applied.push((name.clone(), status, transition)),
                Err(err) => {
                    tracing::error!(student = %name, %status, error = %err, "failed to commit attendance");
                    report.failed.push((name.clone(), status, err));
                }
            }
        }

        tracing::info!(
            inserted = report.count(Transition::Inserted),
            upgraded = report.count(Transition::Upgraded),
            unchanged = report.count(Transition::Unchanged),
            failed = report.failed.len(),
            "session committed"
        );
        report
    }

    pub fn record(&self, student_name: &str, day: NaiveDate) -> Result<Option<AttendanceRecord>> {
        let mut records = self.query(
            "SELECT id, name, status, day, timestamp FROM attendance WHERE name = ?1 AND day = ?2",
            params![student_name, day.format(DAY_FORMAT).to_string()],
        )?;
        Ok(records.pop())
    }

    /// All records for `day`, ordered by student name.
    pub fn records_for_day(&self, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        self.query(
            "SELECT id, name, status, day, timestamp FROM attendance WHERE day = ?1 ORDER BY name",
            params![day.format(DAY_FORMAT).to_string()],
        )
    }

    fn query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name, status, day, timestamp)| {
                let corrupt = |reason: String| StoreError::Corrupt { table: "attendance", id, reason };
                Ok(AttendanceRecord {
                    student_name: name,
                    status: status.parse().map_err(corrupt)?,
                    day: NaiveDate::parse_from_str(&day, DAY_FORMAT).map_err(|e| corrupt(e.to_string()))?,
                    recorded_at: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| corrupt(e.to_string()))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }
}
