//! Reading the ledger back: printed reports and xlsx export.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate};
use dialoguer::Input;
use rollcall_core::{compare_by_key, embedded_digits};
use rollcall_store::{export_day, AttendanceRecord, Store};
use std::path::{Path, PathBuf};

/// A day's records in identifier order (`S2` before `S10`).
pub fn day_records(store: &mut Store, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
    let mut records = store
        .attendance()
        .records_for_day(day)
        .with_context(|| format!("reading attendance for {day}"))?;
    records.sort_by(|a, b| compare_by_key(embedded_digits, &a.student_name, &b.student_name));
    Ok(records)
}

pub fn print_report(day: NaiveDate, records: &[AttendanceRecord], offset: FixedOffset, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No attendance recorded for {day}");
        return Ok(());
    }

    let width = records
        .iter()
        .map(|r| r.student_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    println!("{:<width$}  {:<7}  Recorded at", "Name", "Status");
    for record in records {
        let local = record.recorded_at.with_timezone(&offset);
        println!(
            "{:<width$}  {:<7}  {}",
            record.student_name,
            record.status.as_str(),
            local.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn default_export_name(day: NaiveDate) -> String {
    format!("attendance-{day}.xlsx")
}

/// Where to write the workbook: the given path, or ask the operator.
pub fn resolve_export_path(out: Option<PathBuf>, day: NaiveDate) -> Result<PathBuf> {
    if let Some(out) = out {
        return Ok(out);
    }
    let answer: String = Input::new()
        .with_prompt("Save workbook as")
        .default(default_export_name(day))
        .interact_text()
        .context("reading export path")?;
    Ok(PathBuf::from(answer.trim()))
}

pub fn export(path: &Path, day: NaiveDate, offset: FixedOffset, records: &[AttendanceRecord]) -> Result<()> {
    export_day(path, day, offset, records).with_context(|| format!("exporting to {}", path.display()))?;
    println!("Exported {} records to {}", records.len(), path.display());
    Ok(())
}
