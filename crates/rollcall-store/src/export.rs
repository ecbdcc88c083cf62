//! One day of attendance as an Excel workbook.

use crate::attendance::AttendanceRecord;
use chrono::{FixedOffset, NaiveDate};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, XlsxError};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("xlsx: {0}")]
    Xlsx(#[from] XlsxError),
}

const HEADERS: [&str; 3] = ["Name", "Status", "Recorded at"];
const COLUMN_WIDTHS: [f64; 3] = [28.0, 12.0, 22.0];

/// Write `records` to a single worksheet named after `day`.
///
/// Timestamps are shown in `offset`, the same civil time that decided the day.
pub fn export_day(
    path: &Path,
    day: NaiveDate,
    offset: FixedOffset,
    records: &[AttendanceRecord],
) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();

    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Thin);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(day.format("%Y-%m-%d").to_string())?;

    for (col, (title, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
        worksheet.set_column_width(col as u16, width)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        let local = record.recorded_at.with_timezone(&offset);
        worksheet.write_string(row, 0, &record.student_name)?;
        worksheet.write_string(row, 1, record.status.as_str())?;
        worksheet.write_string(row, 2, local.format("%Y-%m-%d %H:%M:%S").to_string())?;
    }

    workbook.save(path)?;
    tracing::info!(path = %path.display(), %day, rows = records.len(), "attendance exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::Status;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_export_writes_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2026-10-15.xlsx");
        let day = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let records = vec![AttendanceRecord {
            student_name: "S1".into(),
            status: Status::Present,
            day,
            recorded_at: Utc.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap(),
        }];

        export_day(&path, day, FixedOffset::east_opt(3600).unwrap(), &records).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");
    }

    #[test]
    fn test_export_empty_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        export_day(&path, day, FixedOffset::east_opt(0).unwrap(), &[]).unwrap();
        assert!(path.exists());
    }
}
