//! Attendance sessions: a folder of photos or a live webcam run, folded into
//! one present set, reconciled against the gallery and committed.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use image::RgbImage;
use rollcall_core::gallery::list_images;
use rollcall_core::{FaceEncoder, Gallery, Matcher, Reconciliation, RecognitionSession, SessionStats};
use rollcall_store::{operational_day, CommitReport, Store};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Recognize everyone in the `.jpg` photos in `dir`.
///
/// Unreadable photos are skipped. Every readable photo is also stored raw in
/// the `images` table under its file name.
pub fn recognize_folder<M: Matcher>(
    dir: &Path,
    encoder: &mut dyn FaceEncoder,
    gallery: &Gallery,
    matcher: M,
    store: &Store,
) -> Result<(Reconciliation, SessionStats)> {
    let photos = list_images(dir)?;
    let mut session = RecognitionSession::new(gallery, matcher);

    for path in photos {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "could not read image; skipping");
                continue;
            }
        };
        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image.to_rgb8(),
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "could not load image; skipping");
                continue;
            }
        };

        store
            .images()
            .insert(&file_name, &bytes)
            .with_context(|| format!("storing {file_name}"))?;

        let faces = encoder.encode_all(&image)?;
        for name in session.observe(&faces) {
            tracing::info!(student = %name, image = %file_name, "recognized");
        }
    }

    Ok((session.reconcile(), session.stats()))
}

/// Recognize faces frame by frame until `stop` is raised or the source ends.
///
/// `next_frame` yields `Ok(None)` for frames that should be skipped (dark or
/// empty) and `Err` when capture fails. Each newly recognized student is
/// announced on `progress`, kept apart from the session summary on stdout.
pub fn recognize_frames<M, F>(
    mut next_frame: F,
    encoder: &mut dyn FaceEncoder,
    gallery: &Gallery,
    matcher: M,
    stop: &AtomicBool,
    progress: &mut dyn Write,
) -> Result<(Reconciliation, SessionStats)>
where
    M: Matcher,
    F: FnMut() -> Result<Option<Option<RgbImage>>>,
{
    let mut session = RecognitionSession::new(gallery, matcher);

    while !stop.load(Ordering::Relaxed) {
        let image = match next_frame()? {
            Some(Some(image)) => image,
            Some(None) => continue,
            None => break,
        };
        let faces = encoder.encode_all(&image)?;
        for name in session.observe(&faces) {
            tracing::info!(student = %name, "recognized");
            writeln!(progress, "Recognized {name}")?;
        }
    }

    let stats = session.stats();
    tracing::info!(frames = stats.inputs, faces = stats.faces, unknown = stats.unknown_faces, "capture stopped");
    Ok((session.reconcile(), stats))
}

/// Everything an operator needs to know about a finished session.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub day: NaiveDate,
    pub present: Vec<String>,
    pub absent: Vec<String>,
    pub stats: SessionStats,
    pub failed: Vec<String>,
}

/// Commit the reconciled session. Every student is attempted.
pub fn commit(
    store: &mut Store,
    reconciliation: Reconciliation,
    stats: SessionStats,
    now: DateTime<Utc>,
) -> (SessionSummary, CommitReport) {
    let day = operational_day(now, store.offset());
    let report = store
        .attendance()
        .commit_session(&reconciliation.present, &reconciliation.absent, now);

    let summary = SessionSummary {
        day,
        present: reconciliation.present,
        absent: reconciliation.absent,
        stats,
        failed: report.failed.iter().map(|(name, _, _)| name.clone()).collect(),
    };
    (summary, report)
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    }
}

pub fn print_summary(summary: &SessionSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("Present: {}", join_or_none(&summary.present));
        println!("Absent: {}", join_or_none(&summary.absent));
        if !summary.failed.is_empty() {
            println!("Not recorded: {}", summary.failed.join(", "));
        }
    }
    Ok(())
}
