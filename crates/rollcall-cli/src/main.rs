use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rollcall_core::{Gallery, OnnxFaceEncoder, Reconciliation, SessionStats};
use rollcall_hw::Camera;
use rollcall_store::{operational_day, Store};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

mod config;
mod enroll;
mod report;
mod session;

use config::Config;
use enroll::Enrollment;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Face-recognition attendance for a classroom")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/rollcall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student from a webcam snapshot or an image file
    Enroll {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Unique identifier; also the gallery file name
        #[arg(short, long)]
        id: String,
        /// Use this photo instead of the webcam
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Take attendance from a folder of .jpg photos
    Check {
        dir: PathBuf,
    },
    /// Take attendance from the webcam until Enter or Ctrl-C
    Live,
    /// Manage the roster
    Students {
        #[command(subcommand)]
        action: StudentsAction,
    },
    /// Print the attendance recorded for a day
    Report {
        /// Operational day (default: today)
        #[arg(long)]
        day: Option<NaiveDate>,
    },
    /// Write a day's attendance to an .xlsx workbook
    Export {
        #[arg(long)]
        day: Option<NaiveDate>,
        /// Output path; prompted for when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Cameras,
}

#[derive(Subcommand)]
enum StudentsAction {
    /// List enrolled students
    List,
    /// Change a student's name and/or identifier
    Rename {
        identifier: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        new_id: Option<String>,
    },
    /// Remove a student and their gallery photo
    Remove {
        identifier: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Enroll { name, id, from } => {
            let store = open_store(&config)?;
            run_enroll(&config, &store, &name, &id, from.as_deref())?;
        }
        Commands::Check { dir } => {
            let mut store = open_store(&config)?;
            let mut encoder = load_encoder(&config)?;
            let gallery = Gallery::load(&config.gallery_dir, &mut encoder)?;
            let (reconciliation, stats) =
                session::recognize_folder(&dir, &mut encoder, &gallery, config.matcher(), &store)?;
            finish_session(&mut store, reconciliation, stats, cli.json)?;
        }
        Commands::Live => {
            let mut store = open_store(&config)?;
            let mut encoder = load_encoder(&config)?;
            let gallery = Gallery::load(&config.gallery_dir, &mut encoder)?;
            let (reconciliation, stats) = run_live(&config, encoder, gallery).await?;
            finish_session(&mut store, reconciliation, stats, cli.json)?;
        }
        Commands::Students { action } => run_students(&config, &open_store(&config)?, action, cli.json)?,
        Commands::Report { day } => {
            let mut store = open_store(&config)?;
            let day = day.unwrap_or_else(|| operational_day(Utc::now(), store.offset()));
            let records = report::day_records(&mut store, day)?;
            report::print_report(day, &records, store.offset(), cli.json)?;
        }
        Commands::Export { day, out } => {
            let mut store = open_store(&config)?;
            let day = day.unwrap_or_else(|| operational_day(Utc::now(), store.offset()));
            let records = report::day_records(&mut store, day)?;
            let path = report::resolve_export_path(out, day)?;
            report::export(&path, day, store.offset(), &records)?;
        }
        Commands::Cameras => list_cameras(cli.json)?,
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Store> {
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Store::open(&config.db_path, config.offset()?)
        .with_context(|| format!("opening database {}", config.db_path.display()))
}

fn load_encoder(config: &Config) -> Result<OnnxFaceEncoder> {
    OnnxFaceEncoder::load(&config.model_dir)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}

fn run_enroll(config: &Config, store: &Store, name: &str, id: &str, from: Option<&Path>) -> Result<()> {
    enroll::validate_identifier(id)?;
    let mut encoder = load_encoder(config)?;

    let snapshot = match from {
        Some(path) => image::open(path)
            .with_context(|| format!("reading {}", path.display()))?
            .to_rgb8(),
        None => {
            let camera = Camera::open(&config.camera_device)?;
            eprintln!("Look at the camera...");
            camera.snapshot(config.warmup_frames)?.image
        }
    };

    match enroll::enroll(store, &mut encoder, &config.gallery_dir, name, id, &snapshot)? {
        Enrollment::Enrolled => {
            println!("Enrolled {name} ({id})");
            Ok(())
        }
        Enrollment::NoSingleFace => bail!("enrollment photo must show exactly one face"),
        Enrollment::Duplicate => bail!("identifier {id} is already enrolled"),
    }
}

/// Run the capture loop on a blocking thread; Enter or Ctrl-C raises the stop
/// flag and the loop returns what it has seen so far.
async fn run_live(
    config: &Config,
    mut encoder: OnnxFaceEncoder,
    gallery: Gallery,
) -> Result<(Reconciliation, SessionStats)> {
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let device = config.camera_device.clone();
    let matcher = config.matcher();

    let mut capture = tokio::task::spawn_blocking(move || -> Result<(Reconciliation, SessionStats)> {
        let camera = Camera::open(&device)?;
        let mut stream = camera.stream()?;
        session::recognize_frames(
            || {
                let frame = stream.next_lit_frame(1)?;
                if let Some(frame) = &frame {
                    tracing::trace!(seq = frame.sequence, luma = frame.mean_luma(), "frame");
                }
                Ok(Some(frame.map(|f| f.image)))
            },
            &mut encoder,
            &gallery,
            matcher,
            &worker_stop,
            &mut std::io::stderr(),
        )
    });

    // A plain thread, so a pending stdin read never holds up runtime shutdown.
    let (enter_tx, mut enter_rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            let _ = enter_tx.send(());
        }
    });

    eprintln!("Taking attendance from {}. Press Enter or Ctrl-C to stop.", config.camera_device);

    let finished = tokio::select! {
        joined = &mut capture => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
        Ok(()) = &mut enter_rx => None,
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            tracing::info!("stopping capture");
            stop.store(true, Ordering::Relaxed);
            capture.await
        }
    };
    joined.context("capture task panicked")?
}

fn finish_session(
    store: &mut Store,
    reconciliation: Reconciliation,
    stats: SessionStats,
    json: bool,
) -> Result<()> {
    let (summary, report) = session::commit(store, reconciliation, stats, Utc::now());
    session::print_summary(&summary, json)?;

    for (name, status, err) in &report.failed {
        tracing::error!(student = %name, %status, error = %err, "attendance not recorded");
    }
    if !report.is_complete() {
        bail!("{} of {} attendance records could not be saved", report.failed.len(), report.failed.len() + report.applied.len());
    }
    Ok(())
}

fn run_students(config: &Config, store: &Store, action: StudentsAction, json: bool) -> Result<()> {
    match action {
        StudentsAction::List => {
            let students = store.roster().list_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&students)?);
            } else if students.is_empty() {
                println!("No students enrolled");
            } else {
                for student in students {
                    println!("{}  {}", student.identifier, student.name);
                }
            }
        }
        StudentsAction::Rename { identifier, name, new_id } => {
            if name.is_none() && new_id.is_none() {
                bail!("nothing to change: pass --name and/or --new-id");
            }
            if !enroll::rename(store, &config.gallery_dir, &identifier, name.as_deref(), new_id.as_deref())? {
                bail!("identifier {} is already taken", new_id.unwrap_or_default());
            }
            println!("Updated {identifier}");
        }
        StudentsAction::Remove { identifier } => {
            if !enroll::remove(store, &config.gallery_dir, &identifier)? {
                bail!("no student with identifier {identifier}");
            }
            println!("Removed {identifier}");
        }
    }
    Ok(())
}

fn list_cameras(json: bool) -> Result<()> {
    let devices = Camera::list_devices();
    if json {
        let rows: Vec<_> = devices
            .iter()
            .map(|d| serde_json::json!({ "path": d.path, "name": d.name, "driver": d.driver, "bus": d.bus }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if devices.is_empty() {
        println!("No capture devices found");
    } else {
        for d in devices {
            println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
        }
    }
    Ok(())
}
