// ABOUTME: Squat coach CLI - streams frames to the pose backend and manages local workout data
// ABOUTME: Subcommands for streaming, video upload, history, reset, and AI plan generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//!
//! Usage:
//! ```bash
//! # Stream a directory of frames to the backend until Ctrl-C
//! squat-coach stream --frames ./frames --mode pro
//!
//! # Stream for 30 seconds, then stop and record the workout
//! squat-coach stream --frames ./frames --duration 30
//!
//! # Upload a recorded video, wait for the analysis, and record it
//! squat-coach upload ./squats.mp4 --mode pro
//!
//! # Show counters, form score, and the last seven days
//! squat-coach history
//!
//! # Clear counters and history
//! squat-coach reset --yes
//!
//! # Generate a workout plan
//! squat-coach plan generate workout --prompt "3 day beginner lower body plan"
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use squat_coach::capture::FileCamera;
use squat_coach::config::{DetectorConfig, GenerationConfig, UploadConfig};
use squat_coach::detector::{DetectorDeps, SquatDetector};
use squat_coach::feedback::AssetCueSink;
use squat_coach::link::WebSocketConnector;
use squat_coach::llm::{GeminiGenerator, HttpTextGenerator, PlanKind, PlanService, TextGenerator};
use squat_coach::logging;
use squat_coach::models::Mode;
use squat_coach::session::SessionState;
use squat_coach::stats::summarize;
use squat_coach::store::{JsonFileStore, KeyValueStore, SessionStore};
use squat_coach::upload::{record_video_result, VideoUploadClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "squat-coach",
    about = "Real-time squat form feedback client",
    long_about = "Streams camera frames to a pose-analysis backend, presents rep feedback, and keeps a local workout history."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Store file override
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Stream frames to the backend and present feedback
    Stream {
        /// Directory of still images used as the camera
        #[arg(long)]
        frames: PathBuf,

        /// Backend WebSocket URL override
        #[arg(long)]
        url: Option<String>,

        /// Analysis mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Upload a recorded video for analysis and add the result to the history
    Upload {
        /// Video file to analyse
        file: PathBuf,

        /// Analysis mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Video service base URL override
        #[arg(long)]
        url: Option<String>,
    },

    /// Show counters, form score, and recent workouts
    History,

    /// Clear counters and workout history
    Reset {
        /// Confirm the reset; without it only a preview is printed
        #[arg(long)]
        yes: bool,
    },

    /// AI workout and diet plans
    Plan {
        #[command(subcommand)]
        action: PlanCommand,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Generate and store a new plan
    Generate {
        /// Which plan to generate
        #[arg(value_enum)]
        kind: PlanArg,

        /// Prompt describing the plan
        #[arg(long)]
        prompt: String,
    },

    /// Print the latest stored plan
    Show {
        /// Which plan to print
        #[arg(value_enum)]
        kind: PlanArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Beginner,
    Pro,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Beginner => Self::Beginner,
            ModeArg::Pro => Self::Pro,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PlanArg {
    Workout,
    Diet,
}

impl From<PlanArg> for PlanKind {
    fn from(arg: PlanArg) -> Self {
        match arg {
            PlanArg::Workout => Self::Workout,
            PlanArg::Diet => Self::Diet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    logging::init_from_env()?;

    let mut config = DetectorConfig::from_env()?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    let store: Arc<dyn KeyValueStore> = Arc::new(
        JsonFileStore::open(&config.store_path)
            .with_context(|| format!("Failed to open store {}", config.store_path.display()))?,
    );

    match cli.command {
        Command::Stream {
            frames,
            url,
            mode,
            duration,
        } => {
            if let Some(url) = url {
                config.ws_url = squat_coach::config::environment::validate_ws_url(&url)?;
            }
            if let Some(mode) = mode {
                config.mode = mode.into();
            }
            stream(config, store, frames, duration.map(Duration::from_secs)).await
        }
        Command::Upload { file, mode, url } => {
            let mut settings = UploadConfig::from_env()?;
            if let Some(url) = url {
                settings.base_url = url;
            }
            let mode = mode.map_or(config.mode, Mode::from);
            upload_video(&settings, &SessionStore::new(store), &file, mode).await
        }
        Command::History => {
            print_history(&SessionStore::new(store));
            Ok(())
        }
        Command::Reset { yes } => reset(&config, &SessionStore::new(store), yes),
        Command::Plan { action } => plan(store, action).await,
    }
}

async fn stream(
    config: DetectorConfig,
    store: Arc<dyn KeyValueStore>,
    frames: PathBuf,
    duration: Option<Duration>,
) -> Result<()> {
    info!("{}", config.summary());

    let deps = DetectorDeps {
        camera: Arc::new(FileCamera::new(frames)),
        connector: Arc::new(WebSocketConnector),
        cue_sink: Arc::new(AssetCueSink::new(&config.sounds_dir)),
        store,
    };
    let (detector, handle) = SquatDetector::new(config, deps);
    let task = detector.spawn();

    handle.start().await.context("Failed to start streaming")?;

    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => {
            info!("Streaming, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    let snapshot = handle.snapshot();
    match handle.stop().await? {
        Some(record) => println!(
            "Workout recorded: {} correct, {} incorrect, {}s ({})",
            record.correct, record.incorrect, record.duration_seconds, record.mode
        ),
        None if snapshot.started_at.is_some() => {
            println!("Session too short to record");
        }
        None => println!("Streaming had already ended"),
    }
    println!(
        "Frames sent: {}, received: {}, dropped: {}",
        snapshot.frames_sent, snapshot.frames_received, snapshot.link.frames_dropped
    );

    handle.shutdown().await?;
    task.await.context("Detector task failed")?;
    Ok(())
}

async fn upload_video(
    settings: &UploadConfig,
    store: &SessionStore,
    file: &Path,
    mode: Mode,
) -> Result<()> {
    let client = VideoUploadClient::new(settings)?;
    let video_id = client
        .upload(file, mode)
        .await
        .with_context(|| format!("Failed to upload {}", file.display()))?;
    println!("Uploaded {} as {video_id}, waiting for analysis", file.display());

    let analysis = client.wait_for_result(&video_id).await?;
    let record = record_video_result(store, &analysis, mode, Utc::now().date_naive())?;
    println!(
        "Video analysed: {} correct, {} incorrect ({})",
        record.correct, record.incorrect, record.mode
    );
    if let Some(url) = &analysis.processed_video_url {
        println!("Processed video: {url}");
    }
    Ok(())
}

fn print_history(store: &SessionStore) {
    let counters = store.load_counters();
    let history = store.load_history();
    let summary = summarize(counters, &history, Utc::now().date_naive());

    println!("Correct: {}", summary.counters.correct);
    println!("Incorrect: {}", summary.counters.incorrect);
    match summary.form_score {
        Some(score) => println!("Form score: {score}%"),
        None => println!("Form score: -"),
    }

    println!("\nLast 7 days:");
    for day in &summary.last_seven_days {
        let marker = if day.has_workout() { "#" } else { "." };
        println!("  {} {marker} {}", day.date.format("%a %d %b"), day.correct());
    }

    if history.is_empty() {
        println!("\nNo workouts recorded yet");
        return;
    }
    println!("\nRecent workouts:");
    for record in history.iter() {
        println!(
            "  {}  {:>3} correct  {:>3} incorrect  {:>4}s  {}{}",
            record.date,
            record.correct,
            record.incorrect,
            record.duration_seconds,
            record.mode,
            if record.is_video { "  (video)" } else { "" }
        );
    }
}

fn reset(config: &DetectorConfig, store: &SessionStore, yes: bool) -> Result<()> {
    let mut session = SessionState::new(config.mode, config.min_session);
    session.restore(store.load_counters(), store.load_history());
    let pending = session.request_reset();

    if !yes {
        println!(
            "This will clear {} correct and {} incorrect reps and {} recorded workouts.",
            pending.counters.correct, pending.counters.incorrect, pending.workouts
        );
        println!("Run again with --yes to confirm.");
        return Ok(());
    }

    session.confirm_reset(pending);
    store.save_counters(session.counters())?;
    store.save_history(session.history())?;
    println!("Counters and workout history cleared");
    Ok(())
}

async fn plan(store: Arc<dyn KeyValueStore>, action: PlanCommand) -> Result<()> {
    let settings = GenerationConfig::from_env()?;
    let generator: Arc<dyn TextGenerator> = match &settings.gemini_api_key {
        Some(key) => Arc::new(GeminiGenerator::new(key).with_default_model(&settings.gemini_model)),
        None => Arc::new(HttpTextGenerator::with_timeout(
            &settings.endpoint,
            settings.timeout,
        )?),
    };
    let service = PlanService::new(generator, store);

    match action {
        PlanCommand::Generate { kind, prompt } => {
            let plan = service.generate(kind.into(), &prompt).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        PlanCommand::Show { kind } => match service.latest(kind.into())? {
            Some(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
            None => {
                warn!(plan = PlanKind::from(kind).label(), "No plan stored yet");
                println!("No {} plan stored yet", PlanKind::from(kind).label());
            }
        },
    }
    Ok(())
}
