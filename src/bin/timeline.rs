//! CLI for inspecting timelines, morph resolution and playback.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use visemix::{AnimationOptions, EngineConfig, Phase, Profile, VisemeEngine};

/// visemix: text-to-viseme lip sync, from the command line.
#[derive(Parser)]
#[command(name = "visemix-timeline", version, about)]
struct Cli {
    /// Path to a JSON engine configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the animation frames for TEXT as JSON.
    Timeline {
        text: String,
        #[arg(long)]
        wpm: Option<f64>,
        #[arg(long)]
        duration_ms: Option<f64>,
        #[arg(long)]
        intensity: Option<f32>,
        #[arg(long)]
        pause_ms: Option<f64>,
    },

    /// Resolve the default morph table against an asset inventory and print
    /// the report as JSON.
    Resolve {
        /// Inventory file: a JSON array of names, or one name per line.
        inventory: PathBuf,
        /// Write the resulting tuning profile here.
        #[arg(long)]
        profile_out: Option<PathBuf>,
    },

    /// Play TEXT against an inventory at a fixed tick rate and print the
    /// changed influences per tick as JSON lines.
    Play {
        text: String,
        inventory: PathBuf,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        /// Apply this profile after loading the inventory.
        #[arg(long)]
        profile: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("visemix=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut engine = VisemeEngine::new(config);

    match cli.command {
        Command::Timeline { text, wpm, duration_ms, intensity, pause_ms } => {
            let options = AnimationOptions {
                duration_ms,
                intensity,
                words_per_minute: wpm,
                pause_duration_ms: pause_ms,
            };
            let frames = engine.create_animation(&text, &options);
            println!("{}", serde_json::to_string_pretty(&frames)?);
        }
        Command::Resolve { inventory, profile_out } => {
            let names = read_inventory(&inventory)?;
            let report = engine.load_morph_inventory(names);
            println!("{}", serde_json::to_string_pretty(report)?);
            if let Some(path) = profile_out {
                engine.export_profile()?.save(&path)?;
                info!("profile written to {}", path.display());
            }
        }
        Command::Play { text, inventory, fps, profile } => {
            engine.load_morph_inventory(read_inventory(&inventory)?);
            if let Some(path) = profile {
                engine.import_profile(&Profile::load(&path)?)?;
            }
            play(&mut engine, &text, fps)?;
        }
    }
    Ok(())
}

fn play(engine: &mut VisemeEngine, text: &str, fps: f64) -> anyhow::Result<()> {
    anyhow::ensure!(fps.is_finite() && fps > 0.0, "fps must be positive");
    let tick_ms = 1000.0 / fps;
    let playback = engine.playback(engine.create_animation(text, &AnimationOptions::default()));
    info!(
        "{} frames, {:.0} ms at {fps} fps",
        playback.frames().len(),
        playback.total_duration_ms()
    );

    let mut t = 0.0;
    loop {
        let running = engine.play_at(&playback, t)?;
        let phase = engine.update()?;
        let changes = engine.drain_changes()?;
        if !changes.is_empty() {
            let line = serde_json::json!({ "t_ms": t, "changes": changes });
            println!("{line}");
        }
        if !running && phase == Phase::Idle {
            break;
        }
        t += tick_ms;
    }
    Ok(())
}

fn read_inventory(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading inventory {}", path.display()))?;
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(&raw).context("inventory is not a JSON array of strings");
    }
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
