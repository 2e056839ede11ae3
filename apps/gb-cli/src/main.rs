use chrono::DateTime;
use clap::{Parser, Subcommand};
use gb_app::{
    AppError, AppResult, Runtime, SimulatedSource, Snapshot, load_or_init_settings,
    load_settings, open_segment_log, read_segment_store, save_settings,
};
use gb_controls::Reconciler;
use gb_results::{DEFAULT_QUERY_LIMIT, SegmentId};
use gb_sim::PlantSimulator;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gb-cli")]
#[command(about = "Growbox CLI - closed-loop climate control against a simulated enclosure", long_about = None)]
struct Cli {
    /// Path to the settings YAML file
    #[arg(short, long, global = true, default_value = "growbox.yaml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Run the control loop against the plant simulator
    Run {
        /// How long to run, in seconds
        #[arg(long, default_value_t = 30.0)]
        duration_s: f64,
        /// Override the simulator seed
        #[arg(long)]
        seed: Option<u64>,
        /// Set an environment variable before starting (key=value, repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Print live events as JSON lines while running
        #[arg(long)]
        follow: bool,
    },
    /// List recorded history segments, most recent first
    Segments {
        /// Maximum number of segments to list
        #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT, allow_negative_numbers = true)]
        n: i64,
        /// Include the segment still being written
        #[arg(long)]
        include_open: bool,
    },
    /// Print the samples of one segment as JSON lines
    ShowSegment {
        /// Segment ID (seg-YYYYMMDDTHHMMSSZ)
        segment_id: String,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cmd_init(&cli.settings, force),
        Commands::Run {
            duration_s,
            seed,
            overrides,
            follow,
        } => cmd_run(&cli.settings, duration_s, seed, &overrides, follow),
        Commands::Segments { n, include_open } => cmd_segments(&cli.settings, n, include_open),
        Commands::ShowSegment { segment_id } => cmd_show_segment(&cli.settings, &segment_id),
    }
}

fn cmd_init(settings_path: &Path, force: bool) -> AppResult<()> {
    if settings_path.exists() && !force {
        return Err(AppError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            settings_path.display()
        )));
    }
    save_settings(settings_path, &Default::default())?;
    println!("✓ Wrote default settings to {}", settings_path.display());
    Ok(())
}

fn parse_override(raw: &str) -> AppResult<(&str, f64)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| AppError::InvalidInput(format!("expected KEY=VALUE, got '{raw}'")))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| AppError::InvalidInput(format!("bad value for '{key}': {e}")))?;
    Ok((key.trim(), value))
}

fn cmd_run(
    settings_path: &Path,
    duration_s: f64,
    seed: Option<u64>,
    overrides: &[String],
    follow: bool,
) -> AppResult<()> {
    if !(duration_s.is_finite() && duration_s >= 0.0) {
        return Err(AppError::InvalidInput(
            "duration must be a non-negative number of seconds".to_string(),
        ));
    }

    let mut settings = load_or_init_settings(settings_path)?;
    if let Some(seed) = seed {
        settings.plant.seed = seed;
    }
    info!(path = %settings_path.display(), seed = settings.plant.seed, "settings loaded");

    let reconciler = Reconciler::new(settings.reconciler.clone(), settings.tune.clone())?;
    let log = open_segment_log(&settings.segments)?;
    let mut sim = PlantSimulator::new(settings.plant.clone())?;
    for raw in overrides {
        let (key, value) = parse_override(raw)?;
        sim.set_variable(key, value)?;
        println!("  {key} = {value}");
    }

    println!(
        "Running for {:.1} s (tick {} ms, ingest {} ms)",
        duration_s, settings.runtime.tick_interval_ms, settings.runtime.ingest_interval_ms
    );
    let handle = Runtime::new(settings.runtime.clone(), reconciler, log)
        .spawn_simulated(SimulatedSource::new(sim))?;

    let deadline = Instant::now() + Duration::from_secs_f64(duration_s);
    if follow {
        let sub = handle.store().subscribe();
        while Instant::now() < deadline {
            if let Some(event) = sub.recv_timeout(Duration::from_millis(100)) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        if sub.dropped() > 0 {
            println!("({} events dropped)", sub.dropped());
        }
    } else {
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }

    let snapshot = handle.store().snapshot();
    let log = handle.stop()?;
    print_snapshot(&snapshot);

    let recent = log.query(5, true);
    if !recent.is_empty() {
        println!("\nRecent segments:");
        for id in recent {
            println!("  {}", id);
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("\nFinal state:");
    match &snapshot.report {
        Some(r) => println!(
            "  Report:  moisture {}%  inner {}°C/{}%  outer {}°C/{}%",
            r.moisture, r.temp_inner, r.humd_inner, r.temp_outer, r.humd_outer
        ),
        None => println!("  Report:  (none yet)"),
    }
    if let Some(c) = &snapshot.command {
        println!(
            "  Command: pump {}  peltier {} (fw={})  fan {}",
            c.pump_level, c.peltier_level, c.peltier_forward, c.fan_level
        );
    }
    println!("  Ticks:   {}", snapshot.reconciler.state.ticks);
}

fn cmd_segments(settings_path: &Path, n: i64, include_open: bool) -> AppResult<()> {
    let settings = load_settings(settings_path)?;
    let Some(store) = read_segment_store(&settings.segments)? else {
        println!("No segments found");
        return Ok(());
    };
    let ids = store.recent(n, include_open)?;

    if ids.is_empty() {
        println!("No segments found");
    } else {
        let partial = store.list_partial()?;
        for id in ids {
            let marker = if partial.contains(&id) { " (open)" } else { "" };
            println!("  {}{}", id, marker);
        }
    }
    Ok(())
}

fn cmd_show_segment(settings_path: &Path, segment_id: &str) -> AppResult<()> {
    let settings = load_settings(settings_path)?;
    let id = SegmentId::parse(segment_id)
        .ok_or_else(|| AppError::InvalidInput(format!("not a segment id: '{segment_id}'")))?;
    let store = read_segment_store(&settings.segments)?
        .ok_or_else(|| AppError::InvalidInput(format!("segment not found: {id}")))?;
    let samples = store.load(&id)?;

    println!("Segment {} ({} samples)", id, samples.len());
    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        println!(
            "  {} .. {}",
            format_timestamp(first.timestamp),
            format_timestamp(last.timestamp)
        );
    }
    for sample in &samples {
        println!("{}", serde_json::to_string(sample)?);
    }
    Ok(())
}

fn format_timestamp(timestamp: f64) -> String {
    DateTime::from_timestamp(timestamp.floor() as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("{timestamp}"))
}

