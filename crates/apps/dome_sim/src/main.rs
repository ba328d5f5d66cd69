use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::Parser;
use dome::sim::{FailurePlan, SimFactory, SimProbe};
use dome::{DomeProjectionSystem, FrameOutcome, InteractionEvent, InteractionKind};
use dome::{OrchestratorConfig, PipelineState};
use foundation::math::DomeCoordinate;
use projection::settings::{ProjectionSettings, Resolution};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Drive the dome projection pipeline with simulated collaborators"
)]
struct Args {
    /// Projection settings JSON (default: four quadrant projectors)
    #[arg(long, env = "DOME_SETTINGS")]
    settings: Option<PathBuf>,

    /// Number of frames to render
    #[arg(long, env = "DOME_FRAMES", default_value_t = 120)]
    frames: u64,

    /// Fail every Nth frame in the simulated render engine (0 = never)
    #[arg(long, env = "DOME_FAIL_EVERY", default_value_t = 0)]
    fail_every: u64,

    /// Consecutive failed frames tolerated before the pipeline shuts down
    #[arg(long, env = "DOME_MAX_FAILURES", default_value_t = 5)]
    max_failures: u32,

    /// Shell document of the web view
    #[arg(long, default_value = "web/index.html")]
    html: String,

    /// Web view size as WIDTHxHEIGHT
    #[arg(long, default_value = "3840x2160", value_parser = parse_size)]
    web_view_size: (u32, u32),

    /// Web application loaded into the content host
    #[arg(long, default_value = "http://localhost:5173")]
    app_url: String,

    /// Project to present in immersive mode
    #[arg(long)]
    project: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => ProjectionSettings::ring(4, Resolution::new(1920, 1080), 0.05),
    };

    let probe = SimProbe::new();
    let factory = SimFactory::new(probe.clone())
        .with_producer_plan(FailurePlan::EveryNth(args.fail_every));
    let config = OrchestratorConfig {
        max_consecutive_failures: args.max_failures,
        ..OrchestratorConfig::default()
    };

    let mut system = DomeProjectionSystem::new(config, factory);
    system.initialize(settings).map_err(|e| e.to_string())?;
    let (width, height) = args.web_view_size;
    system
        .setup_web_view(&args.html, width, height)
        .map_err(|e| e.to_string())?;
    system
        .load_react_app(&args.app_url)
        .map_err(|e| e.to_string())?;
    if let Err(e) = system.calibrate_input() {
        warn!("continuing without calibration: {e}");
    }
    system
        .enable_interaction(true)
        .map_err(|e| e.to_string())?;
    system.register_react_callback(|event_type, data| {
        info!(event_type, data, "web event");
    });
    system.register_interaction_callback(|event| {
        debug!(
            kind = event.kind.as_str(),
            azimuth = event.position.azimuth,
            timestamp = event.timestamp,
            "interaction"
        );
    });
    if let Some(project) = &args.project {
        system
            .navigate_to_project(project)
            .map_err(|e| e.to_string())?;
        system
            .enter_immersive_mode(project)
            .map_err(|e| e.to_string())?;
    }

    let visitor = spawn_gaze_sweep(probe.clone(), args.frames);

    let FrameTally { committed, dropped } =
        run_frames(&mut system, args.frames, Duration::from_millis(1));

    if visitor.join().is_err() {
        warn!("gaze simulation thread panicked");
    }
    let final_state = system.state();
    let navigation =
        formats::navigation_to_json(system.navigation_state()).map_err(|e| e.to_string())?;
    let navigation: serde_json::Value =
        serde_json::from_str(&navigation).map_err(|e| e.to_string())?;
    let snapshot = system.metrics().snapshot();
    system.shutdown();

    let counters: serde_json::Map<String, serde_json::Value> = snapshot
        .counters
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect();
    let gauges: serde_json::Map<String, serde_json::Value> = snapshot
        .gauges
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect();
    let summary = serde_json::json!({
        "framesCommitted": committed,
        "framesDropped": dropped,
        "finalState": final_state.as_str(),
        "counters": counters,
        "gauges": gauges,
        "navigation": navigation,
        "webCommands": probe.commands().len(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?
    );
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct FrameTally {
    committed: u64,
    dropped: u64,
}

/// Renders up to `frames` frames; stops early once the pipeline gives up.
fn run_frames(system: &mut DomeProjectionSystem, frames: u64, pace: Duration) -> FrameTally {
    let mut tally = FrameTally::default();
    for _ in 0..frames {
        match system.render_frame() {
            Ok(report) => {
                for e in report.errors.iter().chain(&report.carried_over) {
                    warn!(frame = report.index, "{e}");
                }
                match report.outcome {
                    FrameOutcome::Committed { .. } => tally.committed += 1,
                    FrameOutcome::Stopped => break,
                }
            }
            Err(e) => {
                tally.dropped += 1;
                if system.state() == PipelineState::ShuttingDown {
                    error!("pipeline gave up: {e}");
                    break;
                }
                debug!("frame dropped: {e}");
            }
        }
        thread::sleep(pace);
    }
    tally
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("width: {e}"))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("height: {e}"))?;
    Ok((w, h))
}

fn load_settings(path: &Path) -> Result<ProjectionSettings, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let settings = formats::settings_from_json(&json)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    info!(
        path = %path.display(),
        channels = settings.projector_count(),
        "loaded projection settings"
    );
    Ok(settings)
}

/// A visitor slowly turning around under the dome.
fn spawn_gaze_sweep(probe: SimProbe, events: u64) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for timestamp in 1..=events {
            let azimuth = (timestamp * 7) as f64;
            let event = InteractionEvent::new(
                InteractionKind::Gaze,
                DomeCoordinate::on_surface(azimuth, 5.0),
                "",
                timestamp,
            );
            if !probe.send_interaction(event) {
                debug!(timestamp, "gaze event not delivered");
            }
            thread::sleep(Duration::from_millis(1));
        }
    })
}
