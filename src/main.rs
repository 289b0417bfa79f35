mod cli;
mod config;
mod console;
mod controller;
mod error;
mod metrics;
mod overlay;
mod pipeline;
mod state;
mod types;

use std::{
    io,
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, bounded};

use cli::Cli;
use config::Config;
use console::Command;
use controller::LiveAnalysis;
use metrics::MetricsReport;
use overlay::OverlayRenderer;
use pipeline::{
    CameraBackend, CaptureSource, CaptureState, ClipBackend, HttpTokenSource, OverlayStyle,
    SessionContext, VideoSink,
};
use state::AnalysisStore;

const LOOP_TICK: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let context = SessionContext::from_config(&config.stream)?;
    log::info!(
        "model {} at {}, sampling every {:?}",
        config.stream.model_name,
        context.endpoint,
        context.interval
    );

    let backend = camera_backend(&cli, &config)?;
    let sink = VideoSink::new();
    let capture = CaptureSource::new(backend, sink.clone(), config.camera.switch_grace());
    let store = AnalysisStore::new();
    store.set_camera_index(config.camera.index);
    let tokens = Arc::new(HttpTokenSource::new(&config.api));
    let mut live = LiveAnalysis::new(capture, store.clone(), tokens, context);
    live.refresh_devices();

    let mut renderer = OverlayRenderer::new(
        config.skeleton.to_schema(),
        (config.display.width, config.display.height),
    );
    let mut preview = PreviewWriter::new(&config);

    let (command_tx, command_rx) = bounded(16);
    thread::spawn(move || console::read_commands(io::stdin().lock(), command_tx));

    if cli.autostart {
        apply_command(Command::CameraOn, &mut live, &mut renderer);
        apply_command(Command::Start, &mut live, &mut renderer);
    }
    log::info!("ready; type `help` for commands");

    loop {
        match command_rx.recv_timeout(LOOP_TICK) {
            Ok(Command::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => apply_command(command, &mut live, &mut renderer),
            Err(RecvTimeoutError::Timeout) => {}
        }

        live.reconcile();
        let state = store.snapshot();
        renderer.on_metadata(sink.dimensions());
        renderer.on_analysis_changed(state.analyzing, state.keypoints.len());

        if let Some(writer) = preview.as_mut() {
            writer.maybe_write(&sink, &renderer, &state);
        }
    }

    log::info!("shutting down after {} captured frames", sink.published());
    live.shutdown();
    Ok(())
}

fn camera_backend(cli: &Cli, config: &Config) -> Result<Arc<dyn CameraBackend>> {
    if let Some(dir) = &cli.clip {
        log::info!("using recorded clip {}", dir.display());
        return Ok(Arc::new(ClipBackend::new(dir, config.camera.clip_fps)));
    }
    native_backend()
}

#[cfg(feature = "camera-nokhwa")]
fn native_backend() -> Result<Arc<dyn CameraBackend>> {
    Ok(Arc::new(pipeline::NokhwaBackend))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn native_backend() -> Result<Arc<dyn CameraBackend>> {
    anyhow::bail!("built without camera support; pass --clip <dir> to replay recorded frames")
}

fn apply_command(command: Command, live: &mut LiveAnalysis, renderer: &mut OverlayRenderer) {
    let store = live.store().clone();
    match command {
        Command::CameraOn => match live.camera_on() {
            CaptureState::Live { device } => println!(
                "camera on: {}",
                device.map(|d| d.label).unwrap_or_else(|| "default input".to_string())
            ),
            CaptureState::Unavailable => println!("camera unavailable"),
        },
        Command::CameraOff => {
            live.camera_off();
            println!("camera off");
        }
        Command::SwitchCamera => match live.next_camera() {
            Some(index) => println!("selected camera #{index}"),
            None => println!("no other camera to switch to"),
        },
        Command::Start => match live.start_analysis() {
            Ok(()) => println!("analysis started"),
            Err(reason) => println!("cannot start analysis: {reason:?}"),
        },
        Command::Stop => {
            live.stop_analysis();
            println!("analysis stopped");
        }
        Command::Mode(mode) => {
            live.set_mode(mode);
            println!("mode: {}", mode.label());
        }
        Command::Resize(width, height) => renderer.on_resize((width, height)),
        Command::Toggle(part) => {
            let mut shown = false;
            let visibility = store.update_visibility(|v| shown = v.toggle(part));
            println!(
                "{} {} ({}/5 parts shown)",
                part.label(),
                if shown { "shown" } else { "hidden" },
                visibility.active_count()
            );
        }
        Command::ResetParts => {
            store.reset_visibility();
            println!("all body parts shown");
        }
        Command::Metrics => {
            let state = store.snapshot();
            if let Some(score) = &state.scores.posture_score {
                println!("posture score: {score}");
            }
            print!("{}", MetricsReport::from_scores(&state.scores));
        }
        Command::Devices => {
            let state = store.snapshot();
            if state.devices.is_empty() {
                println!("no cameras found");
            }
            for (position, device) in state.devices.iter().enumerate() {
                let marker = if position == state.camera_index { '*' } else { ' ' };
                println!("{marker} #{position} {}", device.label);
            }
        }
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {}
    }
}

/// Periodically writes the composited overlay to disk.
struct PreviewWriter {
    path: PathBuf,
    interval: Duration,
    last: Option<Instant>,
    style: OverlayStyle,
}

impl PreviewWriter {
    fn new(config: &Config) -> Option<Self> {
        let path = config.display.preview_path.as_ref()?;
        Some(Self {
            path: PathBuf::from(path),
            interval: Duration::from_millis(config.display.preview_interval_ms),
            last: None,
            style: OverlayStyle::default(),
        })
    }

    fn maybe_write(&mut self, sink: &VideoSink, renderer: &OverlayRenderer, state: &state::AnalysisState) {
        if self.last.is_some_and(|at| at.elapsed() < self.interval) {
            return;
        }
        self.last = Some(Instant::now());

        let frame = sink.latest();
        let scene = renderer.scene(state.analyzing, &state.keypoints, &state.visibility);
        let result = pipeline::compose(
            frame.as_deref(),
            renderer.geometry(),
            renderer.container(),
            scene.as_ref(),
            &self.style,
        )
        .and_then(|composite| pipeline::save_preview(&self.path, &composite));
        if let Err(err) = result {
            log::warn!("preview not written: {err:#}");
        }
    }
}
