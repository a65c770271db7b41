//! xr-painter: replay a stylus trace through the painting core
//!
//! Runs the frame loop at 60 Hz against a scripted controller trace:
//! - stroke controller bound to the accepted stylus profile
//! - speech-gated recorder on the simulated (or cpal) audio backend
//! - captured audio hand-offs logged as they arrive

use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use xr_painter::audio::AudioBackend;
use xr_painter::clock::{Clock, SystemClock, FRAME};
use xr_painter::config::{Config, SurfaceConfig, SurfaceKind};
use xr_painter::input::{ScriptedInput, Trace};
use xr_painter::lifecycle::ShutdownSignal;
use xr_painter::recorder::CapturedAudio;
use xr_painter::stroke::{DrawingSurface, PixelCanvas, TubePainter};
use xr_painter::{AppContext, AppEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "xr-painter starting");

    let mut config = Config::load()?;
    info!(
        surface = ?config.surface.kind,
        policy = %config.stroke.trigger_policy,
        profile = %config.stroke.accepted_profile,
        "configuration loaded"
    );

    let trace = match &config.trace_path {
        Some(path) => Trace::load(path)
            .with_context(|| format!("failed to load trace {}", path.display()))?,
        None => {
            warn!("XR_PAINTER_TRACE not set, nothing to replay");
            Trace::default()
        }
    };
    config.apply_trace(&trace);
    info!(
        frames = trace.frames.len(),
        levels = trace.levels_db.len(),
        record_button = ?config.record_button,
        "trace loaded"
    );

    let backend = audio_backend(&trace);
    let surface = build_surface(&config.surface);

    // Recorder and stroke controller -> status log
    let (event_tx, mut event_rx) = broadcast::channel::<AppEvent>(64);
    // Recorder -> captured audio consumer
    let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<CapturedAudio>();

    let mut app = AppContext::new(
        &config,
        backend,
        surface,
        ScriptedInput::from_trace(trace),
        event_tx,
        audio_tx,
    );

    let mut shutdown = ShutdownSignal::register().context("failed to register signal handlers")?;
    let mut ticker = tokio::time::interval(FRAME);
    let clock = SystemClock;

    info!("entering frame loop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !app.input_mut().advance() {
                    info!(frames = app.frames(), "trace finished");
                    break;
                }
                app.frame(clock.now()).await;
            }
            name = shutdown.recv() => {
                info!(signal = name, "shutdown signal received");
                break;
            }
        }

        drain_events(&mut event_rx);
        drain_audio(&mut audio_rx);
    }

    info!("shutting down...");
    app.shutdown();
    drain_events(&mut event_rx);
    drain_audio(&mut audio_rx);

    let stats = app.surface().stats();
    info!(
        strokes = stats.strokes,
        points = stats.points,
        revision = stats.revision,
        "xr-painter stopped"
    );

    Ok(())
}

#[cfg(feature = "cpal")]
fn audio_backend(_trace: &Trace) -> Box<dyn AudioBackend> {
    info!("using system audio devices");
    Box::new(xr_painter::audio::CpalBackend::new())
}

#[cfg(not(feature = "cpal"))]
fn audio_backend(trace: &Trace) -> Box<dyn AudioBackend> {
    let backend = xr_painter::audio::SimulatedBackend::new();
    backend.probe().push_levels(trace.levels_db.iter().copied());
    Box::new(backend)
}

fn build_surface(config: &SurfaceConfig) -> Box<dyn DrawingSurface> {
    match config.kind {
        SurfaceKind::Tube => Box::new(TubePainter::new(config.tube_size)),
        SurfaceKind::Canvas => Box::new(
            PixelCanvas::new(
                config.canvas_width,
                config.canvas_height,
                config.pixels_per_meter,
            )
            .with_brush(config.brush_width, config.brush_color),
        ),
    }
}

fn drain_events(rx: &mut broadcast::Receiver<AppEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => info!(%event, "app event"),
            Err(TryRecvError::Lagged(n)) => warn!(skipped = n, "event receiver lagged"),
            Err(_) => break,
        }
    }
}

fn drain_audio(rx: &mut mpsc::UnboundedReceiver<CapturedAudio>) {
    while let Ok(audio) = rx.try_recv() {
        info!(
            bytes = audio.byte_size,
            samples = audio.sample_count,
            sample_rate = audio.sample_rate,
            duration_ms = audio.duration_ms,
            reason = %audio.reason,
            "captured audio handed off"
        );
    }
}
