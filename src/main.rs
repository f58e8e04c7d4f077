//! # Steerpad
//!
//! Turn your mouse into a virtual steering wheel gamepad.
//!
//! Horizontal mouse position becomes a steering axis on a uinput virtual
//! gamepad, with a configurable deadzone, response curve, smoothing filter,
//! and spring-damper auto-centering.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber (stderr, so the TUI stays clean)
//!    - Load the configuration store (regenerating defaults if missing)
//!    - Open the mouse via evdev and create the uinput gamepad
//!
//! 2. **Steady state**
//!    - The frame scheduler drives the steering pipeline at 60Hz on a
//!      background task
//!    - The terminal UI runs its own 60Hz refresh loop on a blocking task,
//!      mutating the shared configuration
//!
//! 3. **Graceful Shutdown**
//!    - Exit via the UI (Esc/q) or Ctrl+C cancels the shared token
//!    - The frame loop drains, then the final configuration save runs and
//!      the virtual devices are dropped
//!
//! # Errors
//!
//! Returns an error if no mouse device can be opened. A missing uinput
//! device is not fatal: the scheduler keeps retrying the pad connection
//! every two seconds.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use steerpad::clock::MonotonicClock;
use steerpad::config::SharedConfig;
use steerpad::engine::Engine;
use steerpad::pad::uinput::UinputPad;
use steerpad::pad::SteeringPad;
use steerpad::pointer::device::EvdevPointer;
use steerpad::ui::Ui;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. Logs go to stderr so the alternate-screen UI owns
    // stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Steerpad v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = SharedConfig::with_store(SharedConfig::default_store_path());
    config.load();

    let pointer = EvdevPointer::open()?;
    info!("Mouse opened at: {}", pointer.device_path());

    let mut pad = UinputPad::new();
    if !pad.connect() {
        warn!("Virtual pad unavailable at startup; reconnect policy will keep retrying");
    }

    let mut engine = Engine::new(pointer, pad, MonotonicClock::new(), config.clone());
    let status = engine.status();

    let cancel = CancellationToken::new();

    let engine_cancel = cancel.clone();
    let engine_task = tokio::spawn(async move { engine.run(engine_cancel).await });

    let ui = Ui::new(config.clone(), status);
    let ui_cancel = cancel.clone();
    let mut ui_task = tokio::task::spawn_blocking(move || ui.run(ui_cancel));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
            match ui_task.await {
                Ok(Err(e)) => warn!("UI error during shutdown: {}", e),
                Err(e) => warn!("UI task failed: {}", e),
                _ => {}
            }
        }
        result = &mut ui_task => {
            cancel.cancel();
            match result {
                Ok(Ok(())) => info!("UI exited, shutting down..."),
                Ok(Err(e)) => warn!("UI error: {}", e),
                Err(e) => warn!("UI task failed: {}", e),
            }
        }
    }

    // Teardown strictly after the frame loop has exited: final save, then
    // the devices drop with the engine.
    let _ = engine_task.await;

    if let Err(e) = config.save() {
        warn!("Final config save failed: {}", e);
    }

    info!("Steerpad stopped");
    Ok(())
}
