//! # Engine Module
//!
//! The fixed-rate frame scheduler that owns the steering pipeline.
//!
//! ## Per-Tick Sequence
//!
//! 1. Compute the wall-clock delta since the previous tick, clamped to
//!    [0, 0.05] s so a scheduler stall (or system sleep) never produces an
//!    oversized physics step
//! 2. Capture pointer state
//! 3. Recenter the pointer on a rising edge of the recenter button
//! 4. Active: raw steering → exponential smoothing → auto-center.
//!    Inactive: decay the output toward center and reset the auto-center
//! 5. Forward steering and button state to the virtual pad, swallowing any
//!    device error for this tick
//! 6. Debounced-save and reconnect housekeeping
//! 7. Sleep whatever remains of the tick budget (no sleep on overrun)
//!
//! The loop checks its cancellation token at the top of every iteration and
//! exits without a final device update; teardown belongs to the caller.

use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::autocenter::{AutoCenter, CenterParams};
use crate::clock::Clock;
use crate::config::SharedConfig;
use crate::mapping;
use crate::pad::{PadButton, SteeringPad};
use crate::pointer::{PointerButton, PointerSource};

/// Target frame rate of the control loop in Hz.
pub const TARGET_FPS: u32 = 60;

/// Maximum physics step in seconds, regardless of scheduling jitter.
const MAX_DELTA: f32 = 0.05;

/// Minimum spacing between virtual pad reconnect attempts.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

/// Quiet window after a configuration change before it is written out.
const SAVE_DEBOUNCE: f32 = 0.5;

/// Scale from smoothing responsiveness (`1 - smoothing`) to filter speed.
const SMOOTHING_SPEED_SCALE: f32 = 20.0;

/// Fixed decay speed toward center while emulation is paused.
const INACTIVE_DECAY_SPEED: f32 = 5.0;

/// Live pipeline status published once per tick for the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStatus {
    /// Steering value forwarded this tick.
    pub steering: f32,
    /// Whether the virtual pad currently exists.
    pub pad_connected: bool,
}

/// The frame scheduler.
///
/// Owns the input source, the virtual pad, and the auto-center state; shares
/// the configuration with the UI task. Collaborators and the clock are
/// injected so the whole tick sequence runs under a virtual clock in tests.
pub struct Engine<I, P, C> {
    input: I,
    pad: P,
    clock: C,
    config: SharedConfig,
    auto_center: AutoCenter,
    previous_steering: f32,
    previous_recenter: bool,
    save_pending: bool,
    save_timer: f32,
    last_reconnect: Duration,
    last_tick: Duration,
    status_tx: watch::Sender<EngineStatus>,
}

impl<I, P, C> Engine<I, P, C>
where
    I: PointerSource,
    P: SteeringPad,
    C: Clock,
{
    /// Creates an engine over already-constructed collaborators.
    ///
    /// The pad is expected to have had its initial `connect` attempt; a pad
    /// that starts disconnected is simply picked up by the reconnect policy.
    pub fn new(input: I, pad: P, clock: C, config: SharedConfig) -> Self {
        let (status_tx, _) = watch::channel(EngineStatus::default());

        Self {
            input,
            pad,
            clock,
            config,
            auto_center: AutoCenter::new(),
            previous_steering: 0.0,
            previous_recenter: false,
            save_pending: false,
            save_timer: 0.0,
            last_reconnect: Duration::ZERO,
            last_tick: Duration::ZERO,
            status_tx,
        }
    }

    /// Subscribes to per-tick status updates.
    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }

    /// Runs the control loop until the token is cancelled.
    ///
    /// Cancellation is observed at the top of every iteration and during the
    /// tick-budget sleep; the loop exits without issuing a final device
    /// update. The caller handles teardown afterwards.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let period = Duration::from_secs(1) / TARGET_FPS;

        self.last_tick = self.clock.now();
        info!("Frame loop running at {}Hz", TARGET_FPS);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let frame_start = self.step();

            let work = self.clock.now().saturating_sub(frame_start);
            if let Some(remaining) = period.checked_sub(work) {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.clock.sleep(remaining) => {}
                }
            }
            // Overrun: proceed straight to the next tick.
        }

        info!("Frame loop stopped");
    }

    /// Executes one full scheduler iteration (tick plus housekeeping),
    /// without the budget sleep. Returns the tick's start time.
    pub fn step(&mut self) -> Duration {
        let frame_start = self.clock.now();

        let delta = frame_start
            .saturating_sub(self.last_tick)
            .as_secs_f32()
            .min(MAX_DELTA);
        self.last_tick = frame_start;

        self.process_frame(delta);
        self.handle_deferred_save(delta);
        self.handle_reconnect(frame_start);

        frame_start
    }

    fn process_frame(&mut self, delta: f32) {
        let sample = self.input.capture();

        // Rising edge on the recenter button snaps the pointer to center.
        let recenter = self.input.is_pressed(PointerButton::Recenter);
        if recenter && !self.previous_recenter {
            self.input.recenter();
        }
        self.previous_recenter = recenter;

        let settings = self.config.snapshot();

        let steering = if settings.emulation_active {
            let target = mapping::calculate_steering(
                sample.x,
                sample.virtual_left,
                sample.virtual_width,
                settings.deadzone,
                settings.curve,
                sample.dpi_scale,
            );

            let smoothed = if settings.smoothing <= 0.0 {
                target
            } else {
                let speed = (1.0 - settings.smoothing) * SMOOTHING_SPEED_SCALE;
                mapping::exp_smoothing(self.previous_steering, target, speed, delta)
            };

            let params = CenterParams {
                enabled: settings.auto_center_enabled,
                stiffness: settings.auto_center_strength,
                damping_ratio: settings.auto_center_damping,
                delay: settings.auto_center_delay_ms as f32 / 1000.0,
                deadzone: settings.deadzone,
                curve: settings.curve,
            };

            let outcome = self.auto_center.process(
                &params,
                smoothed,
                sample.x,
                sample.virtual_left,
                sample.virtual_width,
                sample.clamped,
                delta,
            );

            if let Some(x) = outcome.reposition {
                self.input.reposition_x(x);
            }

            outcome.steering
        } else {
            // No stale spring state may survive a pause.
            self.auto_center.reset();
            mapping::exp_smoothing(self.previous_steering, 0.0, INACTIVE_DECAY_SPEED, delta)
        };

        self.previous_steering = steering;

        // Output failures never break the tick; the reconnect policy
        // recovers them.
        if let Err(e) = self.pad.update_frame(steering) {
            debug!("Pad frame update failed: {}", e);
        }
        self.forward_buttons(settings.primary_buttons);

        let _ = self.status_tx.send(EngineStatus {
            steering,
            pad_connected: self.pad.is_connected(),
        });
    }

    fn forward_buttons(&mut self, enabled: bool) {
        let states = if enabled {
            [
                (PadButton::A, self.input.is_pressed(PointerButton::Primary)),
                (PadButton::B, self.input.is_pressed(PointerButton::Secondary)),
                (PadButton::X, self.input.is_pressed(PointerButton::Aux1)),
                (PadButton::Y, self.input.is_pressed(PointerButton::Aux2)),
            ]
        } else {
            [
                (PadButton::A, false),
                (PadButton::B, false),
                (PadButton::X, false),
                (PadButton::Y, false),
            ]
        };

        for (button, pressed) in states {
            if let Err(e) = self.pad.set_button(button, pressed) {
                debug!("Pad button update failed: {}", e);
                break;
            }
        }
    }

    /// Coalesces rapid configuration changes into one write: each new
    /// mutation restarts the quiet window.
    fn handle_deferred_save(&mut self, delta: f32) {
        if self.config.take_dirty() {
            self.save_pending = true;
            self.save_timer = 0.0;
        }

        if !self.save_pending {
            return;
        }

        self.save_timer += delta;
        if self.save_timer >= SAVE_DEBOUNCE {
            if let Err(e) = self.config.save() {
                warn!("Deferred config save failed: {}", e);
            }
            self.save_pending = false;
            self.save_timer = 0.0;
        }
    }

    /// Attempts to recreate a lost pad, at most once every two seconds. The
    /// attempt time is recorded regardless of outcome.
    fn handle_reconnect(&mut self, now: Duration) {
        if self.pad.is_connected() {
            return;
        }
        if now.saturating_sub(self.last_reconnect) < RECONNECT_INTERVAL {
            return;
        }

        self.last_reconnect = now;

        if self.pad.connect() {
            info!("Virtual pad reconnected");
        } else {
            debug!("Virtual pad reconnect attempt failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mocks::ManualClock;
    use crate::pad::mocks::MockPad;
    use crate::pointer::mocks::MockPointer;

    const TICK: Duration = Duration::from_millis(16);

    fn build_engine(
        config: SharedConfig,
    ) -> (
        Engine<MockPointer, MockPad, ManualClock>,
        MockPointer,
        MockPad,
    ) {
        let pointer = MockPointer::new();
        let pad = MockPad::new();
        let engine = Engine::new(
            pointer.clone(),
            pad.clone(),
            ManualClock::new(),
            config,
        );
        (engine, pointer, pad)
    }

    fn advance_and_step(engine: &mut Engine<MockPointer, MockPad, ManualClock>, by: Duration) {
        engine.clock.advance(by);
        engine.step();
    }

    // ==================== Delta Clamping Tests ====================

    #[test]
    fn test_stall_clamps_physics_step() {
        let run = |stall: Duration| {
            let (mut engine, pointer, _pad) = build_engine(SharedConfig::new());
            let status = engine.status();
            pointer.set_x(1800);
            advance_and_step(&mut engine, stall);
            let steering = status.borrow().steering;
            steering
        };

        // A ten-second stall behaves exactly like a 50ms tick.
        let stalled = run(Duration::from_secs(10));
        let clamped = run(Duration::from_millis(50));
        assert_eq!(stalled, clamped);
        assert!(stalled > 0.0);
    }

    // ==================== Recenter Button Tests ====================

    #[test]
    fn test_recenter_on_rising_edge_only() {
        let (mut engine, pointer, _pad) = build_engine(SharedConfig::new());

        pointer.set_pressed(PointerButton::Recenter, true);
        advance_and_step(&mut engine, TICK);
        assert_eq!(pointer.recenter_count(), 1);

        // Held button does not retrigger.
        advance_and_step(&mut engine, TICK);
        advance_and_step(&mut engine, TICK);
        assert_eq!(pointer.recenter_count(), 1);

        pointer.set_pressed(PointerButton::Recenter, false);
        advance_and_step(&mut engine, TICK);
        pointer.set_pressed(PointerButton::Recenter, true);
        advance_and_step(&mut engine, TICK);
        assert_eq!(pointer.recenter_count(), 2);
    }

    // ==================== Pipeline Tests ====================

    #[test]
    fn test_zero_smoothing_applies_target_directly() {
        let config = SharedConfig::new();
        config.set_smoothing(0.0);
        config.toggle_auto_center(); // isolate the mapping path
        config.take_dirty();

        let (mut engine, pointer, pad) = build_engine(config.clone());
        pointer.set_x(1800);
        advance_and_step(&mut engine, TICK);

        let settings = config.snapshot();
        let expected = mapping::calculate_steering(1800, 0, 1920, settings.deadzone, settings.curve, 1.0);
        assert_eq!(pad.frames(), vec![expected]);
    }

    #[test]
    fn test_smoothing_lags_behind_target() {
        let config = SharedConfig::new();
        config.toggle_auto_center();
        config.take_dirty();

        let (mut engine, pointer, pad) = build_engine(config.clone());
        pointer.set_x(1800);
        advance_and_step(&mut engine, TICK);

        let settings = config.snapshot();
        let target = mapping::calculate_steering(1800, 0, 1920, settings.deadzone, settings.curve, 1.0);
        let frames = pad.frames();
        assert!(frames[0] > 0.0 && frames[0] < target, "expected lag, got {frames:?}");
    }

    #[test]
    fn test_auto_center_drives_pointer_home() {
        let config = SharedConfig::new();
        config.set_smoothing(0.0);
        config.take_dirty();

        let (mut engine, pointer, _pad) = build_engine(config);
        let status = engine.status();
        pointer.set_x(1800);

        for _ in 0..400 {
            advance_and_step(&mut engine, TICK);
        }

        assert_eq!(status.borrow().steering, 0.0);
        assert_eq!(pointer.current_x(), 960, "pointer should end at center");
        assert!(!pointer.repositions().is_empty());
    }

    #[test]
    fn test_inactive_decays_to_center() {
        let config = SharedConfig::new();
        config.set_smoothing(0.0);
        config.toggle_auto_center(); // isolate the decay path
        config.take_dirty();

        let (mut engine, pointer, pad) = build_engine(config.clone());
        let status = engine.status();
        pointer.set_x(1800);
        advance_and_step(&mut engine, TICK);
        let active = status.borrow().steering;
        assert!(active > 0.5);

        config.toggle_emulation(); // pause
        advance_and_step(&mut engine, TICK);
        let first_paused = status.borrow().steering;
        assert!(first_paused < active, "output should start decaying");

        for _ in 0..300 {
            advance_and_step(&mut engine, TICK);
        }
        let last = *pad.frames().last().unwrap();
        assert!(last.abs() < 1e-3, "paused output should decay, got {last}");
        assert!(
            pointer.repositions().is_empty(),
            "no synthetic repositions while paused"
        );
    }

    // ==================== Pad Error Tests ====================

    #[test]
    fn test_pad_error_never_breaks_the_tick() {
        let (mut engine, pointer, pad) = build_engine(SharedConfig::new());
        let status = engine.status();
        pointer.set_x(1800);

        pad.fail_next_update();
        advance_and_step(&mut engine, TICK);
        assert!(!status.borrow().pad_connected);

        // Subsequent ticks keep running.
        advance_and_step(&mut engine, TICK);
        advance_and_step(&mut engine, TICK);
    }

    // ==================== Button Forwarding Tests ====================

    #[test]
    fn test_buttons_forwarded_when_enabled() {
        let config = SharedConfig::new();
        config.toggle_primary_buttons();
        config.take_dirty();

        let (mut engine, pointer, pad) = build_engine(config);
        pointer.set_pressed(PointerButton::Primary, true);
        pointer.set_pressed(PointerButton::Aux2, true);
        advance_and_step(&mut engine, TICK);

        let buttons = pad.buttons();
        assert!(buttons.contains(&(PadButton::A, true)));
        assert!(buttons.contains(&(PadButton::B, false)));
        assert!(buttons.contains(&(PadButton::Y, true)));
    }

    #[test]
    fn test_buttons_released_when_disabled() {
        let (mut engine, pointer, pad) = build_engine(SharedConfig::new());
        pointer.set_pressed(PointerButton::Primary, true);
        advance_and_step(&mut engine, TICK);

        assert!(pad.buttons().contains(&(PadButton::A, false)));
    }

    // ==================== Debounced Save Tests ====================

    #[test]
    fn test_save_debounce_coalesces_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steerpad.cfg");
        let config = SharedConfig::with_store(Some(path.clone()));

        let (mut engine, _pointer, _pad) = build_engine(config.clone());
        let tick = Duration::from_millis(100);

        config.adjust_deadzone(0.01);
        for _ in 0..3 {
            advance_and_step(&mut engine, tick);
        }
        assert!(!path.exists(), "save fired before the quiet window elapsed");

        // A second mutation restarts the window.
        config.adjust_deadzone(0.01);
        for _ in 0..4 {
            advance_and_step(&mut engine, tick);
        }
        assert!(!path.exists(), "window was not restarted by the new mutation");

        advance_and_step(&mut engine, tick);
        assert!(path.exists(), "save should fire after 0.5s of quiet");

        // Both mutations landed in the single write.
        let reloaded = SharedConfig::with_store(Some(path));
        reloaded.load();
        assert!((reloaded.snapshot().deadzone - 0.07).abs() < 1e-6);
    }

    // ==================== Reconnect Tests ====================

    #[test]
    fn test_reconnect_rate_limited_to_two_seconds() {
        let (mut engine, _pointer, pad) = build_engine(SharedConfig::new());
        pad.disconnect();
        pad.set_connect_should_succeed(false);

        let tick = Duration::from_millis(100);

        // t in (0, 2.0): still inside the initial gate, no attempts.
        for _ in 0..19 {
            advance_and_step(&mut engine, tick);
        }
        assert_eq!(pad.connect_attempts(), 0);

        // t = 2.0: first attempt.
        advance_and_step(&mut engine, tick);
        assert_eq!(pad.connect_attempts(), 1);

        // Next attempt no earlier than t = 4.0.
        for _ in 0..19 {
            advance_and_step(&mut engine, tick);
        }
        assert_eq!(pad.connect_attempts(), 1);
        advance_and_step(&mut engine, tick);
        assert_eq!(pad.connect_attempts(), 2);
    }

    #[test]
    fn test_reconnect_stops_once_connected() {
        let (mut engine, _pointer, pad) = build_engine(SharedConfig::new());
        pad.disconnect();

        let tick = Duration::from_millis(500);
        for _ in 0..4 {
            advance_and_step(&mut engine, tick);
        }
        assert_eq!(pad.connect_attempts(), 1);
        assert!(pad.is_connected());

        for _ in 0..10 {
            advance_and_step(&mut engine, tick);
        }
        assert_eq!(pad.connect_attempts(), 1);
    }

    // ==================== Cancellation Tests ====================

    #[tokio::test]
    async fn test_cancelled_token_exits_before_first_tick() {
        let (mut engine, _pointer, pad) = build_engine(SharedConfig::new());

        let cancel = CancellationToken::new();
        cancel.cancel();
        engine.run(cancel).await;

        assert!(pad.frames().is_empty(), "no device update after cancellation");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_ticks_until_cancelled() {
        let pointer = MockPointer::new();
        let pad = MockPad::new();
        let config = SharedConfig::new();
        config.set_smoothing(0.0);
        config.take_dirty();

        let mut engine = Engine::new(
            pointer.clone(),
            pad.clone(),
            crate::clock::MonotonicClock::new(),
            config,
        );
        pointer.set_x(1800);

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(async move { engine.run(child).await });

        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(pad.frames().len() > 1, "loop should have ticked repeatedly");
    }
}
