//! # Auto-Center Module
//!
//! Spring-damper simulation that returns the steering value to center after
//! the user stops moving the pointer.
//!
//! ## Behavior
//!
//! The controller watches the raw pointer coordinate for movement. While the
//! user is driving, every sample passes through untouched. Once the pointer
//! has been still for the configured delay, a critically-damped spring pulls
//! the steering value back toward zero, and each simulation step also emits a
//! synthetic pointer coordinate (via the inverse mapping) so the next raw
//! sample agrees with the simulated value instead of fighting it.
//!
//! ## State machine
//!
//! Idle (no baseline) → Initialized → Tracking (user-driven) ⇄ Centering
//! (spring active). Disabling auto-center, toggling emulation off, or any
//! pointer movement past the threshold resets fully back to Idle.

use crate::mapping;

/// Pointer movement above this many pixels counts as user input.
const MOVE_THRESHOLD: f32 = 1.0;

/// Below this magnitude both steering and velocity snap to exactly zero.
const SNAP_EPSILON: f32 = 2e-4;

/// Spring velocity is clamped to this magnitude.
const MAX_VELOCITY: f32 = 15.0;

/// Velocity damping factor applied while the pointer is pinned on a screen
/// edge and cannot physically move further.
const EDGE_DAMPING: f32 = 0.4;

/// Tuning parameters for one auto-center step, read from configuration each
/// tick.
#[derive(Debug, Clone, Copy)]
pub struct CenterParams {
    /// Master switch; when false the controller resets and passes through.
    pub enabled: bool,
    /// Spring stiffness (configuration "strength").
    pub stiffness: f32,
    /// Fraction of critical damping to apply.
    pub damping_ratio: f32,
    /// Seconds of pointer stillness before the spring engages.
    pub delay: f32,
    /// Active deadzone, needed to invert the mapping for repositioning.
    pub deadzone: f32,
    /// Active response curve, needed to invert the mapping.
    pub curve: f32,
}

/// Result of one auto-center step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterOutcome {
    /// Steering value after this step.
    pub steering: f32,
    /// Synthetic pointer X to apply so the next capture matches `steering`.
    /// `None` when the spring did not run this tick.
    pub reposition: Option<i32>,
}

impl CenterOutcome {
    fn pass_through(steering: f32) -> Self {
        Self {
            steering,
            reposition: None,
        }
    }
}

/// Per-session auto-center state.
///
/// One instance lives inside the frame scheduler. All fields are reset
/// whenever auto-centering is disabled, the user moves the pointer, or
/// emulation is toggled off.
#[derive(Debug, Default)]
pub struct AutoCenter {
    /// Current rate of steering drift, clamped to ±[`MAX_VELOCITY`].
    velocity: f32,
    /// Seconds accumulated since the last detected user movement.
    idle_timer: f32,
    /// Last observed raw pointer X, used only to detect movement.
    last_pointer_x: i32,
    /// Whether `last_pointer_x` holds a valid baseline.
    initialized: bool,
}

impl AutoCenter {
    /// Creates a controller in the Idle state (no baseline).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one auto-center step.
    ///
    /// # Arguments
    ///
    /// * `params` - Current tuning, read from configuration this tick
    /// * `current_steering` - Smoothed steering value entering this step
    /// * `pointer_x` - Raw pointer X captured this tick
    /// * `virtual_left` / `screen_width` - Geometry for the inverse mapping
    /// * `pointer_clamped` - Whether the pointer is pinned on a screen edge
    /// * `delta_time` - Physics step in seconds (already clamped by the
    ///   scheduler)
    ///
    /// # Returns
    ///
    /// The steering value to forward this tick, plus an optional synthetic
    /// pointer coordinate the caller must apply to the input source.
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &mut self,
        params: &CenterParams,
        current_steering: f32,
        pointer_x: i32,
        virtual_left: i32,
        screen_width: i32,
        pointer_clamped: bool,
        delta_time: f32,
    ) -> CenterOutcome {
        if !params.enabled {
            self.reset();
            return CenterOutcome::pass_through(current_steering);
        }

        // No physics on a degenerate tick.
        if delta_time <= 0.0 {
            return CenterOutcome::pass_through(current_steering);
        }

        if !self.initialized {
            self.last_pointer_x = pointer_x;
            self.velocity = 0.0;
            self.idle_timer = 0.0;
            self.initialized = true;
            return CenterOutcome::pass_through(current_steering);
        }

        let pointer_delta = (pointer_x - self.last_pointer_x).abs() as f32;
        self.last_pointer_x = pointer_x;

        if pointer_delta > MOVE_THRESHOLD {
            // User input always overrides the spring.
            self.idle_timer = 0.0;
            self.velocity = 0.0;
            return CenterOutcome::pass_through(current_steering);
        }

        self.idle_timer += delta_time;

        if self.idle_timer < params.delay {
            return CenterOutcome::pass_through(current_steering);
        }

        // Critically-damped spring toward zero, scaled by the damping ratio.
        let critical = 2.0 * params.stiffness.sqrt();
        let damping = critical * params.damping_ratio;

        let acceleration = -params.stiffness * current_steering - damping * self.velocity;

        self.velocity += acceleration * delta_time;
        self.velocity = self.velocity.clamp(-MAX_VELOCITY, MAX_VELOCITY);

        let mut steering = current_steering + self.velocity * delta_time;

        if steering.abs() < SNAP_EPSILON && self.velocity.abs() < SNAP_EPSILON {
            steering = 0.0;
            self.velocity = 0.0;
        }

        steering = steering.clamp(-1.0, 1.0);

        if pointer_clamped {
            self.velocity *= EDGE_DAMPING;
        }

        let new_pointer_x = mapping::steering_to_pointer_x(
            steering,
            virtual_left,
            screen_width,
            params.deadzone,
            params.curve,
        );

        // The repositioned coordinate becomes the movement baseline so the
        // spring's own motion is never classified as user input.
        self.last_pointer_x = new_pointer_x;

        CenterOutcome {
            steering,
            reposition: Some(new_pointer_x),
        }
    }

    /// Resets all state back to Idle (no baseline).
    pub fn reset(&mut self) {
        self.velocity = 0.0;
        self.idle_timer = 0.0;
        self.initialized = false;
    }
}
