//! # Virtual Pad Module
//!
//! Virtual gamepad output for the steering pipeline.
//!
//! This module handles:
//! - Creating a uinput gamepad with one steering axis and four face buttons
//! - Change-only emission of axis and button state
//! - Degrading to a disconnected state on any device error, leaving
//!   reconnection to the frame scheduler's rate-limited policy
//!
//! The [`SteeringPad`] trait is the seam the frame scheduler consumes;
//! [`uinput::UinputPad`] is the production implementation.

pub mod uinput;

use crate::error::Result;

/// Gamepad face buttons driven by the pointer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadButton {
    /// A (south), driven by the primary pointer button.
    A,
    /// B (east), driven by the secondary pointer button.
    B,
    /// X (west), driven by the first aux pointer button.
    X,
    /// Y (north), driven by the second aux pointer button.
    Y,
}

impl PadButton {
    /// All buttons, in cache order.
    pub const ALL: [PadButton; 4] = [PadButton::A, PadButton::B, PadButton::X, PadButton::Y];

    pub(crate) fn cache_index(self) -> usize {
        match self {
            PadButton::A => 0,
            PadButton::B => 1,
            PadButton::X => 2,
            PadButton::Y => 3,
        }
    }
}

/// Virtual controller consumed by the frame scheduler.
///
/// Connection state is explicit: `connect` may be called repeatedly (it
/// recreates the device when disconnected), and any error from `update_frame`
/// or `set_button` leaves the implementation disconnected rather than in a
/// partially-working state. Callers are expected to ignore per-tick errors;
/// the reconnect policy handles recovery.
pub trait SteeringPad: Send {
    /// Creates (or recreates) the virtual device. Returns whether the pad is
    /// connected afterwards.
    fn connect(&mut self) -> bool;

    /// Returns whether the virtual device currently exists.
    fn is_connected(&self) -> bool;

    /// Forwards a steering value to the device's axis.
    ///
    /// A no-op while disconnected.
    fn update_frame(&mut self, steering: f32) -> Result<()>;

    /// Forwards a button state to the device.
    ///
    /// A no-op while disconnected.
    fn set_button(&mut self, button: PadButton, pressed: bool) -> Result<()>;
}
