//! # Uinput Pad Module
//!
//! Virtual gamepad implementation backed by the Linux uinput interface.
//!
//! The device exposes a single absolute axis (ABS_X, signed 16-bit range)
//! for steering plus the four face buttons. Games see it as an ordinary
//! gamepad.
//!
//! ## Error Handling
//!
//! Creating the device requires write access to `/dev/uinput`; a failed
//! `connect` leaves the pad disconnected and is retried by the frame
//! scheduler. Any emit error tears the device down so the pad degrades to
//! "disconnected" instead of wedging in a half-working state.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup};
use tracing::{debug, info, warn};

use super::{PadButton, SteeringPad};
use crate::error::{Result, SteerpadError};
use crate::mapping;

/// Name the virtual device reports to the system.
const DEVICE_NAME: &str = "Steerpad Virtual Wheel";

/// Steering axis range (signed 16-bit thumbstick convention).
const AXIS_MIN: i32 = -32768;
/// Steering axis range (signed 16-bit thumbstick convention).
const AXIS_MAX: i32 = 32767;

/// Maps a pad button to the evdev key code emitted for it.
fn key_code(button: PadButton) -> Key {
    match button {
        PadButton::A => Key::BTN_SOUTH,
        PadButton::B => Key::BTN_EAST,
        PadButton::X => Key::BTN_WEST,
        PadButton::Y => Key::BTN_NORTH,
    }
}

/// Uinput-backed virtual gamepad.
///
/// Starts disconnected; call [`SteeringPad::connect`] to create the device.
pub struct UinputPad {
    device: Option<VirtualDevice>,
    last_axis: i16,
    last_buttons: [bool; 4],
}

impl std::fmt::Debug for UinputPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputPad")
            .field("connected", &self.device.is_some())
            .field("last_axis", &self.last_axis)
            .finish_non_exhaustive()
    }
}

impl Default for UinputPad {
    fn default() -> Self {
        Self::new()
    }
}

impl UinputPad {
    /// Creates a pad in the disconnected state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            device: None,
            last_axis: 0,
            last_buttons: [false; 4],
        }
    }

    /// Builds the uinput device with the steering axis and face buttons.
    fn build_device() -> Result<VirtualDevice> {
        let mut keys = AttributeSet::<Key>::new();
        for button in PadButton::ALL {
            keys.insert(key_code(button));
        }

        let axis = UinputAbsSetup::new(
            AbsoluteAxisType::ABS_X,
            AbsInfo::new(0, AXIS_MIN, AXIS_MAX, 0, 0, 0),
        );

        let device = VirtualDeviceBuilder::new()
            .map_err(|e| SteerpadError::Pad(format!("Failed to open /dev/uinput: {}", e)))?
            .name(DEVICE_NAME)
            .with_keys(&keys)
            .map_err(|e| SteerpadError::Pad(format!("Failed to set key capabilities: {}", e)))?
            .with_absolute_axis(&axis)
            .map_err(|e| SteerpadError::Pad(format!("Failed to set axis capabilities: {}", e)))?
            .build()
            .map_err(|e| SteerpadError::Pad(format!("Failed to build uinput device: {}", e)))?;

        Ok(device)
    }

    /// Fresh devices start with a centered axis and released buttons, so the
    /// change-only caches restart from that known state.
    fn reset_cache(&mut self) {
        self.last_axis = 0;
        self.last_buttons = [false; 4];
    }

    fn teardown(&mut self) {
        self.device = None;
        self.reset_cache();
    }
}

impl SteeringPad for UinputPad {
    fn connect(&mut self) -> bool {
        if self.device.is_some() {
            return true;
        }

        match Self::build_device() {
            Ok(device) => {
                info!("Virtual gamepad created: {}", DEVICE_NAME);
                self.device = Some(device);
                self.reset_cache();
                true
            }
            Err(e) => {
                warn!("Failed to create virtual gamepad: {}", e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    fn update_frame(&mut self, steering: f32) -> Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };

        let value = mapping::to_thumbstick(steering);
        if value == self.last_axis {
            return Ok(());
        }

        let event = InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, value as i32);
        match device.emit(&[event]) {
            Ok(()) => {
                self.last_axis = value;
                Ok(())
            }
            Err(e) => {
                debug!("Axis emit failed, dropping device: {}", e);
                self.teardown();
                Err(SteerpadError::Pad(format!("Failed to emit axis: {}", e)))
            }
        }
    }

    fn set_button(&mut self, button: PadButton, pressed: bool) -> Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };

        let index = button.cache_index();
        if self.last_buttons[index] == pressed {
            return Ok(());
        }

        let event = InputEvent::new(
            EventType::KEY,
            key_code(button).code(),
            if pressed { 1 } else { 0 },
        );
        match device.emit(&[event]) {
            Ok(()) => {
                self.last_buttons[index] = pressed;
                Ok(())
            }
            Err(e) => {
                debug!("Button emit failed, dropping device: {}", e);
                self.teardown();
                Err(SteerpadError::Pad(format!("Failed to emit button: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pad_starts_disconnected() {
        let pad = UinputPad::new();
        assert!(!pad.is_connected());
    }

    #[test]
    fn test_disconnected_pad_ignores_updates() {
        let mut pad = UinputPad::new();
        assert!(pad.update_frame(0.5).is_ok());
        assert!(pad.set_button(PadButton::A, true).is_ok());
    }

    #[test]
    fn test_button_key_codes() {
        assert_eq!(key_code(PadButton::A), Key::BTN_SOUTH);
        assert_eq!(key_code(PadButton::B), Key::BTN_EAST);
        assert_eq!(key_code(PadButton::X), Key::BTN_WEST);
        assert_eq!(key_code(PadButton::Y), Key::BTN_NORTH);
    }

    #[test]
    fn test_axis_range_is_signed_16_bit() {
        assert_eq!(AXIS_MIN, i16::MIN as i32);
        assert_eq!(AXIS_MAX, i16::MAX as i32);
    }

    // Integration test - requires write access to /dev/uinput
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_connect_with_real_uinput() {
        let mut pad = UinputPad::new();

        if pad.connect() {
            assert!(pad.is_connected());
            assert!(pad.update_frame(0.25).is_ok());
            assert!(pad.set_button(PadButton::A, true).is_ok());
            assert!(pad.set_button(PadButton::A, false).is_ok());
        } else {
            println!("No uinput access (this is OK for CI/CD)");
        }
    }
}
