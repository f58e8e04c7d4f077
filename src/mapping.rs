//! # Steering Mapping Module
//!
//! Pure functions converting a pointer position into a normalized steering
//! value and back.
//!
//! ## Pipeline
//!
//! The forward direction composes, in order: linear normalization about the
//! screen center, DPI compensation, deadzone, response curve. The inverse
//! direction ([`steering_to_pointer_x`]) undoes the curve and deadzone
//! algebraically and denormalizes back to a pixel coordinate, which the
//! auto-center controller uses to keep the physical pointer in agreement
//! with a simulated steering value.
//!
//! ## Deadzone
//!
//! Magnitudes at or below the deadzone collapse to exactly 0. Magnitudes
//! above are rescaled linearly so the output still spans the full range,
//! preserving sign.
//!
//! ## Response curve
//!
//! The curve exponent reshapes sensitivity: `output = |input|^curve` with the
//! sign restored. Exponents below 1.0 make the center more sensitive,
//! exponents above 1.0 make it less so. A curve within `1e-4` of 1.0 is
//! treated as identity to avoid needless floating-point drift.
//!
//! ## Usage
//!
//! ```
//! use steerpad::mapping;
//!
//! // Pointer at screen center maps to zero steering.
//! let steering = mapping::calculate_steering(960, 0, 1920, 0.05, 1.0, 1.0);
//! assert_eq!(steering, 0.0);
//!
//! // Right edge maps to full right steering.
//! let steering = mapping::calculate_steering(1920, 0, 1920, 0.0, 1.0, 1.0);
//! assert!((steering - 1.0).abs() < 1e-6);
//! ```

/// Curves within this distance of 1.0 are treated as identity.
const CURVE_IDENTITY_EPSILON: f32 = 1e-4;

/// DPI scales at or below this value are ignored (treated as no compensation).
const DPI_EPSILON: f32 = 1e-6;

/// Clamps a value to the normalized steering range [-1.0, 1.0].
#[inline]
fn clamp_unit(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Sign with zero preserved. `f32::signum` maps 0.0 to 1.0, which would
/// offset the deadzone inverse away from center for a zero input.
#[inline]
fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Maps a pointer position linearly onto [-1.0, 1.0] relative to the center
/// of the width span.
///
/// Returns 0.0 for degenerate geometry (`width <= 0`).
///
/// # Examples
///
/// ```
/// use steerpad::mapping::normalize;
///
/// assert_eq!(normalize(500, 0, 1000), 0.0);
/// assert_eq!(normalize(1000, 0, 1000), 1.0);
/// assert_eq!(normalize(0, 0, 1000), -1.0);
/// assert_eq!(normalize(123, 0, 0), 0.0);
/// ```
#[must_use]
pub fn normalize(pointer_x: i32, virtual_left: i32, width: i32) -> f32 {
    if width <= 0 {
        return 0.0;
    }

    let center = virtual_left as f32 + width as f32 * 0.5;
    let half = width as f32 * 0.5;

    clamp_unit((pointer_x as f32 - center) / half)
}

/// Applies a deadzone to a normalized value.
///
/// Magnitudes at or below `deadzone` collapse to exactly 0. Magnitudes above
/// are rescaled so the output still spans the full [0, 1] range beyond the
/// deadzone, preserving sign.
///
/// # Examples
///
/// ```
/// use steerpad::mapping::apply_deadzone;
///
/// assert_eq!(apply_deadzone(0.05, 0.1), 0.0);
/// assert_eq!(apply_deadzone(-0.05, 0.1), 0.0);
/// assert!((apply_deadzone(1.0, 0.1) - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    let abs = value.abs();
    if abs <= deadzone {
        return 0.0;
    }

    let scaled = (abs - deadzone) / (1.0 - deadzone);

    sign(value) * scaled.clamp(0.0, 1.0)
}

/// Raises the magnitude of a normalized value to the power `curve`,
/// preserving sign.
///
/// A curve within `1e-4` of 1.0 is treated as identity.
///
/// # Examples
///
/// ```
/// use steerpad::mapping::apply_curve;
///
/// assert_eq!(apply_curve(0.5, 1.0), 0.5);
/// assert!((apply_curve(0.5, 2.0) - 0.25).abs() < 1e-6);
/// assert!((apply_curve(-0.5, 2.0) + 0.25).abs() < 1e-6);
/// ```
#[must_use]
pub fn apply_curve(value: f32, curve: f32) -> f32 {
    if (curve - 1.0).abs() < CURVE_IDENTITY_EPSILON {
        return value;
    }

    sign(value) * value.abs().powf(curve)
}

/// Exact algebraic inverse of [`apply_curve`].
///
/// # Examples
///
/// ```
/// use steerpad::mapping::{apply_curve, remove_curve};
///
/// let curved = apply_curve(0.5, 2.0);
/// assert!((remove_curve(curved, 2.0) - 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn remove_curve(value: f32, curve: f32) -> f32 {
    if (curve - 1.0).abs() < CURVE_IDENTITY_EPSILON {
        return value;
    }

    sign(value) * value.abs().powf(1.0 / curve)
}

/// Converts a raw pointer position into a steering value in [-1.0, 1.0].
///
/// Composes normalization, DPI compensation (applied only when `dpi_scale`
/// is meaningfully positive), deadzone, and response curve.
///
/// # Arguments
///
/// * `pointer_x` - Raw pointer X coordinate
/// * `virtual_left` - Left edge of the virtual screen span
/// * `width` - Width of the virtual screen span in pixels
/// * `deadzone` - Deadzone fraction (0.0 to 0.5)
/// * `curve` - Response curve exponent (0.1 to 3.0)
/// * `dpi_scale` - DPI scale factor; positions are divided by it
///
/// # Examples
///
/// ```
/// use steerpad::mapping::calculate_steering;
///
/// assert_eq!(calculate_steering(500, 0, 1000, 0.1, 1.0, 1.0), 0.0);
/// assert!((calculate_steering(1000, 0, 1000, 0.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn calculate_steering(
    pointer_x: i32,
    virtual_left: i32,
    width: i32,
    deadzone: f32,
    curve: f32,
    dpi_scale: f32,
) -> f32 {
    let mut normalized = normalize(pointer_x, virtual_left, width);

    if dpi_scale > DPI_EPSILON {
        normalized *= 1.0 / dpi_scale;
    }

    normalized = clamp_unit(normalized);
    normalized = apply_deadzone(normalized, deadzone);
    normalized = apply_curve(normalized, curve);

    clamp_unit(normalized)
}

/// Converts a steering value back into the pointer coordinate that would
/// produce it.
///
/// Exact round-trip inverse of [`calculate_steering`] (at DPI scale 1.0) up
/// to integer rounding. The result is clamped to the valid pointer range
/// `[virtual_left, virtual_left + width - 1]`.
///
/// # Examples
///
/// ```
/// use steerpad::mapping::steering_to_pointer_x;
///
/// // Zero steering maps to the center of the span.
/// assert_eq!(steering_to_pointer_x(0.0, 0, 1000, 0.1, 1.0), 500);
/// ```
#[must_use]
pub fn steering_to_pointer_x(
    steering: f32,
    virtual_left: i32,
    width: i32,
    deadzone: f32,
    curve: f32,
) -> i32 {
    let steering = clamp_unit(steering);

    let linear = remove_curve(steering, curve);
    let abs = linear.abs();

    // Deadzone inverse: shift the magnitude back above the deadzone band.
    let with_deadzone = abs * (1.0 - deadzone) + deadzone;
    let normalized = sign(linear) * with_deadzone;

    let center = virtual_left as f32 + width as f32 * 0.5;
    let half = width as f32 * 0.5;

    let pointer = (center + normalized * half).round();
    let max = (virtual_left + width - 1) as f32;

    pointer.clamp(virtual_left as f32, max) as i32
}

/// Linear interpolation between `a` and `b` with `t` clamped to [0, 1].
#[must_use]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    a + (b - a) * t
}

/// First-order exponential lag filter.
///
/// Moves `current` toward `target` by the factor `1 - e^(-speed * dt)`.
/// Returns `current` unchanged when `delta_time <= 0` so a degenerate tick
/// never advances the filter.
///
/// # Examples
///
/// ```
/// use steerpad::mapping::exp_smoothing;
///
/// // Zero time is a no-op.
/// assert_eq!(exp_smoothing(0.3, 1.0, 10.0, 0.0), 0.3);
///
/// // A long step converges onto the target.
/// assert!((exp_smoothing(0.3, 1.0, 10.0, 100.0) - 1.0).abs() < 1e-4);
/// ```
#[must_use]
pub fn exp_smoothing(current: f32, target: f32, speed: f32, delta_time: f32) -> f32 {
    if delta_time <= 0.0 {
        return current;
    }

    let factor = 1.0 - (-speed * delta_time).exp();
    lerp(current, target, factor)
}

/// Maps a steering value onto the signed 16-bit thumbstick axis range.
///
/// # Examples
///
/// ```
/// use steerpad::mapping::to_thumbstick;
///
/// assert_eq!(to_thumbstick(0.0), 0);
/// assert_eq!(to_thumbstick(1.0), 32767);
/// assert_eq!(to_thumbstick(-1.0), -32767);
/// ```
#[must_use]
pub fn to_thumbstick(steering: f32) -> i16 {
    let steering = clamp_unit(steering);
    (steering * 32767.0).round() as i16
}
