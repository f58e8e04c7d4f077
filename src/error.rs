//! # Error Types
//!
//! Custom error types for Steerpad using `thiserror`.

use thiserror::Error;

/// Main error type for Steerpad
#[derive(Debug, Error)]
pub enum SteerpadError {
    /// No usable mouse device was found under /dev/input
    #[error("no mouse device found under /dev/input")]
    MouseNotFound,

    /// Pointer input device errors
    #[error("input device error: {0}")]
    Input(String),

    /// Virtual gamepad errors
    #[error("virtual gamepad error: {0}")]
    Pad(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Steerpad
pub type Result<T> = std::result::Result<T, SteerpadError>;
