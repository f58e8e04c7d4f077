//! # Evdev Pointer Module
//!
//! Reads the physical mouse through the Linux evdev interface and tracks a
//! pointer position inside a fixed virtual screen rectangle.
//!
//! ## Device Detection
//!
//! The first `/dev/input/event*` device advertising relative X motion and a
//! left button is used. Scanning is sorted for deterministic selection when
//! several candidates exist.
//!
//! ## Position Tracking
//!
//! Raw evdev only reports relative motion, so the pointer coordinate the
//! pipeline consumes is integrated here from `REL_X`/`REL_Y` deltas and
//! clamped to the virtual rectangle. Synthetic repositions from the
//! auto-center controller write the tracked coordinate directly, which makes
//! them exact: the next capture returns precisely the requested position.

use evdev::{Device, InputEventKind, Key, RelativeAxisType};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{PointerButton, PointerSample, PointerSource};
use crate::error::{Result, SteerpadError};

/// Left edge of the virtual screen rectangle.
pub const VIRTUAL_LEFT: i32 = 0;

/// Top edge of the virtual screen rectangle.
pub const VIRTUAL_TOP: i32 = 0;

/// Width of the virtual screen rectangle in pixels.
pub const VIRTUAL_WIDTH: i32 = 1920;

/// Height of the virtual screen rectangle in pixels.
pub const VIRTUAL_HEIGHT: i32 = 1080;

/// DPI scale reported to the pipeline. Raw evdev deltas carry no DPI
/// information, so no compensation is applied.
const DPI_SCALE: f32 = 1.0;

/// Integrated pointer position inside the virtual rectangle.
#[derive(Debug, Clone, Copy)]
struct PointerTrack {
    x: i32,
    y: i32,
}

impl PointerTrack {
    fn centered() -> Self {
        Self {
            x: VIRTUAL_LEFT + VIRTUAL_WIDTH / 2,
            y: VIRTUAL_TOP + VIRTUAL_HEIGHT / 2,
        }
    }

    fn apply_delta(&mut self, dx: i32, dy: i32) {
        self.x = (self.x + dx).clamp(VIRTUAL_LEFT, VIRTUAL_LEFT + VIRTUAL_WIDTH - 1);
        self.y = (self.y + dy).clamp(VIRTUAL_TOP, VIRTUAL_TOP + VIRTUAL_HEIGHT - 1);
    }

    fn set_x(&mut self, x: i32) {
        self.x = x.clamp(VIRTUAL_LEFT, VIRTUAL_LEFT + VIRTUAL_WIDTH - 1);
    }

    /// Whether the position rests on any edge of the rectangle.
    fn clamped(&self) -> bool {
        self.x <= VIRTUAL_LEFT
            || self.x >= VIRTUAL_LEFT + VIRTUAL_WIDTH - 1
            || self.y <= VIRTUAL_TOP
            || self.y >= VIRTUAL_TOP + VIRTUAL_HEIGHT - 1
    }
}

/// Currently held physical mouse buttons.
#[derive(Debug, Clone, Copy, Default)]
struct ButtonState {
    left: bool,
    right: bool,
    middle: bool,
    side: bool,
    extra: bool,
}

/// Physical mouse handle tracking a virtual pointer position.
pub struct EvdevPointer {
    device: Device,
    device_path: String,
    track: PointerTrack,
    buttons: ButtonState,
}

impl std::fmt::Debug for EvdevPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevPointer")
            .field("device_path", &self.device_path)
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

impl EvdevPointer {
    /// Detect and open the first available mouse device.
    ///
    /// Scans all `/dev/input/event*` devices for one that reports relative X
    /// motion and a left button, then switches it to non-blocking reads.
    ///
    /// # Errors
    ///
    /// - `MouseNotFound`: no suitable device on the system
    /// - `Input`: `/dev/input` unreadable or non-blocking setup failed
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use steerpad::pointer::device::EvdevPointer;
    ///
    /// let pointer = EvdevPointer::open()?;
    /// println!("Reading mouse at: {}", pointer.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open() -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(SteerpadError::Input(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| SteerpadError::Input(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SteerpadError::Input(format!("Failed to read directory entry: {}", e)))?;

        // Sort entries for deterministic device selection
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            if let Some(filename) = path.file_name() {
                if !filename.to_string_lossy().starts_with("event") {
                    continue;
                }
            } else {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    if !Self::is_mouse(&device) {
                        continue;
                    }

                    let device_path = path.to_string_lossy().to_string();
                    info!(
                        "Found mouse device at: {} ({})",
                        device_path,
                        device.name().unwrap_or("unnamed")
                    );

                    set_nonblocking(&device)?;

                    return Ok(Self {
                        device,
                        device_path,
                        track: PointerTrack::centered(),
                        buttons: ButtonState::default(),
                    });
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(SteerpadError::MouseNotFound)
    }

    /// Checks whether a device looks like a mouse (relative X + left button).
    fn is_mouse(device: &Device) -> bool {
        let has_rel_x = device
            .supported_relative_axes()
            .map_or(false, |axes| axes.contains(RelativeAxisType::REL_X));
        let has_left = device
            .supported_keys()
            .map_or(false, |keys| keys.contains(Key::BTN_LEFT));

        has_rel_x && has_left
    }

    /// Get the device path of the opened mouse.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Drains pending evdev events into the tracked state.
    fn drain_events(&mut self) {
        let events: Vec<_> = match self.device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No events pending this tick
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read mouse events: {}", e);
                Vec::new()
            }
        };
        for event in events {
            match event.kind() {
                InputEventKind::RelAxis(RelativeAxisType::REL_X) => {
                    self.track.apply_delta(event.value(), 0);
                }
                InputEventKind::RelAxis(RelativeAxisType::REL_Y) => {
                    self.track.apply_delta(0, event.value());
                }
                InputEventKind::Key(key) => {
                    self.apply_key(key, event.value() != 0);
                }
                _ => {
                    // Ignore sync, wheel, and other event types
                }
            }
        }
    }

    fn apply_key(&mut self, key: Key, pressed: bool) {
        match key {
            Key::BTN_LEFT => self.buttons.left = pressed,
            Key::BTN_RIGHT => self.buttons.right = pressed,
            Key::BTN_MIDDLE => self.buttons.middle = pressed,
            Key::BTN_SIDE => self.buttons.side = pressed,
            Key::BTN_EXTRA => self.buttons.extra = pressed,
            _ => {
                // Ignore unknown buttons
            }
        }
    }
}

impl PointerSource for EvdevPointer {
    fn capture(&mut self) -> PointerSample {
        self.drain_events();

        PointerSample {
            x: self.track.x,
            y: self.track.y,
            virtual_left: VIRTUAL_LEFT,
            virtual_top: VIRTUAL_TOP,
            virtual_width: VIRTUAL_WIDTH,
            virtual_height: VIRTUAL_HEIGHT,
            clamped: self.track.clamped(),
            dpi_scale: DPI_SCALE,
        }
    }

    fn is_pressed(&self, button: PointerButton) -> bool {
        match button {
            PointerButton::Primary => self.buttons.left,
            PointerButton::Secondary => self.buttons.right,
            PointerButton::Recenter => self.buttons.middle,
            PointerButton::Aux1 => self.buttons.side,
            PointerButton::Aux2 => self.buttons.extra,
        }
    }

    fn reposition_x(&mut self, x: i32) {
        self.track.set_x(x);
    }

    fn recenter(&mut self) {
        self.track = PointerTrack::centered();
    }
}

/// Switches an evdev device to non-blocking reads so a 60 Hz poll never
/// stalls the frame loop.
fn set_nonblocking(device: &Device) -> Result<()> {
    let fd = device.as_raw_fd();

    let current = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if current < 0 {
        return Err(SteerpadError::Io(std::io::Error::last_os_error()));
    }

    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(SteerpadError::Io(std::io::Error::last_os_error()));
    }

    Ok(())
}
