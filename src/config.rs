//! # Configuration Module
//!
//! Shared tunables for the steering pipeline, plus their persistence.
//!
//! ## Ownership
//!
//! One [`SharedConfig`] is created at startup and handed (cheaply cloned) to
//! both the frame scheduler and the interactive UI. The UI mutates through
//! typed setters; the scheduler reads a snapshot each tick. Every setter
//! clamps to the documented range before the value becomes visible, so a
//! reader can never observe an out-of-range field.
//!
//! ## Persistence
//!
//! Settings persist to a versioned, line-oriented `Key=Value` text file in
//! the user's config directory. Unknown keys are ignored on load, missing
//! keys keep their defaults, and a missing or unreadable file regenerates
//! the store from defaults. Numeric values use the locale-invariant Rust
//! `Display` form.
//!
//! Mutations raise a dirty flag that the frame scheduler turns into a
//! debounced save, so rapid adjustments coalesce into a single write.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Store format version written to the file.
const STORE_VERSION: u32 = 2;

/// All user-tunable parameters with their validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Central input band mapped to zero steering. Range [0.0, 0.5].
    pub deadzone: f32,
    /// Smoothing coefficient; 0 disables the lag filter. Range [0.0, 1.0].
    pub smoothing: f32,
    /// Response curve exponent. Range [0.1, 3.0].
    pub curve: f32,
    /// Auto-center master switch.
    pub auto_center_enabled: bool,
    /// Auto-center spring stiffness. Range [0.5, 20.0].
    pub auto_center_strength: f32,
    /// Pointer stillness before the spring engages, in ms. Range [0, 2000].
    pub auto_center_delay_ms: u32,
    /// Fraction of critical damping. Range [0.5, 0.999].
    pub auto_center_damping: f32,
    /// Whether the pipeline drives the virtual pad at all.
    pub emulation_active: bool,
    /// Whether pointer buttons are forwarded to the pad's face buttons.
    pub primary_buttons: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deadzone: 0.05,
            smoothing: 0.2,
            curve: 1.0,
            auto_center_enabled: true,
            auto_center_strength: 6.0,
            auto_center_delay_ms: 150,
            auto_center_damping: 0.90,
            emulation_active: true,
            primary_buttons: false,
        }
    }
}

impl Settings {
    /// Clamps every field to its documented range.
    ///
    /// Called after every mutation and after every load, so invariants hold
    /// before any reader sees the values.
    pub fn validate(&mut self) {
        self.deadzone = self.deadzone.clamp(0.0, 0.5);
        self.smoothing = self.smoothing.clamp(0.0, 1.0);
        self.curve = self.curve.clamp(0.1, 3.0);

        self.auto_center_strength = self.auto_center_strength.clamp(0.5, 20.0);
        self.auto_center_delay_ms = self.auto_center_delay_ms.min(2000);
        self.auto_center_damping = self.auto_center_damping.clamp(0.5, 0.999);
    }
}

/// Thread-safe configuration shared between the scheduler and the UI.
///
/// Clones share the same underlying state.
///
/// # Examples
///
/// ```
/// use steerpad::config::SharedConfig;
///
/// let config = SharedConfig::new();
/// config.set_deadzone(10.0); // clamped on write
/// assert_eq!(config.snapshot().deadzone, 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<ConfigInner>,
}

#[derive(Debug)]
struct ConfigInner {
    settings: RwLock<Settings>,
    dirty: AtomicBool,
    store_path: Option<PathBuf>,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedConfig {
    /// Creates an in-memory configuration with default values and no backing
    /// store. Used by tests and as the fallback when no config directory
    /// exists.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(None)
    }

    /// Creates a configuration backed by the given store path.
    #[must_use]
    pub fn with_store(store_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ConfigInner {
                settings: RwLock::new(Settings::default()),
                dirty: AtomicBool::new(false),
                store_path,
            }),
        }
    }

    /// The default store location: `<config dir>/steerpad/steerpad.cfg`.
    #[must_use]
    pub fn default_store_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("steerpad").join("steerpad.cfg"))
    }

    /// Loads settings from the backing store.
    ///
    /// A missing file writes the defaults out; an unreadable file keeps the
    /// defaults and regenerates the store. Unknown keys are ignored and
    /// missing keys keep their current values. Never fails: the control loop
    /// must start regardless of store state.
    pub fn load(&self) {
        let Some(path) = &self.inner.store_path else {
            return;
        };

        if !path.exists() {
            debug!("No config store at {}, writing defaults", path.display());
            if let Err(e) = self.save() {
                warn!("Failed to write default config: {}", e);
            }
            return;
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let map = parse_store(&contents);
                let mut settings = self.inner.settings.write().unwrap();
                apply_store(&mut settings, &map);
                settings.validate();
            }
            Err(e) => {
                warn!("Config store unreadable ({}), regenerating defaults", e);
                if let Err(e) = self.save() {
                    warn!("Failed to regenerate config store: {}", e);
                }
            }
        }
    }

    /// Writes the current settings to the backing store.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; callers log and continue (a failed
    /// save must never stop the control loop).
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.inner.store_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = render_store(&self.snapshot());
        std::fs::write(path, contents)
    }

    /// Returns a copy of all settings, read atomically.
    #[must_use]
    pub fn snapshot(&self) -> Settings {
        self.inner.settings.read().unwrap().clone()
    }

    /// True once since the last configuration-changing action.
    ///
    /// The frame scheduler polls this each tick to drive the debounced save.
    pub fn take_dirty(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::AcqRel)
    }

    fn mutate(&self, f: impl FnOnce(&mut Settings)) {
        {
            let mut settings = self.inner.settings.write().unwrap();
            f(&mut settings);
            settings.validate();
        }
        self.inner.dirty.store(true, Ordering::Release);
    }

    // ==================== Typed accessors ====================

    pub fn set_deadzone(&self, value: f32) {
        self.mutate(|s| s.deadzone = value);
    }

    pub fn adjust_deadzone(&self, delta: f32) {
        self.mutate(|s| s.deadzone += delta);
    }

    pub fn set_smoothing(&self, value: f32) {
        self.mutate(|s| s.smoothing = value);
    }

    pub fn adjust_smoothing(&self, delta: f32) {
        self.mutate(|s| s.smoothing += delta);
    }

    pub fn set_curve(&self, value: f32) {
        self.mutate(|s| s.curve = value);
    }

    pub fn adjust_curve(&self, delta: f32) {
        self.mutate(|s| s.curve += delta);
    }

    pub fn toggle_auto_center(&self) {
        self.mutate(|s| s.auto_center_enabled = !s.auto_center_enabled);
    }

    pub fn adjust_auto_center_strength(&self, delta: f32) {
        self.mutate(|s| s.auto_center_strength += delta);
    }

    pub fn adjust_auto_center_delay(&self, delta_ms: i32) {
        self.mutate(|s| {
            s.auto_center_delay_ms = (s.auto_center_delay_ms as i32 + delta_ms).clamp(0, 2000) as u32;
        });
    }

    pub fn adjust_auto_center_damping(&self, delta: f32) {
        self.mutate(|s| s.auto_center_damping += delta);
    }

    pub fn toggle_emulation(&self) {
        self.mutate(|s| s.emulation_active = !s.emulation_active);
    }

    pub fn toggle_primary_buttons(&self) {
        self.mutate(|s| s.primary_buttons = !s.primary_buttons);
    }
}

// ==================== Store format ====================

/// Renders settings as the versioned `Key=Value` store format.
fn render_store(settings: &Settings) -> String {
    let mut out = String::new();
    out.push_str(&format!("Version={}\n", STORE_VERSION));
    out.push_str(&format!("Deadzone={}\n", settings.deadzone));
    out.push_str(&format!("Smoothing={}\n", settings.smoothing));
    out.push_str(&format!("Curve={}\n", settings.curve));
    out.push_str(&format!("AutoCenterEnabled={}\n", settings.auto_center_enabled));
    out.push_str(&format!("AutoCenterStrength={}\n", settings.auto_center_strength));
    out.push_str(&format!("AutoCenterDelay={}\n", settings.auto_center_delay_ms));
    out.push_str(&format!("AutoCenterDamping={}\n", settings.auto_center_damping));
    out.push_str(&format!("EmulationActive={}\n", settings.emulation_active));
    out.push_str(&format!("EnablePrimaryButtons={}\n", settings.primary_buttons));
    out
}

/// Splits store contents into key/value pairs, skipping anything malformed.
fn parse_store(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }

    map
}

/// Applies parsed values onto settings. Missing or unparseable entries keep
/// the current value.
fn apply_store(settings: &mut Settings, map: &HashMap<String, String>) {
    try_f32(map, "Deadzone", &mut settings.deadzone);
    try_f32(map, "Smoothing", &mut settings.smoothing);
    try_f32(map, "Curve", &mut settings.curve);

    try_bool(map, "AutoCenterEnabled", &mut settings.auto_center_enabled);
    try_f32(map, "AutoCenterStrength", &mut settings.auto_center_strength);
    try_u32(map, "AutoCenterDelay", &mut settings.auto_center_delay_ms);
    try_f32(map, "AutoCenterDamping", &mut settings.auto_center_damping);

    try_bool(map, "EmulationActive", &mut settings.emulation_active);
    try_bool(map, "EnablePrimaryButtons", &mut settings.primary_buttons);
}

fn try_f32(map: &HashMap<String, String>, key: &str, field: &mut f32) {
    if let Some(parsed) = map.get(key).and_then(|v| v.parse().ok()) {
        *field = parsed;
    }
}

fn try_u32(map: &HashMap<String, String>, key: &str, field: &mut u32) {
    if let Some(parsed) = map.get(key).and_then(|v| v.parse().ok()) {
        *field = parsed;
    }
}

fn try_bool(map: &HashMap<String, String>, key: &str, field: &mut bool) {
    if let Some(parsed) = map
        .get(key)
        .and_then(|v| v.to_ascii_lowercase().parse().ok())
    {
        *field = parsed;
    }
}
