//! Tuning configuration types
//!
//! Board-agnostic tuning knobs, stored as postcard binary data so the
//! firmware can persist them to flash and reload them at boot. Defaults
//! hold the reference hardware's calibration.

use serde::{Deserialize, Serialize};

/// Buffer size sufficient for any encoded [`RobotConfig`]
pub const CONFIG_MAX_BYTES: usize = 64;

/// Errors from config serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Output buffer too small or value not encodable
    Encode,
    /// Stored bytes are not a valid config (wrong version or corrupt)
    Decode,
}

/// Gaze servo calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoConfig {
    /// Pulse width at 0°, microseconds
    pub min_pulse_us: u16,
    /// Pulse width at 180°, microseconds
    pub max_pulse_us: u16,
    /// Centered rest angle
    pub home_angle: u16,
    /// Speed used for homing and gaze commands (1-100)
    pub home_speed: u8,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_pulse_us: 500,
            max_pulse_us: 2500,
            home_angle: 90,
            home_speed: 50,
        }
    }
}

/// Expression matrix settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatrixConfig {
    /// Global brightness applied at write time (0-255)
    pub brightness: u8,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self { brightness: 255 }
    }
}

/// Audio defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioConfig {
    /// Output volume in percent (0-100)
    pub volume: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { volume: 80 }
    }
}

/// Ranging and light sensing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    /// Distances below this read as "proximity", centimeters
    pub proximity_threshold_cm: u16,
    /// Minimum time between measurements, milliseconds
    pub update_interval_ms: u32,
    /// Echo wait bound, microseconds
    pub echo_timeout_us: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_cm: 30,
            update_interval_ms: 100,
            echo_timeout_us: 30_000,
        }
    }
}

/// Complete tuning configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RobotConfig {
    pub servo: ServoConfig,
    pub matrix: MatrixConfig,
    pub audio: AudioConfig,
    pub sensor: SensorConfig,
}

impl RobotConfig {
    /// Serialize into `buf`, returning the used prefix
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a [u8], ConfigError> {
        postcard::to_slice(self, buf)
            .map(|used| &*used)
            .map_err(|_| ConfigError::Encode)
    }

    /// Deserialize a config previously written by [`Self::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)
    }
}
