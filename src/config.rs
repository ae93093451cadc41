//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RouterError};
use crate::event::protocol::{AXIS_VALUE_MAX, AXIS_VALUE_MIN, DEFAULT_EVENT_PORT};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub physical: PhysicalConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    #[serde(default = "default_guard_ticks")]
    pub guard_ticks: u32,

    #[serde(default = "default_neutral_value")]
    pub neutral_value: i32,
}

/// Routing table configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    #[serde(default = "default_primary_axes")]
    pub primary_axes: Vec<u8>,

    #[serde(default = "default_auxiliary_axes")]
    pub auxiliary_axes: Vec<u8>,

    #[serde(default = "default_buttons")]
    pub buttons: Vec<u8>,

    #[serde(default = "default_mode_button")]
    pub mode_button: u8,
}

/// Staleness thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct LivenessConfig {
    #[serde(default = "default_vision_stale_ms")]
    pub vision_stale_ms: u64,

    #[serde(default = "default_physical_stale_ms")]
    pub physical_stale_ms: u64,

    #[serde(default = "default_device_heartbeat_ms")]
    pub device_heartbeat_ms: u64,
}

/// Where physical controller samples come from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalSource {
    /// Local joystick read through evdev
    Evdev,
    /// Joystick events forwarded over UDP
    Udp,
}

/// Physical input configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PhysicalConfig {
    #[serde(default = "default_physical_source")]
    pub source: PhysicalSource,

    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[serde(default = "default_physical_bind_port")]
    pub bind_port: u16,
}

/// Vision input configuration
#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[serde(default = "default_vision_bind_port")]
    pub bind_port: u16,
}

/// Output sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_host")]
    pub host: String,

    #[serde(default = "default_output_port")]
    pub port: u16,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

// Default value functions
fn default_tick_rate_hz() -> u32 { 50 }
fn default_guard_ticks() -> u32 { 3 }
fn default_neutral_value() -> i32 { 0 }

fn default_primary_axes() -> Vec<u8> { vec![0, 1, 2, 3] }
fn default_auxiliary_axes() -> Vec<u8> { vec![4, 5, 6, 7] }
fn default_buttons() -> Vec<u8> { (0..=14).collect() }
fn default_mode_button() -> u8 { 3 }

fn default_vision_stale_ms() -> u64 { 1000 }
fn default_physical_stale_ms() -> u64 { 200 }
fn default_device_heartbeat_ms() -> u64 { 50 }

fn default_physical_source() -> PhysicalSource { PhysicalSource::Evdev }
fn default_bind_host() -> String { "0.0.0.0".to_string() }
fn default_physical_bind_port() -> u16 { 5007 }
fn default_vision_bind_port() -> u16 { 5006 }

fn default_output_host() -> String { "127.0.0.1".to_string() }
fn default_output_port() -> u16 { DEFAULT_EVENT_PORT }
fn default_send_timeout_ms() -> u64 { 20 }

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            guard_ticks: default_guard_ticks(),
            neutral_value: default_neutral_value(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary_axes: default_primary_axes(),
            auxiliary_axes: default_auxiliary_axes(),
            buttons: default_buttons(),
            mode_button: default_mode_button(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            vision_stale_ms: default_vision_stale_ms(),
            physical_stale_ms: default_physical_stale_ms(),
            device_heartbeat_ms: default_device_heartbeat_ms(),
        }
    }
}

impl Default for PhysicalConfig {
    fn default() -> Self {
        Self {
            source: default_physical_source(),
            device_path: String::new(),
            bind_host: default_bind_host(),
            bind_port: default_physical_bind_port(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            bind_port: default_vision_bind_port(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            host: default_output_host(),
            port: default_output_port(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl RouterConfig {
    /// Duration of one tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

impl LivenessConfig {
    /// Vision age beyond which primary axes go neutral
    pub fn vision_stale(&self) -> Duration {
        Duration::from_millis(self.vision_stale_ms)
    }

    /// Physical age beyond which the system is halted
    pub fn physical_stale(&self) -> Duration {
        Duration::from_millis(self.physical_stale_ms)
    }

    /// Freshness refresh interval for an open evdev device
    pub fn device_heartbeat(&self) -> Duration {
        Duration::from_millis(self.device_heartbeat_ms)
    }
}

impl OutputConfig {
    /// Bound on sending one whole frame or keepalive batch
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> RouterError {
    RouterError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_vision_router::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Tick loop
        if self.router.tick_rate_hz == 0 || self.router.tick_rate_hz > 1000 {
            return Err(invalid("tick_rate_hz must be between 1 and 1000"));
        }

        if self.router.guard_ticks > 250 {
            return Err(invalid("guard_ticks must be between 0 and 250"));
        }

        if self.router.neutral_value < AXIS_VALUE_MIN || self.router.neutral_value > AXIS_VALUE_MAX {
            return Err(invalid(format!(
                "neutral_value must be between {} and {}",
                AXIS_VALUE_MIN, AXIS_VALUE_MAX
            )));
        }

        // Routing table
        if self.routing.primary_axes.is_empty() {
            return Err(invalid("primary_axes cannot be empty"));
        }

        let mut seen_axes = HashSet::new();
        for &axis in self.routing.primary_axes.iter().chain(&self.routing.auxiliary_axes) {
            if !seen_axes.insert(axis) {
                return Err(invalid(format!(
                    "axis {} is listed more than once across primary_axes and auxiliary_axes",
                    axis
                )));
            }
        }

        let mut seen_buttons = HashSet::new();
        for &button in &self.routing.buttons {
            if !seen_buttons.insert(button) {
                return Err(invalid(format!("button {} is listed more than once", button)));
            }
        }

        // Liveness
        if self.liveness.vision_stale_ms == 0 || self.liveness.vision_stale_ms > 60000 {
            return Err(invalid("vision_stale_ms must be between 1 and 60000"));
        }

        if self.liveness.physical_stale_ms == 0 || self.liveness.physical_stale_ms > 60000 {
            return Err(invalid("physical_stale_ms must be between 1 and 60000"));
        }

        if self.liveness.physical_stale() < self.router.tick_period() * 2 {
            return Err(invalid("physical_stale_ms must cover at least two tick periods"));
        }

        if self.liveness.device_heartbeat_ms == 0
            || self.liveness.device_heartbeat_ms >= self.liveness.physical_stale_ms
        {
            return Err(invalid(
                "device_heartbeat_ms must be greater than 0 and less than physical_stale_ms",
            ));
        }

        // Sockets
        if self.physical.source == PhysicalSource::Udp {
            if self.physical.bind_host.is_empty() {
                return Err(invalid("physical bind_host cannot be empty"));
            }
            if self.physical.bind_port == 0 {
                return Err(invalid("physical bind_port cannot be 0"));
            }
        }

        if self.vision.bind_host.is_empty() {
            return Err(invalid("vision bind_host cannot be empty"));
        }

        if self.vision.bind_port == 0 {
            return Err(invalid("vision bind_port cannot be 0"));
        }

        if self.output.host.is_empty() {
            return Err(invalid("output host cannot be empty"));
        }

        if self.output.port == 0 {
            return Err(invalid("output port cannot be 0"));
        }

        if self.output.send_timeout_ms == 0 || self.output.send_timeout_ms > 10000 {
            return Err(invalid("send_timeout_ms must be between 1 and 10000"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[router]
tick_rate_hz = 100

[routing]
mode_button = 5

[physical]
source = "udp"
bind_port = 6000

[output]
host = "192.168.1.100"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.router.tick_rate_hz, 100);
        assert_eq!(config.router.guard_ticks, 3);
        assert_eq!(config.routing.mode_button, 5);
        assert_eq!(config.physical.source, PhysicalSource::Udp);
        assert_eq!(config.physical.bind_port, 6000);
        assert_eq!(config.output.host, "192.168.1.100");
        assert_eq!(config.output.port, 5005);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.router.tick_rate_hz, 50);
        assert_eq!(config.routing.primary_axes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/fpv-vision-router.toml");
        assert!(matches!(result, Err(RouterError::Io(_))));
    }

    #[test]
    fn test_unknown_physical_source() {
        let result = Config::from_toml_str("[physical]\nsource = \"serial\"\n");
        assert!(matches!(result, Err(RouterError::Config(_))));
    }

    #[test]
    fn test_tick_rate_zero() {
        let mut config = create_valid_config();
        config.router.tick_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_rate_too_high() {
        let mut config = create_valid_config();
        config.router.tick_rate_hz = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_guard_ticks_zero_allowed() {
        let mut config = create_valid_config();
        config.router.guard_ticks = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_guard_ticks_too_high() {
        let mut config = create_valid_config();
        config.router.guard_ticks = 251;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_neutral_value_out_of_range() {
        let mut config = create_valid_config();
        config.router.neutral_value = -32768;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_primary_axes() {
        let mut config = create_valid_config();
        config.routing.primary_axes = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlapping_axes() {
        let mut config = create_valid_config();
        config.routing.auxiliary_axes = vec![3, 4];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_primary_axis() {
        let mut config = create_valid_config();
        config.routing.primary_axes = vec![0, 1, 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_button() {
        let mut config = create_valid_config();
        config.routing.buttons = vec![0, 2, 2];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vision_stale_zero() {
        let mut config = create_valid_config();
        config.liveness.vision_stale_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_physical_stale_shorter_than_two_ticks() {
        let mut config = create_valid_config();
        // 50 Hz -> 20 ms ticks
        config.liveness.physical_stale_ms = 30;
        config.liveness.device_heartbeat_ms = 10;
        assert!(config.validate().is_err());

        config.liveness.physical_stale_ms = 40;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heartbeat_not_shorter_than_physical_stale() {
        let mut config = create_valid_config();
        config.liveness.device_heartbeat_ms = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_udp_physical_requires_port() {
        let mut config = create_valid_config();
        config.physical.source = PhysicalSource::Udp;
        config.physical.bind_port = 0;
        assert!(config.validate().is_err());

        config.physical.source = PhysicalSource::Evdev;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_output_host() {
        let mut config = create_valid_config();
        config.output.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_port_zero() {
        let mut config = create_valid_config();
        config.output.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_send_timeout_bounds() {
        let mut config = create_valid_config();
        config.output.send_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.output.send_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_helpers() {
        let config = create_valid_config();
        assert_eq!(config.router.tick_period(), Duration::from_millis(20));
        assert_eq!(config.liveness.vision_stale(), Duration::from_secs(1));
        assert_eq!(config.liveness.physical_stale(), Duration::from_millis(200));
        assert_eq!(config.output.send_timeout(), Duration::from_millis(20));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_tick_rate_hz(), 50);
        assert_eq!(default_guard_ticks(), 3);
        assert_eq!(default_neutral_value(), 0);
        assert_eq!(default_primary_axes(), vec![0, 1, 2, 3]);
        assert_eq!(default_auxiliary_axes(), vec![4, 5, 6, 7]);
        assert_eq!(default_buttons().len(), 15);
        assert_eq!(default_mode_button(), 3);
        assert_eq!(default_vision_stale_ms(), 1000);
        assert_eq!(default_physical_stale_ms(), 200);
        assert_eq!(default_device_heartbeat_ms(), 50);
        assert_eq!(default_physical_source(), PhysicalSource::Evdev);
        assert_eq!(default_bind_host(), "0.0.0.0");
        assert_eq!(default_physical_bind_port(), 5007);
        assert_eq!(default_vision_bind_port(), 5006);
        assert_eq!(default_output_host(), "127.0.0.1");
        assert_eq!(default_output_port(), 5005);
        assert_eq!(default_send_timeout_ms(), 20);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")).unwrap();
        let defaults = create_valid_config();
        assert_eq!(config.router.tick_rate_hz, defaults.router.tick_rate_hz);
        assert_eq!(config.router.guard_ticks, defaults.router.guard_ticks);
        assert_eq!(config.routing.primary_axes, defaults.routing.primary_axes);
        assert_eq!(config.routing.auxiliary_axes, defaults.routing.auxiliary_axes);
        assert_eq!(config.routing.buttons, defaults.routing.buttons);
        assert_eq!(config.routing.mode_button, defaults.routing.mode_button);
        assert_eq!(config.physical.source, defaults.physical.source);
        assert_eq!(config.vision.bind_port, defaults.vision.bind_port);
        assert_eq!(config.output.port, defaults.output.port);
    }
}
