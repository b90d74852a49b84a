//! Application configuration.
//!
//! Settings come from three layers, later layers winning: built-in defaults,
//! an optional YAML file and environment variables. String values in the file
//! of the form `${VAR}` or `$VAR` are replaced by the named variable when it
//! is set. Validation runs once every layer has been merged.

use std::{
    fmt,
    fs,
    io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_yaml::Value;
use thiserror::Error;
use tracing::info;

use crate::{
    command::{BYTE_CAPACITY, Limit, PH_SETPOINT_CAPACITY, SetpointLimits, WORD_CAPACITY},
    frame::{DEFAULT_DEVICE_ADDRESS, DEVICE_ADDRESS_MAX, DEVICE_ADDRESS_MIN},
};

/// Location searched when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/intellichem2mqtt/config.yaml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid YAML or does not match the schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// An environment override could not be parsed.
    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Rejected text.
        value: String,
    },
    /// A numeric setting is outside its allowed range.
    #[error("{field} = {value} outside allowed range {min}..={max}")]
    OutOfRange {
        /// Dotted path of the setting.
        field: &'static str,
        /// Configured value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// A setpoint range reaching past what the device field can carry.
    #[error(
        "{field}: range {min}..={max} exceeds the device field ({}..={})",
        .capacity.min,
        .capacity.max
    )]
    RangeExceedsField {
        /// Dotted path of the range.
        field: &'static str,
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
        /// Values the field can carry.
        capacity: Limit,
    },
    /// A setpoint range whose minimum exceeds its maximum.
    #[error("{field}: min {min} exceeds max {max}")]
    EmptyRange {
        /// Dotted path of the range.
        field: &'static str,
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
}

/// Serial parity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Serial port settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path.
    pub port: String,
    /// Baud rate.
    pub baudrate: u32,
    /// Data bits, 5 to 8.
    pub databits: u8,
    /// Parity.
    pub parity: Parity,
    /// Stop bits, 1 or 2.
    pub stopbits: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_owned(),
            baudrate: 9600,
            databits: 8,
            parity: Parity::None,
            stopbits: 1,
        }
    }
}

/// Device polling settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntellichemConfig {
    /// Bus address of the device.
    pub address: u8,
    /// Seconds between polls.
    pub poll_interval: u64,
    /// Seconds to wait for a status response.
    pub timeout: u64,
}

impl Default for IntellichemConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_DEVICE_ADDRESS,
            poll_interval: 30,
            timeout: 5,
        }
    }
}

impl IntellichemConfig {
    /// Poll period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval) }

    /// Response timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout) }
}

/// MQTT broker settings. Without a host the bridge only logs readings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Broker port.
    pub port: u16,
    /// User name.
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password.
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// MQTT client identifier.
    pub client_id: String,
    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,
    /// Prefix for state, availability and command topics.
    pub topic_prefix: String,
    /// Publish state with the retain flag.
    pub retain: bool,
    /// Quality of service, 0 to 2.
    pub qos: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 1883,
            username: None,
            password: None,
            client_id: "intellichem2mqtt".to_owned(),
            discovery_prefix: "homeassistant".to_owned(),
            topic_prefix: "intellichem2mqtt".to_owned(),
            retain: true,
            qos: 1,
        }
    }
}

impl MqttConfig {
    /// `true` when a broker host is configured.
    #[must_use]
    pub fn enabled(&self) -> bool { self.host.is_some() }
}

/// Remote control settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Accept configuration commands over MQTT.
    pub enabled: bool,
    /// Minimum seconds between two commands.
    pub rate_limit_seconds: u64,
    /// Accepted setpoint ranges.
    #[serde(flatten)]
    pub limits: SetpointLimits,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_seconds: 5,
            limits: SetpointLimits::default(),
        }
    }
}

impl ControlConfig {
    /// Minimum spacing between commands.
    #[must_use]
    pub fn rate_limit(&self) -> Duration { Duration::from_secs(self.rate_limit_seconds) }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Everything, including decoded frames.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Problems only.
    #[serde(alias = "WARN")]
    Warning,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(s.to_owned()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// Logging settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Verbosity. `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    /// Dump every frame as hex at debug level.
    pub dump_frames: bool,
}

/// Complete application configuration.
///
/// # Examples
///
/// ```
/// use intellichem::config::AppConfig;
///
/// let config = AppConfig::from_yaml_with("intellichem:\n  address: 150\n", |_| None)
///     .expect("valid YAML");
/// assert_eq!(config.intellichem.address, 150);
/// assert_eq!(config.mqtt.port, 1883);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial port.
    pub serial: SerialConfig,
    /// Device polling.
    pub intellichem: IntellichemConfig,
    /// MQTT broker.
    pub mqtt: MqttConfig,
    /// Remote control.
    pub control: ControlConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from `path` and the process environment.
    ///
    /// A missing file is not an error: environment variables and defaults
    /// are used instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// environment override is malformed, or a value is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load from `path`, resolving variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "loading configuration file");
                Self::from_yaml_with(&text, &lookup)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "configuration file not found, using environment and defaults"
                );
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.apply_env(&lookup)?;
        config.normalise();
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text, substituting `${VAR}` and `$VAR` string values.
    ///
    /// No validation is performed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or mismatched types.
    pub fn from_yaml_with<F>(text: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut value: Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        substitute_vars(&mut value, &lookup);
        Ok(serde_yaml::from_value(value)?)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a variable cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SERIAL_PORT") {
            self.serial.port = port;
        }
        parse_var(&lookup, "SERIAL_BAUDRATE", &mut self.serial.baudrate)?;
        parse_var(&lookup, "INTELLICHEM_ADDRESS", &mut self.intellichem.address)?;
        parse_var(&lookup, "INTELLICHEM_POLL_INTERVAL", &mut self.intellichem.poll_interval)?;
        parse_var(&lookup, "INTELLICHEM_TIMEOUT", &mut self.intellichem.timeout)?;
        if let Some(host) = lookup("MQTT_HOST") {
            self.mqtt.host = Some(host);
        }
        parse_var(&lookup, "MQTT_PORT", &mut self.mqtt.port)?;
        if let Some(username) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(prefix) = lookup("MQTT_DISCOVERY_PREFIX") {
            self.mqtt.discovery_prefix = prefix;
        }
        if let Some(prefix) = lookup("MQTT_TOPIC_PREFIX") {
            self.mqtt.topic_prefix = prefix;
        }
        if let Some(raw) = lookup("MQTT_RETAIN") {
            self.mqtt.retain = is_truthy(&raw);
        }
        parse_var(&lookup, "MQTT_QOS", &mut self.mqtt.qos)?;
        if let Some(raw) = lookup("CONTROL_ENABLED") {
            self.control.enabled = is_truthy(&raw);
        }
        parse_var(&lookup, "LOG_LEVEL", &mut self.logging.level)?;
        Ok(())
    }

    /// Check every bounded setting, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`], [`ConfigError::EmptyRange`] or
    /// [`ConfigError::RangeExceedsField`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "serial.databits",
            self.serial.databits.into(),
            5,
            8,
        )?;
        check_range("serial.stopbits", self.serial.stopbits.into(), 1, 2)?;
        check_range(
            "intellichem.address",
            self.intellichem.address.into(),
            DEVICE_ADDRESS_MIN.into(),
            DEVICE_ADDRESS_MAX.into(),
        )?;
        check_range(
            "intellichem.poll_interval",
            saturating_i64(self.intellichem.poll_interval),
            5,
            300,
        )?;
        check_range(
            "intellichem.timeout",
            saturating_i64(self.intellichem.timeout),
            1,
            30,
        )?;
        check_range("mqtt.port", self.mqtt.port.into(), 1, 65535)?;
        check_range("mqtt.qos", self.mqtt.qos.into(), 0, 2)?;
        let limits = &self.control.limits;
        check_limit("control.ph_setpoint", limits.ph_setpoint, PH_SETPOINT_CAPACITY)?;
        check_limit("control.orp_setpoint", limits.orp_setpoint, WORD_CAPACITY)?;
        check_limit("control.calcium_hardness", limits.calcium_hardness, WORD_CAPACITY)?;
        check_limit("control.cyanuric_acid", limits.cyanuric_acid, BYTE_CAPACITY)?;
        check_limit("control.alkalinity", limits.alkalinity, WORD_CAPACITY)
    }

    /// Render the defaults as YAML, for `--generate-config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialisation fails.
    pub fn default_yaml() -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&Self::default())?)
    }

    fn normalise(&mut self) {
        for slot in [
            &mut self.mqtt.host,
            &mut self.mqtt.username,
            &mut self.mqtt.password,
        ] {
            if slot.as_deref().is_some_and(str::is_empty) {
                *slot = None;
            }
        }
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(var) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw })?;
    }
    Ok(())
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn saturating_i64(value: u64) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn check_limit(field: &'static str, limit: Limit, capacity: Limit) -> Result<(), ConfigError> {
    if limit.min > limit.max {
        return Err(ConfigError::EmptyRange {
            field,
            min: limit.min,
            max: limit.max,
        });
    }
    if !limit.is_within(&capacity) {
        return Err(ConfigError::RangeExceedsField {
            field,
            min: limit.min,
            max: limit.max,
            capacity,
        });
    }
    Ok(())
}

/// Replace whole-string `${VAR}` and `$VAR` values with the variable's value,
/// parsed as a YAML scalar so numbers and booleans keep their type.
fn substitute_vars<F>(value: &mut Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::Mapping(map) => {
            for (_, entry) in map.iter_mut() {
                substitute_vars(entry, lookup);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                substitute_vars(item, lookup);
            }
        }
        Value::String(text) => {
            let name = text
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .or_else(|| text.strip_prefix('$'));
            if let Some(replacement) = name.and_then(lookup) {
                *value = serde_yaml::from_str(&replacement)
                    .unwrap_or(Value::String(replacement));
            }
        }
        _ => {}
    }
}

/// Accept any scalar for string settings; substituted numeric passwords
/// arrive as YAML numbers.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string, found {other:?}"
        ))),
    }
}
