use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::modbus::protocol::{MAX_UNIT_ID, MIN_UNIT_ID};

pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParityConfig {
    #[serde(alias = "N", alias = "none")]
    None,
    #[serde(alias = "E", alias = "even")]
    Even,
    #[serde(alias = "O", alias = "odd")]
    Odd,
}

impl std::str::FromStr for ParityConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(ParityConfig::None),
            "e" | "even" => Ok(ParityConfig::Even),
            "o" | "odd" => Ok(ParityConfig::Odd),
            other => Err(ConfigError::Invalid(format!("parity must be N, E or O, got {}", other))),
        }
    }
}

/// Serial line parameters for one RTU bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: ParityConfig,
    pub stop_bits: u8,
    /// Per-attempt response timeout, in seconds.
    pub timeout_secs: f64,
    /// Extra attempts after the first before a transport failure is reported.
    pub retries: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: ParityConfig::None,
            stop_bits: 1,
            timeout_secs: 3.0,
            retries: 3,
        }
    }
}

fn default_port() -> &'static str {
    if cfg!(target_os = "windows") {
        "COM1"
    } else if cfg!(target_os = "macos") {
        "/dev/tty.usbserial-0001"
    } else {
        "/dev/ttyUSB0"
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial port must not be empty".into()));
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ConfigError::Invalid(format!(
                "baud rate {} must be one of {:?}",
                self.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }
        if !matches!(self.data_bits, 7 | 8) {
            return Err(ConfigError::Invalid(format!("data bits {} must be 7 or 8", self.data_bits)));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(ConfigError::Invalid(format!("stop bits {} must be 1 or 2", self.stop_bits)));
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "timeout {}s must be a positive number of seconds",
                self.timeout_secs
            )));
        }
        if self.retries == 0 {
            return Err(ConfigError::Invalid("retries must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unit addressed when a command does not name one.
    pub unit_id: u8,
    pub serial: SerialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unit_id: 1,
            serial: SerialConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_UNIT_ID..=MAX_UNIT_ID).contains(&self.unit_id) {
            return Err(ConfigError::Invalid(format!(
                "unit id {} outside {}-{}",
                self.unit_id, MIN_UNIT_ID, MAX_UNIT_ID
            )));
        }
        self.serial.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::from_toml(
            r#"
            unit_id = 17

            [serial]
            port = "/dev/ttyS3"
            baud_rate = 19200
            parity = "E"
            timeout_secs = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.unit_id, 17);
        assert_eq!(config.serial.port, "/dev/ttyS3");
        assert_eq!(config.serial.parity, ParityConfig::Even);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.serial.retries, 3);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            SerialConfig { baud_rate: 4800, ..SerialConfig::default() },
            SerialConfig { data_bits: 6, ..SerialConfig::default() },
            SerialConfig { stop_bits: 3, ..SerialConfig::default() },
            SerialConfig { timeout_secs: 0.0, ..SerialConfig::default() },
            SerialConfig { timeout_secs: f64::NAN, ..SerialConfig::default() },
            SerialConfig { retries: 0, ..SerialConfig::default() },
            SerialConfig { port: " ".into(), ..SerialConfig::default() },
        ];
        for case in cases {
            assert!(matches!(case.validate(), Err(ConfigError::Invalid(_))), "{:?}", case);
        }
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!("E".parse::<ParityConfig>().unwrap(), ParityConfig::Even);
        assert_eq!("none".parse::<ParityConfig>().unwrap(), ParityConfig::None);
        assert!("mark".parse::<ParityConfig>().is_err());
    }

    #[test]
    fn test_rejects_broadcast_unit() {
        let err = Config::from_toml("unit_id = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("modbus-rtu-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.serial.port = "/dev/ttyAMA0".into();
        config.serial.stop_bits = 2;
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reloaded, config);
    }
}
