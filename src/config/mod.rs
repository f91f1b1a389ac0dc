pub mod settings;

pub use settings::{Config, ConfigError, ParityConfig, SerialConfig, SUPPORTED_BAUD_RATES};
