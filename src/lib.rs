//! Modbus RTU client library
//!
//! Turns typed read intents into register-level transactions and decodes the
//! returned 16-bit words back into values. The transaction layer and register
//! codec work against any [`RegisterTransport`]; [`SerialTransport`] is the
//! RTU implementation over a local serial port.

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod modbus;
pub mod output;
pub mod utils;

// Re-export commonly used types
pub use client::{ModbusRtuClient, ReadOptions};
pub use codec::{DataType, Endian, RegisterScalar, RegisterValue};
pub use config::{Config, SerialConfig};
pub use modbus::{BitTable, ReadRequest, RegisterTable, RegisterTransport, SerialTransport};
pub use utils::error::{ErrorKind, ModbusError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
