pub mod client;
pub mod crc;
pub mod executor;
pub mod frame;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{list_ports, SerialTransport};
pub use crc::crc16_modbus;
pub use executor::{read_bits, read_registers};
pub use protocol::{BitTable, ExceptionCode, ExceptionResponse, ReadRequest, RegisterTable, TransportReply};
pub use transport::RegisterTransport;
