use std::fmt;
use thiserror::Error;

use crate::modbus::protocol::ExceptionCode;

/// Coarse classification of every failure the client can report.
///
/// Callers branch on this rather than on individual variants: only
/// [`ErrorKind::Transport`] failures are worth retrying as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is malformed (bad count, unit id, missing string length).
    InvalidParameter,
    /// The device answered but refused the request, or the answer was unusable.
    Protocol,
    /// The exchange could not be completed (timeout, line error, retries exhausted).
    Transport,
    /// Raw registers could not be interpreted as the requested type.
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Transport => "transport error",
            ErrorKind::Decode => "decode error",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Device exception on function 0x{function:02x}: {code}")]
    DeviceException { function: u8, code: ExceptionCode },

    #[error("No response received from device")]
    NoResponse,

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("CRC checksum mismatch: expected 0x{expected:04x}, received 0x{received:04x}")]
    CrcError { expected: u16, received: u16 },

    #[error("Lock acquisition failed")]
    LockError,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Decode error: {0}")]
    DecodeError(String),
}

impl ModbusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModbusError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            ModbusError::DeviceException { .. }
            | ModbusError::NoResponse
            | ModbusError::InvalidResponse(_) => ErrorKind::Protocol,
            ModbusError::ConnectionError(_)
            | ModbusError::CommunicationError(_)
            | ModbusError::CrcError { .. }
            | ModbusError::LockError
            | ModbusError::Timeout => ErrorKind::Transport,
            ModbusError::DecodeError(_) => ErrorKind::Decode,
        }
    }

    /// Whether re-sending the identical request could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ModbusError::InvalidParameter(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        ModbusError::DecodeError(msg.into())
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => ModbusError::Timeout,
            _ => ModbusError::CommunicationError(format!("IO error: {}", err)),
        }
    }
}

impl From<serialport::Error> for ModbusError {
    fn from(err: serialport::Error) -> Self {
        ModbusError::ConnectionError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ModbusError::Timeout
    }
}
