use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::error::ModbusError;

pub const MIN_UNIT_ID: u8 = 1;
pub const MAX_UNIT_ID: u8 = 247;

/// Largest quantity a single read may request (Modbus application protocol v1.1b3).
pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_REGISTERS: u16 = 125;

/// Exception responses set the high bit of the echoed function code.
pub const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
}

impl FunctionCode {
    pub fn value(self) -> u8 {
        match self {
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
        }
    }
}

/// Single-bit tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitTable {
    Coils,
    DiscreteInputs,
}

impl BitTable {
    pub fn function(self) -> FunctionCode {
        match self {
            BitTable::Coils => FunctionCode::ReadCoils,
            BitTable::DiscreteInputs => FunctionCode::ReadDiscreteInputs,
        }
    }
}

impl fmt::Display for BitTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitTable::Coils => f.write_str("coils"),
            BitTable::DiscreteInputs => f.write_str("discrete inputs"),
        }
    }
}

/// 16-bit register tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterTable {
    Holding,
    Input,
}

impl RegisterTable {
    pub fn function(self) -> FunctionCode {
        match self {
            RegisterTable::Holding => FunctionCode::ReadHoldingRegisters,
            RegisterTable::Input => FunctionCode::ReadInputRegisters,
        }
    }
}

impl fmt::Display for RegisterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterTable::Holding => f.write_str("holding registers"),
            RegisterTable::Input => f.write_str("input registers"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    Unknown(u8),
}

impl ExceptionCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::ServerDeviceBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayTargetFailedToRespond,
            other => ExceptionCode::Unknown(other),
        }
    }

    pub fn value(self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetFailedToRespond => 0x0B,
            ExceptionCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExceptionCode::IllegalFunction => "illegal function",
            ExceptionCode::IllegalDataAddress => "illegal data address",
            ExceptionCode::IllegalDataValue => "illegal data value",
            ExceptionCode::ServerDeviceFailure => "server device failure",
            ExceptionCode::Acknowledge => "acknowledge",
            ExceptionCode::ServerDeviceBusy => "server device busy",
            ExceptionCode::MemoryParityError => "memory parity error",
            ExceptionCode::GatewayPathUnavailable => "gateway path unavailable",
            ExceptionCode::GatewayTargetFailedToRespond => "gateway target failed to respond",
            ExceptionCode::Unknown(code) => return write!(f, "unknown exception 0x{:02x}", code),
        };
        write!(f, "{} (0x{:02x})", text, self.value())
    }
}

/// A device-side refusal: the echoed function code and the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: u8,
    pub code: ExceptionCode,
}

impl From<ExceptionResponse> for ModbusError {
    fn from(resp: ExceptionResponse) -> Self {
        ModbusError::DeviceException { function: resp.function, code: resp.code }
    }
}

/// What a transport hands back when the device did answer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportReply<T> {
    Data(T),
    Exception(ExceptionResponse),
}

impl<T> TransportReply<T> {
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<TransportReply<U>, E> {
        match self {
            TransportReply::Data(data) => f(data).map(TransportReply::Data),
            TransportReply::Exception(exception) => Ok(TransportReply::Exception(exception)),
        }
    }
}

/// One read transaction, built per call and discarded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub address: u16,
    pub count: u16,
    pub unit_id: u8,
    pub suppress_response: bool,
}

impl ReadRequest {
    pub fn new(address: u16, count: u16, unit_id: u8) -> Self {
        Self {
            address,
            count,
            unit_id,
            suppress_response: false,
        }
    }

    pub fn suppressed(mut self, suppress_response: bool) -> Self {
        self.suppress_response = suppress_response;
        self
    }

    /// Checks the request shape against the protocol limits for a read of
    /// at most `max_count` items.
    pub fn validate(&self, max_count: u16) -> Result<(), ModbusError> {
        if self.count == 0 {
            return Err(ModbusError::invalid("count must be at least 1"));
        }
        if self.count > max_count {
            return Err(ModbusError::invalid(format!(
                "count {} exceeds the maximum of {} per read",
                self.count, max_count
            )));
        }
        if !(MIN_UNIT_ID..=MAX_UNIT_ID).contains(&self.unit_id) {
            return Err(ModbusError::invalid(format!(
                "unit id {} outside {}-{}",
                self.unit_id, MIN_UNIT_ID, MAX_UNIT_ID
            )));
        }
        if self.address as u32 + self.count as u32 > 0x1_0000 {
            return Err(ModbusError::invalid(format!(
                "range {} + {} runs past address 65535",
                self.address, self.count
            )));
        }
        Ok(())
    }
}
