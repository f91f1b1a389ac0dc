use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::ModbusError;

/// Value types that can be stored across one or more 16-bit registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float32,
    Float64,
    String,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::Bool,
        DataType::Uint16,
        DataType::Int16,
        DataType::Uint32,
        DataType::Int32,
        DataType::Uint64,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
        DataType::String,
    ];

    /// Register width of fixed-size types; `None` for strings.
    pub fn fixed_register_count(self) -> Option<u16> {
        match self {
            DataType::Bool | DataType::Uint16 | DataType::Int16 => Some(1),
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => Some(2),
            DataType::Uint64 | DataType::Int64 | DataType::Float64 => Some(4),
            DataType::String => None,
        }
    }

    /// Number of registers a value of this type occupies.
    ///
    /// `string_length` is the character count for [`DataType::String`] (two
    /// ASCII characters per register) and is ignored for every other type.
    pub fn register_count(self, string_length: usize) -> Result<u16, ModbusError> {
        if let Some(count) = self.fixed_register_count() {
            return Ok(count);
        }
        if string_length == 0 {
            return Err(ModbusError::invalid("string_length must be greater than 0 for string reads"));
        }
        u16::try_from(string_length.div_ceil(2)).map_err(|_| {
            ModbusError::invalid(format!("string_length {} does not fit a register range", string_length))
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Uint32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        DataType::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| ModbusError::invalid(format!("unsupported data type: {}", s)))
    }
}
