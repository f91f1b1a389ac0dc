//! Conversion between typed values and ordered 16-bit register words.
//!
//! Decoding emits the two bytes of every register in `byte_order`, lays the
//! registers out in `word_order` and reads the resulting buffer big-endian.
//! Encoding is the exact inverse, so floats survive bit-for-bit. Strings are
//! ASCII, two characters per register in register order: only the byte order
//! applies to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::data_type::DataType;
use super::value::RegisterValue;
use crate::utils::error::ModbusError;

/// Padding appended to odd-length strings.
pub const STRING_PAD: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Big => f.write_str("big"),
            Endian::Little => f.write_str("little"),
        }
    }
}

impl FromStr for Endian {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "big" | "be" => Ok(Endian::Big),
            "little" | "le" => Ok(Endian::Little),
            other => Err(ModbusError::invalid(format!("unknown endianness: {}", other))),
        }
    }
}

pub fn decode(
    registers: &[u16],
    data_type: DataType,
    byte_order: Endian,
    word_order: Endian,
) -> Result<RegisterValue, ModbusError> {
    let Some(width) = data_type.fixed_register_count() else {
        return decode_string(registers, byte_order);
    };
    if registers.len() != width as usize {
        return Err(ModbusError::decode(format!(
            "{} needs {} register(s), got {}",
            data_type,
            width,
            registers.len()
        )));
    }

    let bytes = registers_to_bytes(registers, byte_order, word_order);
    let value = match data_type {
        DataType::Bool => RegisterValue::Bool(u16::from_be_bytes(fixed(&bytes)?) != 0),
        DataType::Uint16 => RegisterValue::U16(u16::from_be_bytes(fixed(&bytes)?)),
        DataType::Int16 => RegisterValue::I16(i16::from_be_bytes(fixed(&bytes)?)),
        DataType::Uint32 => RegisterValue::U32(u32::from_be_bytes(fixed(&bytes)?)),
        DataType::Int32 => RegisterValue::I32(i32::from_be_bytes(fixed(&bytes)?)),
        DataType::Float32 => RegisterValue::F32(f32::from_be_bytes(fixed(&bytes)?)),
        DataType::Uint64 => RegisterValue::U64(u64::from_be_bytes(fixed(&bytes)?)),
        DataType::Int64 => RegisterValue::I64(i64::from_be_bytes(fixed(&bytes)?)),
        DataType::Float64 => RegisterValue::F64(f64::from_be_bytes(fixed(&bytes)?)),
        DataType::String => unreachable!("strings have no fixed width"),
    };
    Ok(value)
}

/// Inverse of [`decode`] for the same type and orders. Strings are padded
/// with NUL to a whole register; trailing NULs and whitespace are stripped on
/// decode, so they do not survive a round trip.
pub fn encode(
    value: &RegisterValue,
    data_type: DataType,
    byte_order: Endian,
    word_order: Endian,
) -> Result<Vec<u16>, ModbusError> {
    if value.data_type() != data_type {
        return Err(ModbusError::invalid(format!(
            "cannot encode a {} value as {}",
            value.data_type(),
            data_type
        )));
    }

    let bytes = match value {
        RegisterValue::Bool(v) => u16::from(*v).to_be_bytes().to_vec(),
        RegisterValue::U16(v) => v.to_be_bytes().to_vec(),
        RegisterValue::I16(v) => v.to_be_bytes().to_vec(),
        RegisterValue::U32(v) => v.to_be_bytes().to_vec(),
        RegisterValue::I32(v) => v.to_be_bytes().to_vec(),
        RegisterValue::F32(v) => v.to_be_bytes().to_vec(),
        RegisterValue::U64(v) => v.to_be_bytes().to_vec(),
        RegisterValue::I64(v) => v.to_be_bytes().to_vec(),
        RegisterValue::F64(v) => v.to_be_bytes().to_vec(),
        RegisterValue::String(s) => return encode_string(s, byte_order),
    };
    Ok(bytes_to_registers(&bytes, byte_order, word_order))
}

fn decode_string(registers: &[u16], byte_order: Endian) -> Result<RegisterValue, ModbusError> {
    if registers.is_empty() {
        return Err(ModbusError::decode("string needs at least one register"));
    }

    let mut bytes = registers_to_bytes(registers, byte_order, Endian::Big);
    while let Some(&last) = bytes.last() {
        if last == STRING_PAD || last.is_ascii_whitespace() {
            bytes.pop();
        } else {
            break;
        }
    }

    if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(ModbusError::decode(format!(
            "non-ASCII byte 0x{:02x} at offset {}",
            bytes[pos], pos
        )));
    }
    String::from_utf8(bytes)
        .map(RegisterValue::String)
        .map_err(|e| ModbusError::decode(e.to_string()))
}

fn encode_string(value: &str, byte_order: Endian) -> Result<Vec<u16>, ModbusError> {
    if value.is_empty() {
        return Err(ModbusError::invalid("cannot encode an empty string"));
    }
    if !value.is_ascii() {
        return Err(ModbusError::invalid(format!("string {:?} is not ASCII", value)));
    }

    let mut bytes = value.as_bytes().to_vec();
    if bytes.len() % 2 != 0 {
        bytes.push(STRING_PAD);
    }
    Ok(bytes_to_registers(&bytes, byte_order, Endian::Big))
}

fn registers_to_bytes(registers: &[u16], byte_order: Endian, word_order: Endian) -> Vec<u8> {
    let word_bytes = |reg: &u16| match byte_order {
        Endian::Big => reg.to_be_bytes(),
        Endian::Little => reg.to_le_bytes(),
    };
    match word_order {
        Endian::Big => registers.iter().flat_map(word_bytes).collect(),
        Endian::Little => registers.iter().rev().flat_map(word_bytes).collect(),
    }
}

fn bytes_to_registers(bytes: &[u8], byte_order: Endian, word_order: Endian) -> Vec<u16> {
    let mut registers: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| match byte_order {
            Endian::Big => u16::from_be_bytes([pair[0], pair[1]]),
            Endian::Little => u16::from_le_bytes([pair[0], pair[1]]),
        })
        .collect();
    if word_order == Endian::Little {
        registers.reverse();
    }
    registers
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ModbusError> {
    bytes
        .try_into()
        .map_err(|_| ModbusError::decode(format!("expected {} bytes, got {}", N, bytes.len())))
}
