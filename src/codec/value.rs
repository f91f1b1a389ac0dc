use serde::Serialize;
use std::fmt;

use super::data_type::DataType;
use crate::utils::error::ModbusError;

/// A decoded register value, one variant per [`DataType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
}

impl RegisterValue {
    pub fn data_type(&self) -> DataType {
        match self {
            RegisterValue::Bool(_) => DataType::Bool,
            RegisterValue::U16(_) => DataType::Uint16,
            RegisterValue::I16(_) => DataType::Int16,
            RegisterValue::U32(_) => DataType::Uint32,
            RegisterValue::I32(_) => DataType::Int32,
            RegisterValue::U64(_) => DataType::Uint64,
            RegisterValue::I64(_) => DataType::Int64,
            RegisterValue::F32(_) => DataType::Float32,
            RegisterValue::F64(_) => DataType::Float64,
            RegisterValue::String(_) => DataType::String,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Bool(v) => write!(f, "{}", v),
            RegisterValue::U16(v) => write!(f, "{}", v),
            RegisterValue::I16(v) => write!(f, "{}", v),
            RegisterValue::U32(v) => write!(f, "{}", v),
            RegisterValue::I32(v) => write!(f, "{}", v),
            RegisterValue::U64(v) => write!(f, "{}", v),
            RegisterValue::I64(v) => write!(f, "{}", v),
            RegisterValue::F32(v) => write!(f, "{}", v),
            RegisterValue::F64(v) => write!(f, "{}", v),
            RegisterValue::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// Rust scalars that map onto a fixed-width [`DataType`].
pub trait RegisterScalar: TryFrom<RegisterValue, Error = ModbusError> + Into<RegisterValue> {
    const DATA_TYPE: DataType;
}

macro_rules! register_scalar {
    ($($ty:ty => $variant:ident, $data_type:ident;)*) => {
        $(
            impl From<$ty> for RegisterValue {
                fn from(value: $ty) -> Self {
                    RegisterValue::$variant(value)
                }
            }

            impl TryFrom<RegisterValue> for $ty {
                type Error = ModbusError;

                fn try_from(value: RegisterValue) -> Result<Self, Self::Error> {
                    match value {
                        RegisterValue::$variant(v) => Ok(v),
                        other => Err(ModbusError::decode(format!(
                            "expected {}, got {}",
                            DataType::$data_type,
                            other.data_type()
                        ))),
                    }
                }
            }

            impl RegisterScalar for $ty {
                const DATA_TYPE: DataType = DataType::$data_type;
            }
        )*
    };
}

register_scalar! {
    bool => Bool, Bool;
    u16 => U16, Uint16;
    i16 => I16, Int16;
    u32 => U32, Uint32;
    i32 => I32, Int32;
    u64 => U64, Uint64;
    i64 => I64, Int64;
    f32 => F32, Float32;
    f64 => F64, Float64;
}

impl From<String> for RegisterValue {
    fn from(value: String) -> Self {
        RegisterValue::String(value)
    }
}

impl From<&str> for RegisterValue {
    fn from(value: &str) -> Self {
        RegisterValue::String(value.to_string())
    }
}

impl TryFrom<RegisterValue> for String {
    type Error = ModbusError;

    fn try_from(value: RegisterValue) -> Result<Self, Self::Error> {
        match value {
            RegisterValue::String(v) => Ok(v),
            other => Err(ModbusError::decode(format!("expected string, got {}", other.data_type()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(RegisterValue::from(65u32), RegisterValue::U32(65));
        assert_eq!(f32::try_from(RegisterValue::F32(10.0)).unwrap(), 10.0);
        assert!(u16::try_from(RegisterValue::I16(-1)).is_err());
        assert_eq!(<i64 as RegisterScalar>::DATA_TYPE, DataType::Int64);
        assert_eq!(String::try_from(RegisterValue::from("AB")).unwrap(), "AB");
    }

    #[test]
    fn test_json_is_plain_value() {
        assert_eq!(serde_json::to_string(&RegisterValue::I32(-7)).unwrap(), "-7");
        assert_eq!(serde_json::to_string(&RegisterValue::from("PUMP")).unwrap(), "\"PUMP\"");
    }
}
