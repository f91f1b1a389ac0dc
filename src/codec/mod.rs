pub mod data_type;
pub mod register_codec;
pub mod value;

pub use data_type::DataType;
pub use register_codec::{decode, encode, Endian};
pub use value::{RegisterScalar, RegisterValue};
