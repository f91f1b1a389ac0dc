pub mod rtu_client;

pub use rtu_client::{ModbusRtuClient, ReadOptions};
