pub mod formatters;

pub use formatters::{ConsoleFormatter, DataFormatter, HexFormatter, JsonFormatter, ReadData, ReadReport};
