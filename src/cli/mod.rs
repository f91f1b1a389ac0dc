pub mod commands;

pub use commands::{run, Cli, Command, OutputFormat};
