use clap::Parser;

use modbus_rtu_client::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Reported once by anyhow, tagged with the failure category
    cli::run(cli).await.map_err(|e| {
        let kind = e.downcast_ref::<modbus_rtu_client::ModbusError>().map(|modbus| modbus.kind());
        match kind {
            Some(kind) => e.context(kind),
            None => e,
        }
    })
}
