use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::info;
use std::path::PathBuf;

use crate::client::{ModbusRtuClient, ReadOptions};
use crate::codec::{DataType, Endian};
use crate::config::{Config, ParityConfig};
use crate::modbus::protocol::{BitTable, RegisterTable};
use crate::modbus::{list_ports, SerialTransport};
use crate::output::{ConsoleFormatter, DataFormatter, HexFormatter, JsonFormatter, ReadData, ReadReport};

#[derive(Parser, Debug)]
#[command(name = "modbus-rtu", version, about = "Read coils, discrete inputs and typed registers over Modbus RTU")]
pub struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub port: Option<String>,

    #[arg(short, long)]
    pub baud: Option<u32>,

    /// N, E or O
    #[arg(long)]
    pub parity: Option<ParityConfig>,

    #[arg(long)]
    pub data_bits: Option<u8>,

    #[arg(long)]
    pub stop_bits: Option<u8>,

    /// Response timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Extra attempts after a failed exchange
    #[arg(long)]
    pub retries: Option<u32>,

    /// Target unit (slave) id, 1-247
    #[arg(short, long)]
    pub unit: Option<u8>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// -v info, -vv debug (frames), -vvv trace
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read coils (function 0x01)
    ReadCoils(RangeArgs),
    /// Read discrete inputs (function 0x02)
    ReadDiscrete(RangeArgs),
    /// Read holding registers (function 0x03)
    ReadHolding(RangeArgs),
    /// Read input registers (function 0x04)
    ReadInput(RangeArgs),
    /// Read and decode one typed value
    ReadValue(ValueArgs),
    /// List serial ports on this machine
    ListPorts,
    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(default_value = "modbus-rtu.toml")]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RangeArgs {
    #[arg(short, long)]
    pub address: u16,

    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u16,

    /// Send the request without waiting for a response
    #[arg(long)]
    pub no_response: bool,
}

#[derive(Args, Debug)]
pub struct ValueArgs {
    #[arg(long, value_enum, default_value_t = TableArg::Holding)]
    pub table: TableArg,

    #[arg(short, long)]
    pub address: u16,

    /// bool, uint16, int16, uint32, int32, uint64, int64, float32, float64 or string
    #[arg(short = 't', long = "type")]
    pub data_type: DataType,

    /// Character count for string values
    #[arg(short = 'l', long, default_value_t = 0)]
    pub string_length: usize,

    #[arg(long, default_value = "big")]
    pub byte_order: Endian,

    #[arg(long, default_value = "big")]
    pub word_order: Endian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableArg {
    Holding,
    Input,
}

impl From<TableArg> for RegisterTable {
    fn from(arg: TableArg) -> Self {
        match arg {
            TableArg::Holding => RegisterTable::Holding,
            TableArg::Input => RegisterTable::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Console,
    Json,
    Hex,
}

impl OutputFormat {
    pub fn formatter(self) -> Box<dyn DataFormatter> {
        match self {
            OutputFormat::Console => Box::new(ConsoleFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::Hex => Box::new(HexFormatter),
        }
    }
}

impl Cli {
    /// File (or default) configuration with command-line overrides applied.
    pub fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity;
        }
        if let Some(bits) = self.data_bits {
            config.serial.data_bits = bits;
        }
        if let Some(bits) = self.stop_bits {
            config.serial.stop_bits = bits;
        }
        if let Some(timeout) = self.timeout {
            config.serial.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.serial.retries = retries;
        }
        if let Some(unit) = self.unit {
            config.unit_id = unit;
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let formatter = cli.format.formatter();

    match &cli.command {
        Command::ListPorts => {
            let ports = list_ports()?;
            println!("{}", formatter.format_ports(&ports));
            return Ok(());
        }
        Command::InitConfig { path } => {
            cli.resolve_config()?.save_to_file(path)?;
            println!("Configuration written to {}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let config = cli.resolve_config()?;
    let unit = config.unit_id;
    let transport = SerialTransport::open(&config.serial)
        .with_context(|| format!("opening serial port {}", config.serial.port))?;
    let client = ModbusRtuClient::new(transport);

    let report = match cli.command {
        Command::ReadCoils(args) => {
            info!("🔍 Reading {} coil(s) at {}", args.count, args.address);
            let bits = client.read_coils(args.address, args.count, unit, args.no_response).await?;
            bit_report(unit, BitTable::Coils, args.address, bits)
        }
        Command::ReadDiscrete(args) => {
            info!("🔍 Reading {} discrete input(s) at {}", args.count, args.address);
            let bits = client
                .read_discrete_inputs(args.address, args.count, unit, args.no_response)
                .await?;
            bit_report(unit, BitTable::DiscreteInputs, args.address, bits)
        }
        Command::ReadHolding(args) => {
            info!("🔍 Reading {} holding register(s) at {}", args.count, args.address);
            let regs = client
                .read_holding_registers(args.address, args.count, unit, args.no_response)
                .await?;
            register_report(unit, RegisterTable::Holding, args.address, regs)
        }
        Command::ReadInput(args) => {
            info!("🔍 Reading {} input register(s) at {}", args.count, args.address);
            let regs = client
                .read_input_registers(args.address, args.count, unit, args.no_response)
                .await?;
            register_report(unit, RegisterTable::Input, args.address, regs)
        }
        Command::ReadValue(args) => {
            let table = RegisterTable::from(args.table);
            let options = ReadOptions::unit(unit)
                .string_length(args.string_length)
                .byte_order(args.byte_order)
                .word_order(args.word_order);
            info!("🔍 Reading {} from {} at {}", args.data_type, table, args.address);
            let (raw, value) = client
                .read_value_with_raw(table, args.address, args.data_type, &options)
                .await?;
            ReadReport::new(
                unit,
                table,
                args.address,
                ReadData::Value {
                    data_type: args.data_type,
                    byte_order: args.byte_order,
                    word_order: args.word_order,
                    raw,
                    value,
                },
            )
        }
        Command::ListPorts | Command::InitConfig { .. } => unreachable!("handled before connecting"),
    };

    println!("{}", formatter.format_report(&report));
    client.into_inner().close();
    Ok(())
}

fn bit_report(unit: u8, table: BitTable, address: u16, bits: Option<Vec<bool>>) -> ReadReport {
    let data = match bits {
        Some(values) => ReadData::Bits { values },
        None => ReadData::NoValue,
    };
    ReadReport::new(unit, table, address, data)
}

fn register_report(unit: u8, table: RegisterTable, address: u16, regs: Option<Vec<u16>>) -> ReadReport {
    let data = match regs {
        Some(values) => ReadData::Registers { values },
        None => ReadData::NoValue,
    };
    ReadReport::new(unit, table, address, data)
}
