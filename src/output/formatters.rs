use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::{DataType, Endian, RegisterValue};

/// What a single CLI read produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadData {
    Bits { values: Vec<bool> },
    Registers { values: Vec<u16> },
    Value {
        data_type: DataType,
        byte_order: Endian,
        word_order: Endian,
        raw: Vec<u16>,
        value: RegisterValue,
    },
    /// Fire-and-forget request; nothing was awaited.
    NoValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadReport {
    pub unit_id: u8,
    pub table: String,
    pub address: u16,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: ReadData,
}

impl ReadReport {
    pub fn new(unit_id: u8, table: impl ToString, address: u16, data: ReadData) -> Self {
        Self {
            unit_id,
            table: table.to_string(),
            address,
            timestamp: Utc::now(),
            data,
        }
    }
}

pub trait DataFormatter: Send + Sync {
    fn format_report(&self, report: &ReadReport) -> String;
    fn format_ports(&self, ports: &[String]) -> String;
}

pub struct ConsoleFormatter;

impl DataFormatter for ConsoleFormatter {
    fn format_report(&self, report: &ReadReport) -> String {
        let mut output = format!(
            "🔹 Unit {} {} @ {} ({})\n",
            report.unit_id,
            report.table,
            report.address,
            report.timestamp.format("%Y-%m-%d %H:%M:%S")
        );

        match &report.data {
            ReadData::Bits { values } => {
                for (offset, bit) in values.iter().enumerate() {
                    output.push_str(&format!("  [{}] {}\n", report.address as usize + offset, u8::from(*bit)));
                }
            }
            ReadData::Registers { values } => {
                for (offset, reg) in values.iter().enumerate() {
                    output.push_str(&format!(
                        "  [{}] 0x{:04x} ({})\n",
                        report.address as usize + offset,
                        reg,
                        reg
                    ));
                }
            }
            ReadData::Value { data_type, byte_order, word_order, raw, value } => {
                output.push_str(&format!("  {}: {}\n", data_type, value));
                output.push_str(&format!(
                    "  raw: [{}] (byte order {}, word order {})\n",
                    raw.iter().map(|r| format!("0x{:04x}", r)).collect::<Vec<_>>().join(", "),
                    byte_order,
                    word_order
                ));
            }
            ReadData::NoValue => output.push_str("  request sent, no response expected\n"),
        }
        output
    }

    fn format_ports(&self, ports: &[String]) -> String {
        if ports.is_empty() {
            return "⚠️  No serial ports found\n".to_string();
        }
        let mut output = String::from("📡 Available Serial Ports:\n");
        for (index, port) in ports.iter().enumerate() {
            output.push_str(&format!("   {}. {}\n", index + 1, port));
        }
        output
    }
}

pub struct JsonFormatter;

impl DataFormatter for JsonFormatter {
    fn format_report(&self, report: &ReadReport) -> String {
        to_json(report)
    }

    fn format_ports(&self, ports: &[String]) -> String {
        to_json(&serde_json::json!({ "ports": ports }))
    }
}

// Serialization failures still produce a JSON document
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": format!("serialization failed: {}", e) }).to_string())
}

/// Wire-order hex: register bytes big-endian, bits packed LSB first.
pub struct HexFormatter;

impl DataFormatter for HexFormatter {
    fn format_report(&self, report: &ReadReport) -> String {
        match &report.data {
            ReadData::Bits { values } => hex::encode(pack_bits(values)),
            ReadData::Registers { values } => hex::encode(register_bytes(values)),
            ReadData::Value { raw, .. } => hex::encode(register_bytes(raw)),
            ReadData::NoValue => String::new(),
        }
    }

    fn format_ports(&self, ports: &[String]) -> String {
        ports.join("\n")
    }
}

fn register_bytes(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_be_bytes()).collect()
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| if bit { byte | (1 << i) } else { byte })
        })
        .collect()
}
