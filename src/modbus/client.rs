use async_trait::async_trait;
use log::{debug, error, info, warn};
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::frame::{build_read_request, parse_response, registers_from_payload, remaining_len, unpack_bits, RESPONSE_HEADER_LEN};
use super::protocol::{BitTable, FunctionCode, ReadRequest, RegisterTable, TransportReply};
use super::transport::RegisterTransport;
use crate::config::settings::{ParityConfig, SerialConfig};
use crate::utils::error::ModbusError;

type SharedPort = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

/// RTU transport over a local serial port.
///
/// The port is opened by [`SerialTransport::open`] and released by
/// [`SerialTransport::close`] or when the transport is dropped. Requests are
/// serialized on the port; a request that hits a communication failure is
/// sent again up to `retries` more times.
pub struct SerialTransport {
    port: SharedPort,
    port_name: String,
    timeout: Duration,
    retries: u32,
}

impl SerialTransport {
    pub fn open(config: &SerialConfig) -> Result<Self, ModbusError> {
        config
            .validate()
            .map_err(|e| ModbusError::InvalidParameter(e.to_string()))?;

        info!("🔌 Connecting to Modbus RTU port: {}", config.port);
        info!(
            "⚙️  Configuration: {} baud, {} data bits, {:?} parity, {} stop bit(s)",
            config.baud_rate, config.data_bits, config.parity, config.stop_bits
        );

        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.timeout())
            .data_bits(data_bits(config.data_bits)?)
            .stop_bits(stop_bits(config.stop_bits)?)
            .parity(parity(config.parity))
            .open()
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", config.port, e);
                ModbusError::ConnectionError(format!("Failed to open port {}: {}", config.port, e))
            })?;

        info!("Modbus RTU connection established");
        Ok(Self::with_port(port, &config.port, config.timeout(), config.retries))
    }

    fn with_port(port: Box<dyn SerialPort>, port_name: &str, timeout: Duration, retries: u32) -> Self {
        Self {
            port: Arc::new(Mutex::new(Some(port))),
            port_name: port_name.to_string(),
            timeout,
            retries,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.port.lock().map(|port| port.is_some()).unwrap_or(false)
    }

    /// Releases the port. Later requests fail with a connection error.
    pub fn close(&self) {
        if let Ok(mut port) = self.port.lock() {
            if port.take().is_some() {
                info!("Serial port {} closed", self.port_name);
            }
        }
    }

    async fn transact(
        &self,
        function: FunctionCode,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<u8>>>, ModbusError> {
        let frame = build_read_request(function, request);
        let attempts = self.retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            let port = Arc::clone(&self.port);
            let frame = frame.clone();
            let request = *request;

            let result = tokio::task::spawn_blocking(move || exchange(&port, function, &request, &frame))
                .await
                .map_err(|e| ModbusError::CommunicationError(format!("Serial worker failed: {}", e)))?;

            match result {
                Err(e) if e.is_retryable() && !is_closed(&e) && attempt < attempts => {
                    warn!(
                        "Attempt {}/{} to unit {} on {} failed: {}, retrying",
                        attempt, attempts, request.unit_id, self.port_name, e
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl RegisterTransport for SerialTransport {
    async fn read_bits(
        &self,
        table: BitTable,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<bool>>>, ModbusError> {
        let reply = self.transact(table.function(), request).await?;
        reply
            .map(|r| r.try_map(|payload| Ok(unpack_bits(&payload, request.count))))
            .transpose()
    }

    async fn read_registers(
        &self,
        table: RegisterTable,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<u16>>>, ModbusError> {
        let reply = self.transact(table.function(), request).await?;
        reply
            .map(|r| r.try_map(|payload| registers_from_payload(&payload)))
            .transpose()
    }
}

// One request/response exchange; runs on the blocking pool while holding the port.
fn exchange(
    port: &Mutex<Option<Box<dyn SerialPort>>>,
    function: FunctionCode,
    request: &ReadRequest,
    frame: &[u8],
) -> Result<Option<TransportReply<Vec<u8>>>, ModbusError> {
    let mut guard = port.lock().map_err(|_| ModbusError::LockError)?;
    let port = guard
        .as_mut()
        .ok_or_else(|| ModbusError::ConnectionError("serial port is closed".into()))?;

    // Drop stale bytes from an earlier timed-out exchange
    port.clear(ClearBuffer::Input)
        .map_err(|e| ModbusError::CommunicationError(format!("Clear failed: {}", e)))?;

    debug!("📤 Sending frame: {}", hex::encode(frame));
    port.write_all(frame)?;
    port.flush()?;

    if request.suppress_response {
        return Ok(None);
    }

    let mut header = [0u8; RESPONSE_HEADER_LEN];
    port.read_exact(&mut header)?;
    let rest = remaining_len(function, &header)?;

    let mut response = header.to_vec();
    response.resize(RESPONSE_HEADER_LEN + rest, 0);
    port.read_exact(&mut response[RESPONSE_HEADER_LEN..])?;
    debug!("📥 Received frame: {}", hex::encode(&response));

    parse_response(function, request, &response).map(Some)
}

fn is_closed(err: &ModbusError) -> bool {
    matches!(err, ModbusError::ConnectionError(_))
}

fn data_bits(bits: u8) -> Result<serialport::DataBits, ModbusError> {
    match bits {
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(ModbusError::invalid(format!("unsupported data bits: {}", other))),
    }
}

fn stop_bits(bits: u8) -> Result<serialport::StopBits, ModbusError> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(ModbusError::invalid(format!("unsupported stop bits: {}", other))),
    }
}

fn parity(parity: ParityConfig) -> serialport::Parity {
    match parity {
        ParityConfig::None => serialport::Parity::None,
        ParityConfig::Even => serialport::Parity::Even,
        ParityConfig::Odd => serialport::Parity::Odd,
    }
}

/// Names and USB details of the serial ports visible on this machine.
pub fn list_ports() -> Result<Vec<String>, ModbusError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                let vendor = usb.manufacturer.unwrap_or_else(|| format!("{:04x}", usb.vid));
                match usb.serial_number {
                    Some(serial) => format!("{} (USB {}, serial {})", port.port_name, vendor, serial),
                    None => format!("{} (USB {})", port.port_name, vendor),
                }
            }
            _ => port.port_name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::crc::append_crc;
    use crate::utils::error::ErrorKind;
    use std::collections::VecDeque;
    use std::io;

    // Replies are queued per written frame; an empty reply means the device stays silent.
    #[derive(Default)]
    struct Line {
        written: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
        rx: VecDeque<u8>,
        reads: usize,
    }

    #[derive(Clone, Default)]
    struct MockPort {
        line: Arc<Mutex<Line>>,
    }

    impl MockPort {
        fn replying(replies: Vec<Vec<u8>>) -> Self {
            let port = Self::default();
            port.line.lock().unwrap().replies = replies.into();
            port
        }

        fn frames_sent(&self) -> usize {
            self.line.lock().unwrap().written.len()
        }

        fn reads(&self) -> usize {
            self.line.lock().unwrap().reads
        }

        fn last_frame(&self) -> Option<Vec<u8>> {
            self.line.lock().unwrap().written.last().cloned()
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut line = self.line.lock().unwrap();
            line.reads += 1;
            if line.rx.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
            }
            let n = buf.len().min(line.rx.len());
            for (slot, byte) in buf.iter_mut().zip(line.rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut line = self.line.lock().unwrap();
            line.written.push(buf.to_vec());
            let reply = line.replies.pop_front().unwrap_or_default();
            line.rx.extend(reply);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialPort for MockPort {
        fn name(&self) -> Option<String> {
            Some("mock".into())
        }
        fn baud_rate(&self) -> serialport::Result<u32> {
            Ok(9600)
        }
        fn data_bits(&self) -> serialport::Result<serialport::DataBits> {
            Ok(serialport::DataBits::Eight)
        }
        fn flow_control(&self) -> serialport::Result<serialport::FlowControl> {
            Ok(serialport::FlowControl::None)
        }
        fn parity(&self) -> serialport::Result<serialport::Parity> {
            Ok(serialport::Parity::None)
        }
        fn stop_bits(&self) -> serialport::Result<serialport::StopBits> {
            Ok(serialport::StopBits::One)
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(10)
        }
        fn set_baud_rate(&mut self, _: u32) -> serialport::Result<()> {
            Ok(())
        }
        fn set_data_bits(&mut self, _: serialport::DataBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_flow_control(&mut self, _: serialport::FlowControl) -> serialport::Result<()> {
            Ok(())
        }
        fn set_parity(&mut self, _: serialport::Parity) -> serialport::Result<()> {
            Ok(())
        }
        fn set_stop_bits(&mut self, _: serialport::StopBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_timeout(&mut self, _: Duration) -> serialport::Result<()> {
            Ok(())
        }
        fn write_request_to_send(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn write_data_terminal_ready(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn bytes_to_read(&self) -> serialport::Result<u32> {
            Ok(self.line.lock().unwrap().rx.len() as u32)
        }
        fn bytes_to_write(&self) -> serialport::Result<u32> {
            Ok(0)
        }
        fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
            if matches!(buffer_to_clear, ClearBuffer::Input | ClearBuffer::All) {
                self.line.lock().unwrap().rx.clear();
            }
            Ok(())
        }
        fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
            Ok(Box::new(self.clone()))
        }
        fn set_break(&self) -> serialport::Result<()> {
            Ok(())
        }
        fn clear_break(&self) -> serialport::Result<()> {
            Ok(())
        }
    }

    fn serial_over(port: &MockPort, retries: u32) -> SerialTransport {
        SerialTransport::with_port(Box::new(port.clone()), "/dev/mock", Duration::from_millis(10), retries)
    }

    // Holding-register reply from unit 1 carrying the given words.
    fn register_reply(values: &[u16]) -> Vec<u8> {
        let mut frame = vec![0x01, 0x03, (values.len() * 2) as u8];
        for value in values {
            frame.extend_from_slice(&value.to_be_bytes());
        }
        append_crc(&mut frame);
        frame
    }

    #[tokio::test]
    async fn test_read_registers_over_serial() {
        let port = MockPort::replying(vec![register_reply(&[0x002A, 0x1234])]);
        let transport = serial_over(&port, 3);

        let reply = transport
            .read_registers(RegisterTable::Holding, &ReadRequest::new(0x10, 2, 1))
            .await
            .unwrap();
        assert_eq!(reply, Some(TransportReply::Data(vec![0x002A, 0x1234])));
        assert_eq!(port.frames_sent(), 1);
        assert_eq!(
            port.last_frame(),
            Some(build_read_request(FunctionCode::ReadHoldingRegisters, &ReadRequest::new(0x10, 2, 1)))
        );
    }

    #[tokio::test]
    async fn test_retries_are_extra_attempts() {
        for retries in [1, 3] {
            let port = MockPort::default();
            let transport = serial_over(&port, retries);

            let err = transport
                .read_registers(RegisterTable::Holding, &ReadRequest::new(0, 1, 1))
                .await
                .unwrap_err();
            assert!(matches!(err, ModbusError::Timeout));
            assert_eq!(port.frames_sent(), retries as usize + 1);
        }
    }

    #[tokio::test]
    async fn test_corrupt_crc_is_retried() {
        let mut corrupt = register_reply(&[0x0007]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let port = MockPort::replying(vec![corrupt, register_reply(&[0x0007])]);
        let transport = serial_over(&port, 1);

        let reply = transport
            .read_registers(RegisterTable::Holding, &ReadRequest::new(0, 1, 1))
            .await
            .unwrap();
        assert_eq!(reply, Some(TransportReply::Data(vec![0x0007])));
        assert_eq!(port.frames_sent(), 2);
    }

    #[tokio::test]
    async fn test_closed_port_fails_without_retry() {
        let port = MockPort::default();
        let transport = serial_over(&port, 3);
        assert!(transport.is_open());
        assert_eq!(transport.port_name(), "/dev/mock");
        assert_eq!(transport.timeout(), Duration::from_millis(10));

        transport.close();
        assert!(!transport.is_open());

        let err = transport
            .read_bits(BitTable::Coils, &ReadRequest::new(0, 8, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ModbusError::ConnectionError(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(port.frames_sent(), 0);
    }

    #[tokio::test]
    async fn test_suppressed_request_is_written_but_not_read() {
        let port = MockPort::default();
        let transport = serial_over(&port, 3);

        let reply = transport
            .read_registers(RegisterTable::Input, &ReadRequest::new(5, 2, 1).suppressed(true))
            .await
            .unwrap();
        assert_eq!(reply, None);
        assert_eq!(port.frames_sent(), 1);
        assert_eq!(port.reads(), 0);
    }

    #[tokio::test]
    async fn test_device_exception_is_not_retried() {
        let mut exception = vec![0x01, 0x83, 0x02];
        append_crc(&mut exception);
        let port = MockPort::replying(vec![exception]);
        let transport = serial_over(&port, 3);

        let reply = transport
            .read_registers(RegisterTable::Holding, &ReadRequest::new(0, 1, 1))
            .await
            .unwrap();
        assert!(matches!(reply, Some(TransportReply::Exception(_))));
        assert_eq!(port.frames_sent(), 1);
    }

    #[test]
    fn test_line_settings_conversion() {
        assert_eq!(data_bits(7).unwrap(), serialport::DataBits::Seven);
        assert_eq!(stop_bits(2).unwrap(), serialport::StopBits::Two);
        assert_eq!(parity(ParityConfig::Odd), serialport::Parity::Odd);
        assert!(data_bits(5).is_err());
    }

    #[test]
    fn test_open_rejects_invalid_config_before_touching_port() {
        let config = SerialConfig {
            baud_rate: 1200,
            ..SerialConfig::default()
        };
        let err = SerialTransport::open(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let config = SerialConfig {
            port: "/dev/does-not-exist-modbus-rtu".into(),
            ..SerialConfig::default()
        };
        let err = SerialTransport::open(&config).err().unwrap();
        assert!(matches!(err, ModbusError::ConnectionError(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
