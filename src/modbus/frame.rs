//! RTU application data units for the read functions.
//!
//! A request is `unit | function | address(2) | count(2) | crc(2)`; a normal
//! response is `unit | function | byte_count | payload | crc(2)` and an
//! exception response is `unit | function|0x80 | code | crc(2)`.

use super::crc::{append_crc, crc16_modbus};
use super::protocol::{ExceptionCode, ExceptionResponse, FunctionCode, ReadRequest, TransportReply, EXCEPTION_FLAG};
use crate::utils::error::ModbusError;

/// Bytes read before the remaining frame length is known.
pub const RESPONSE_HEADER_LEN: usize = 3;
const CRC_LEN: usize = 2;

pub fn build_read_request(function: FunctionCode, request: &ReadRequest) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(request.unit_id);
    frame.push(function.value());
    frame.extend_from_slice(&request.address.to_be_bytes());
    frame.extend_from_slice(&request.count.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Payload size a well-formed response to `request` carries.
pub fn expected_payload_len(function: FunctionCode, count: u16) -> usize {
    match function {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => (count as usize + 7) / 8,
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => count as usize * 2,
    }
}

/// Given the first [`RESPONSE_HEADER_LEN`] bytes, how many more make up the frame.
pub fn remaining_len(function: FunctionCode, header: &[u8; RESPONSE_HEADER_LEN]) -> Result<usize, ModbusError> {
    let echoed = header[1];
    if echoed == function.value() | EXCEPTION_FLAG {
        Ok(CRC_LEN)
    } else if echoed == function.value() {
        Ok(header[2] as usize + CRC_LEN)
    } else {
        Err(ModbusError::InvalidResponse(format!(
            "unexpected function code 0x{:02x}, expected 0x{:02x}",
            echoed,
            function.value()
        )))
    }
}

/// Validates a complete response frame and returns its payload bytes.
pub fn parse_response(
    function: FunctionCode,
    request: &ReadRequest,
    frame: &[u8],
) -> Result<TransportReply<Vec<u8>>, ModbusError> {
    if frame.len() < RESPONSE_HEADER_LEN + CRC_LEN {
        return Err(ModbusError::InvalidResponse(format!("frame too short: {} bytes", frame.len())));
    }

    let data_len = frame.len() - CRC_LEN;
    let received = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);
    let expected = crc16_modbus(&frame[..data_len]);
    if received != expected {
        return Err(ModbusError::CrcError { expected, received });
    }

    if frame[0] != request.unit_id {
        return Err(ModbusError::InvalidResponse(format!(
            "response from unit {}, expected {}",
            frame[0], request.unit_id
        )));
    }

    if frame[1] == function.value() | EXCEPTION_FLAG {
        return Ok(TransportReply::Exception(ExceptionResponse {
            function: function.value(),
            code: ExceptionCode::from_u8(frame[2]),
        }));
    }
    if frame[1] != function.value() {
        return Err(ModbusError::InvalidResponse(format!(
            "unexpected function code 0x{:02x}, expected 0x{:02x}",
            frame[1],
            function.value()
        )));
    }

    let byte_count = frame[2] as usize;
    let payload = &frame[RESPONSE_HEADER_LEN..data_len];
    if payload.len() != byte_count {
        return Err(ModbusError::InvalidResponse(format!(
            "byte count {} does not match payload of {} bytes",
            byte_count,
            payload.len()
        )));
    }
    let wanted = expected_payload_len(function, request.count);
    if byte_count != wanted {
        return Err(ModbusError::InvalidResponse(format!(
            "expected {} payload bytes for {} items, got {}",
            wanted, request.count, byte_count
        )));
    }

    Ok(TransportReply::Data(payload.to_vec()))
}

/// Coil/discrete-input payloads pack eight values per byte, least significant bit first.
pub fn unpack_bits(payload: &[u8], count: u16) -> Vec<bool> {
    payload
        .iter()
        .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
        .take(count as usize)
        .collect()
}

/// Register payloads are big-endian words on the wire.
pub fn registers_from_payload(payload: &[u8]) -> Result<Vec<u16>, ModbusError> {
    if payload.len() % 2 != 0 {
        return Err(ModbusError::InvalidResponse(format!(
            "register payload of odd length {}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}
