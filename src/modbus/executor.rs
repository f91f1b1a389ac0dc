use log::{debug, error};

use super::protocol::{BitTable, ReadRequest, RegisterTable, TransportReply, MAX_READ_BITS, MAX_READ_REGISTERS};
use super::transport::RegisterTransport;
use crate::utils::error::ModbusError;

/// Reads coils or discrete inputs.
///
/// Returns `Ok(None)` for suppressed requests, whatever the transport did.
pub async fn read_bits(
    transport: &dyn RegisterTransport,
    table: BitTable,
    request: &ReadRequest,
) -> Result<Option<Vec<bool>>, ModbusError> {
    request.validate(MAX_READ_BITS)?;
    debug!(
        "Reading {} {} from unit {} at address {}",
        request.count, table, request.unit_id, request.address
    );

    let outcome = transport.read_bits(table, request).await;
    if request.suppress_response {
        discard(outcome, &table.to_string());
        return Ok(None);
    }

    let values = take_values(outcome, request.count).map_err(|e| {
        error!("Failed to read {} from unit {}: {}", table, request.unit_id, e);
        e
    })?;
    Ok(Some(values))
}

/// Reads holding or input registers.
pub async fn read_registers(
    transport: &dyn RegisterTransport,
    table: RegisterTable,
    request: &ReadRequest,
) -> Result<Option<Vec<u16>>, ModbusError> {
    request.validate(MAX_READ_REGISTERS)?;
    debug!(
        "Reading {} {} from unit {} at address {}",
        request.count, table, request.unit_id, request.address
    );

    let outcome = transport.read_registers(table, request).await;
    if request.suppress_response {
        discard(outcome, &table.to_string());
        return Ok(None);
    }

    let values = take_values(outcome, request.count).map_err(|e| {
        error!("Failed to read {} from unit {}: {}", table, request.unit_id, e);
        e
    })?;
    Ok(Some(values))
}

// Fire-and-forget: no acknowledgement is expected, so nothing is surfaced.
fn discard<T>(outcome: Result<Option<TransportReply<T>>, ModbusError>, what: &str) {
    if let Err(e) = outcome {
        debug!("Ignoring failure of suppressed {} read: {}", what, e);
    }
}

fn take_values<T>(
    outcome: Result<Option<TransportReply<Vec<T>>>, ModbusError>,
    count: u16,
) -> Result<Vec<T>, ModbusError> {
    match outcome? {
        None => Err(ModbusError::NoResponse),
        Some(TransportReply::Exception(exception)) => Err(exception.into()),
        Some(TransportReply::Data(mut values)) => {
            if values.len() < count as usize {
                return Err(ModbusError::InvalidResponse(format!(
                    "expected {} values, device returned {}",
                    count,
                    values.len()
                )));
            }
            values.truncate(count as usize);
            Ok(values)
        }
    }
}
