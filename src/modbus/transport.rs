use async_trait::async_trait;

use super::protocol::{BitTable, ReadRequest, RegisterTable, TransportReply};
use crate::utils::error::ModbusError;

/// The capability the transaction layer reads through.
///
/// `Ok(None)` means nothing came back: expected for suppressed requests,
/// a protocol failure otherwise. Communication failures are `Err` and the
/// implementation has already spent its own retry budget before returning one.
/// Only one transaction may be outstanding per transport; implementations
/// serialize concurrent callers themselves.
#[async_trait]
pub trait RegisterTransport: Send + Sync {
    async fn read_bits(
        &self,
        table: BitTable,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<bool>>>, ModbusError>;

    async fn read_registers(
        &self,
        table: RegisterTable,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<u16>>>, ModbusError>;
}
