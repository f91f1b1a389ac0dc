//! In-memory transport that answers every request with one scripted reply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::protocol::{BitTable, ExceptionCode, ExceptionResponse, FunctionCode, ReadRequest, RegisterTable, TransportReply};
use super::transport::RegisterTransport;
use crate::utils::error::ModbusError;

#[derive(Debug, Clone)]
pub enum Reply {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
    Exception(ExceptionCode),
    Absent,
    Fail,
}

pub struct ScriptedTransport {
    reply: Reply,
    calls: AtomicUsize,
    last_request: Mutex<Option<ReadRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            reply: Reply::Absent,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_reply(mut self, reply: Reply) -> Self {
        self.reply = reply;
        self
    }

    pub fn with_bits(self, bits: Vec<bool>) -> Self {
        self.with_reply(Reply::Bits(bits))
    }

    pub fn with_registers(self, registers: Vec<u16>) -> Self {
        self.with_reply(Reply::Registers(registers))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ReadRequest> {
        *self.last_request.lock().unwrap()
    }

    fn answer<T>(
        &self,
        function: FunctionCode,
        request: &ReadRequest,
        pick: impl FnOnce(&Reply) -> Option<T>,
    ) -> Result<Option<TransportReply<T>>, ModbusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(*request);

        match &self.reply {
            Reply::Absent => Ok(None),
            Reply::Fail => Err(ModbusError::Timeout),
            Reply::Exception(code) => Ok(Some(TransportReply::Exception(ExceptionResponse {
                function: function.value(),
                code: *code,
            }))),
            other => pick(other)
                .map(|data| Some(TransportReply::Data(data)))
                .ok_or_else(|| ModbusError::InvalidResponse("scripted reply has the wrong shape".into())),
        }
    }
}

#[async_trait]
impl RegisterTransport for ScriptedTransport {
    async fn read_bits(
        &self,
        table: BitTable,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<bool>>>, ModbusError> {
        self.answer(table.function(), request, |reply| match reply {
            Reply::Bits(bits) => Some(bits.clone()),
            _ => None,
        })
    }

    async fn read_registers(
        &self,
        table: RegisterTable,
        request: &ReadRequest,
    ) -> Result<Option<TransportReply<Vec<u16>>>, ModbusError> {
        self.answer(table.function(), request, |reply| match reply {
            Reply::Registers(registers) => Some(registers.clone()),
            _ => None,
        })
    }
}
