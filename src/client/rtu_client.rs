use log::debug;

use crate::codec::{self, DataType, Endian, RegisterScalar, RegisterValue};
use crate::modbus::executor;
use crate::modbus::protocol::{BitTable, ReadRequest, RegisterTable};
use crate::modbus::transport::RegisterTransport;
use crate::utils::error::ModbusError;

/// Addressing and layout for one typed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub unit_id: u8,
    /// Character count; only used for [`DataType::String`].
    pub string_length: usize,
    pub byte_order: Endian,
    pub word_order: Endian,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            unit_id: 1,
            string_length: 0,
            byte_order: Endian::Big,
            word_order: Endian::Big,
        }
    }
}

impl ReadOptions {
    pub fn unit(unit_id: u8) -> Self {
        Self {
            unit_id,
            ..Self::default()
        }
    }

    pub fn string_length(mut self, string_length: usize) -> Self {
        self.string_length = string_length;
        self
    }

    pub fn byte_order(mut self, byte_order: Endian) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn word_order(mut self, word_order: Endian) -> Self {
        self.word_order = word_order;
        self
    }
}

/// Modbus RTU client exposing raw and typed reads over any [`RegisterTransport`].
pub struct ModbusRtuClient<T> {
    transport: T,
}

impl<T: RegisterTransport> ModbusRtuClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Function 0x01.
    pub async fn read_coils(
        &self,
        address: u16,
        count: u16,
        unit_id: u8,
        no_response_expected: bool,
    ) -> Result<Option<Vec<bool>>, ModbusError> {
        let request = ReadRequest::new(address, count, unit_id).suppressed(no_response_expected);
        executor::read_bits(&self.transport, BitTable::Coils, &request).await
    }

    /// Function 0x02.
    pub async fn read_discrete_inputs(
        &self,
        address: u16,
        count: u16,
        unit_id: u8,
        no_response_expected: bool,
    ) -> Result<Option<Vec<bool>>, ModbusError> {
        let request = ReadRequest::new(address, count, unit_id).suppressed(no_response_expected);
        executor::read_bits(&self.transport, BitTable::DiscreteInputs, &request).await
    }

    /// Function 0x03.
    pub async fn read_holding_registers(
        &self,
        address: u16,
        count: u16,
        unit_id: u8,
        no_response_expected: bool,
    ) -> Result<Option<Vec<u16>>, ModbusError> {
        let request = ReadRequest::new(address, count, unit_id).suppressed(no_response_expected);
        executor::read_registers(&self.transport, RegisterTable::Holding, &request).await
    }

    /// Function 0x04.
    pub async fn read_input_registers(
        &self,
        address: u16,
        count: u16,
        unit_id: u8,
        no_response_expected: bool,
    ) -> Result<Option<Vec<u16>>, ModbusError> {
        let request = ReadRequest::new(address, count, unit_id).suppressed(no_response_expected);
        executor::read_registers(&self.transport, RegisterTable::Input, &request).await
    }

    /// Reads and decodes one value, returning the raw registers alongside it.
    pub async fn read_value_with_raw(
        &self,
        table: RegisterTable,
        address: u16,
        data_type: DataType,
        options: &ReadOptions,
    ) -> Result<(Vec<u16>, RegisterValue), ModbusError> {
        let count = data_type.register_count(options.string_length)?;
        let request = ReadRequest::new(address, count, options.unit_id);

        let raw = executor::read_registers(&self.transport, table, &request)
            .await?
            .ok_or_else(|| {
                ModbusError::InvalidResponse(format!("no registers returned but a {} was expected", data_type))
            })?;

        let value = codec::decode(&raw, data_type, options.byte_order, options.word_order)?;
        debug!(
            "Decoded {} at {} {} of unit {}: {}",
            data_type, table, address, options.unit_id, value
        );
        Ok((raw, value))
    }

    pub async fn read_value(
        &self,
        table: RegisterTable,
        address: u16,
        data_type: DataType,
        options: &ReadOptions,
    ) -> Result<RegisterValue, ModbusError> {
        self.read_value_with_raw(table, address, data_type, options)
            .await
            .map(|(_, value)| value)
    }

    pub async fn read_holding_value(
        &self,
        address: u16,
        data_type: DataType,
        options: &ReadOptions,
    ) -> Result<RegisterValue, ModbusError> {
        self.read_value(RegisterTable::Holding, address, data_type, options).await
    }

    pub async fn read_input_value(
        &self,
        address: u16,
        data_type: DataType,
        options: &ReadOptions,
    ) -> Result<RegisterValue, ModbusError> {
        self.read_value(RegisterTable::Input, address, data_type, options).await
    }

    /// Typed holding-register read, e.g. `client.read_holding_as::<f32>(0x10, 1)`.
    pub async fn read_holding_as<V: RegisterScalar>(&self, address: u16, unit_id: u8) -> Result<V, ModbusError> {
        self.read_holding_value(address, V::DATA_TYPE, &ReadOptions::unit(unit_id))
            .await
            .and_then(V::try_from)
    }

    pub async fn read_input_as<V: RegisterScalar>(&self, address: u16, unit_id: u8) -> Result<V, ModbusError> {
        self.read_input_value(address, V::DATA_TYPE, &ReadOptions::unit(unit_id))
            .await
            .and_then(V::try_from)
    }

    pub async fn read_holding_string(
        &self,
        address: u16,
        string_length: usize,
        unit_id: u8,
    ) -> Result<String, ModbusError> {
        let options = ReadOptions::unit(unit_id).string_length(string_length);
        self.read_holding_value(address, DataType::String, &options)
            .await
            .and_then(String::try_from)
    }

    pub async fn read_input_string(
        &self,
        address: u16,
        string_length: usize,
        unit_id: u8,
    ) -> Result<String, ModbusError> {
        let options = ReadOptions::unit(unit_id).string_length(string_length);
        self.read_input_value(address, DataType::String, &options)
            .await
            .and_then(String::try_from)
    }
}
