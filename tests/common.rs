//! Shared test fixtures
//!
//! `ScriptedTransport` is an in-memory device: a register/coil map plus
//! per-address failure scripts, with a call log for asserting on wire
//! traffic.

#![allow(dead_code)] // Not every test file uses every helper
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::collections::HashMap;

use async_trait::async_trait;
use modbus_toolbox::{
    encode_float32, ByteOrder, Transport, TransportError, WordOrder,
};

/// What one scripted address does when touched
#[derive(Debug, Clone)]
pub enum Script {
    /// Fail every time
    AlwaysFail,
    /// Fail the first `n` calls, then succeed
    FailTimes(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadRegisters { address: u32, count: u16 },
    WriteRegisters { address: u32, values: Vec<u16> },
    ReadCoils { address: u32, count: u16 },
    WriteCoils { address: u32, values: Vec<bool> },
}

#[derive(Default)]
pub struct ScriptedTransport {
    pub registers: HashMap<u32, u16>,
    pub coils: HashMap<u32, bool>,
    scripts: HashMap<u32, Script>,
    pub calls: Vec<Call>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a failure script at an address.
    pub fn script(&mut self, address: u32, script: Script) {
        self.scripts.insert(address, script);
    }

    /// Store a float across two registers in the given order.
    pub fn set_float(&mut self, address: u32, value: f32, bo: ByteOrder, wo: WordOrder) {
        let words = encode_float32(value, bo, wo);
        self.registers.insert(address, words[0]);
        self.registers.insert(address + 1, words[1]);
    }

    /// Store a fixed-point `int.frac` pair.
    pub fn set_fixed(&mut self, address: u32, integer: u16, fraction: u16) {
        self.registers.insert(address, integer);
        self.registers.insert(address + 1, fraction);
    }

    /// Number of reads issued against an address.
    pub fn reads_at(&self, address: u32) -> usize {
        self.calls
            .iter()
            .filter(|c| {
                matches!(c, Call::ReadRegisters { address: a, .. } if *a == address)
                    || matches!(c, Call::ReadCoils { address: a, .. } if *a == address)
            })
            .count()
    }

    fn fault(&mut self, address: u32) -> Result<(), TransportError> {
        match self.scripts.get_mut(&address) {
            Some(Script::AlwaysFail) => Err(TransportError::connection("scripted failure")),
            Some(Script::FailTimes(n)) if *n > 0 => {
                *n -= 1;
                Err(TransportError::timeout("scripted failure"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read_registers(&mut self, address: u32, count: u16) -> Result<Vec<u16>, TransportError> {
        self.calls.push(Call::ReadRegisters { address, count });
        self.fault(address)?;
        Ok((0..u32::from(count))
            .map(|i| self.registers.get(&(address + i)).copied().unwrap_or(0))
            .collect())
    }

    async fn write_registers(
        &mut self,
        address: u32,
        values: Vec<u16>,
    ) -> Result<(), TransportError> {
        self.calls.push(Call::WriteRegisters {
            address,
            values: values.clone(),
        });
        self.fault(address)?;
        for (i, w) in values.into_iter().enumerate() {
            self.registers.insert(address + i as u32, w);
        }
        Ok(())
    }

    async fn read_coils(&mut self, address: u32, count: u16) -> Result<Vec<bool>, TransportError> {
        self.calls.push(Call::ReadCoils { address, count });
        self.fault(address)?;
        Ok((0..u32::from(count))
            .map(|i| self.coils.get(&(address + i)).copied().unwrap_or(false))
            .collect())
    }

    async fn write_coils(&mut self, address: u32, values: Vec<bool>) -> Result<(), TransportError> {
        self.calls.push(Call::WriteCoils {
            address,
            values: values.clone(),
        });
        self.fault(address)?;
        for (i, b) in values.into_iter().enumerate() {
            self.coils.insert(address + i as u32, b);
        }
        Ok(())
    }
}
