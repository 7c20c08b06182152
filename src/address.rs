//! Address mapping
//!
//! Computes raw register/coil addresses from application-level logical
//! indices. Logical indices are 1-based measurement slots; the scheme
//! describes how a device family lays those slots out in register space.

use serde::{Deserialize, Serialize};

use crate::error::{ToolboxError, ToolboxResult};

/// Base of the discrete-input address table in the classic Modbus data model.
///
/// Discrete inputs are numbered from 10001; the matching coil write address
/// is obtained by subtracting this base (10001 -> coil 1).
pub const DISCRETE_INPUT_BASE: u32 = 10_000;

/// Highest raw address a mapped slot may occupy
const MAX_RAW_ADDRESS: u32 = u16::MAX as u32;

/// How a device family lays out its logical measurement slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressScheme {
    /// Evenly spaced slots: `raw = offset + index * stride`
    ///
    /// Used by transmitters exposing 30+ sequential measurement slots
    /// (e.g. offset 5, stride 10: slot 1 at 15, slot 30 at 305).
    Linear { offset: u32, stride: u32 },

    /// Hard-coded per-channel word offsets relative to a block base
    ///
    /// Used by multi-channel analog gateways where each channel sits at a
    /// fixed position inside one readable block.
    Fixed { base: u32, offsets: Vec<u32> },
}

impl AddressScheme {
    /// Map a 1-based logical index to its raw register/coil address.
    ///
    /// # Errors
    /// `AddressOutOfRange` for index 0, an index past a fixed table, or a
    /// result outside the 16-bit register space.
    pub fn logical_to_raw(&self, index: u32) -> ToolboxResult<u32> {
        if index == 0 {
            return Err(ToolboxError::AddressOutOfRange { index });
        }

        let raw = match self {
            AddressScheme::Linear { offset, stride } => index
                .checked_mul(*stride)
                .and_then(|span| span.checked_add(*offset)),
            AddressScheme::Fixed { base, offsets } => offsets
                .get(index as usize - 1)
                .and_then(|off| base.checked_add(*off)),
        };

        match raw {
            Some(addr) if addr <= MAX_RAW_ADDRESS => Ok(addr),
            _ => Err(ToolboxError::AddressOutOfRange { index }),
        }
    }

    /// Word offset of a logical slot inside the block returned by
    /// [`block_extent`](Self::block_extent).
    pub fn slot_offset(&self, index: u32) -> ToolboxResult<usize> {
        if index == 0 {
            return Err(ToolboxError::AddressOutOfRange { index });
        }
        match self {
            AddressScheme::Linear { stride, .. } => Ok((index as usize - 1) * *stride as usize),
            AddressScheme::Fixed { offsets, .. } => offsets
                .get(index as usize - 1)
                .map(|off| *off as usize)
                .ok_or(ToolboxError::AddressOutOfRange { index }),
        }
    }

    /// Start address and word count of one contiguous read covering slots
    /// `1..=amount`, each slot occupying `words_per_slot` registers.
    pub fn block_extent(&self, amount: u32, words_per_slot: u16) -> ToolboxResult<(u32, u16)> {
        if amount == 0 {
            return Err(ToolboxError::AddressOutOfRange { index: 0 });
        }

        let start = self.logical_to_raw(1)?;
        let last_offset = self.slot_offset(amount)? as u32;
        let count = last_offset + u32::from(words_per_slot);

        if start + count - 1 > MAX_RAW_ADDRESS || count > u32::from(u16::MAX) {
            return Err(ToolboxError::AddressOutOfRange { index: amount });
        }
        Ok((start, count as u16))
    }

    /// Number of slots a fixed table defines, if bounded.
    pub fn slot_count(&self) -> Option<usize> {
        match self {
            AddressScheme::Linear { .. } => None,
            AddressScheme::Fixed { offsets, .. } => Some(offsets.len()),
        }
    }
}

/// Translate a discrete-input table address to its coil write address.
///
/// # Errors
/// `AddressOutOfRange` when the address is not inside the discrete-input
/// table (10001 and up).
pub fn discrete_to_coil(address: u32) -> ToolboxResult<u32> {
    match address.checked_sub(DISCRETE_INPUT_BASE) {
        Some(coil) if coil >= 1 => Ok(coil),
        _ => Err(ToolboxError::AddressOutOfRange { index: address }),
    }
}
