//! Register codec
//!
//! Pure conversions between raw 16-bit register words and typed engineering
//! values. Field devices disagree on how a 32-bit float is spread across two
//! registers: byte order governs the byte sequence inside each word, word
//! order governs which register carries the high half. The four combinations
//! map onto the ABCD notation commonly printed in device manuals:
//!
//! For the value `0x12345678` (A = most significant byte):
//!
//! | byte order | word order | wire bytes | manual name |
//! |------------|------------|------------|-------------|
//! | Big        | Big        | ABCD       | big-endian |
//! | Big        | Little     | CDAB       | word-swapped (most PLCs) |
//! | Little     | Big        | BADC       | byte-swapped |
//! | Little     | Little     | DCBA       | little-endian |
//!
//! All functions here are deterministic and perform no I/O.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ToolboxError, ToolboxResult};

/// Byte order within a single 16-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Most significant byte first (Modbus wire default)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

/// Order of the two registers carrying a 32-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrder {
    /// First register holds the high half
    #[default]
    Big,
    /// First register holds the low half
    Little,
}

/// What to do when a register expected by the decoder is missing
///
/// One observed device-family revision substituted `0` for an absent
/// fractional register, another left the whole value absent. Both behaviors
/// exist in the field, so the choice is an explicit flag rather than a
/// hidden default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// A missing register makes the whole value absent
    #[default]
    Absent,
    /// A missing register is treated as zero
    Zero,
}

// ============================================================================
// 32-bit float
// ============================================================================

/// Reassemble two register words into the big-endian byte image of a value.
fn words_to_be_bytes(words: &[u16; 2], byte_order: ByteOrder, word_order: WordOrder) -> [u8; 4] {
    let (high, low) = match word_order {
        WordOrder::Big => (words[0], words[1]),
        WordOrder::Little => (words[1], words[0]),
    };

    let word_bytes = |w: u16| -> [u8; 2] {
        match byte_order {
            ByteOrder::Big => w.to_be_bytes(),
            ByteOrder::Little => w.to_le_bytes(),
        }
    };

    let [a, b] = word_bytes(high);
    let [c, d] = word_bytes(low);
    [a, b, c, d]
}

/// Split the big-endian byte image of a value into two register words.
fn be_bytes_to_words(bytes: [u8; 4], byte_order: ByteOrder, word_order: WordOrder) -> [u16; 2] {
    let word_from = |pair: [u8; 2]| -> u16 {
        match byte_order {
            ByteOrder::Big => u16::from_be_bytes(pair),
            ByteOrder::Little => u16::from_le_bytes(pair),
        }
    };

    let high = word_from([bytes[0], bytes[1]]);
    let low = word_from([bytes[2], bytes[3]]);

    match word_order {
        WordOrder::Big => [high, low],
        WordOrder::Little => [low, high],
    }
}

/// Decode two registers into an IEEE-754 32-bit float.
///
/// # Arguments
/// * `words` - Raw register words as read off the wire (at least 2)
/// * `byte_order` - Byte sequence inside each register
/// * `word_order` - Which register carries the high half
///
/// # Errors
/// `Decode` if fewer than 2 words are supplied. Never panics.
pub fn decode_float32(
    words: &[u16],
    byte_order: ByteOrder,
    word_order: WordOrder,
) -> ToolboxResult<f32> {
    if words.len() < 2 {
        return Err(ToolboxError::decode(format!(
            "float32 needs 2 registers, got {}",
            words.len()
        )));
    }

    let pair = [words[0], words[1]];
    let bytes = words_to_be_bytes(&pair, byte_order, word_order);
    let value = f32::from_be_bytes(bytes);

    trace!(
        "Decoded float32: words=[0x{:04X}, 0x{:04X}] byte_order={:?} word_order={:?} value={}",
        words[0],
        words[1],
        byte_order,
        word_order,
        value
    );

    Ok(value)
}

/// Encode an IEEE-754 32-bit float into two register words.
///
/// Exact inverse of [`decode_float32`] for the same order pair: the round
/// trip is bit-exact for every finite value.
pub fn encode_float32(value: f32, byte_order: ByteOrder, word_order: WordOrder) -> [u16; 2] {
    be_bytes_to_words(value.to_be_bytes(), byte_order, word_order)
}

// ============================================================================
// Fixed-point two-register decimal
// ============================================================================

/// Decode the two-register `int.frac` encoding used by some transmitters.
///
/// `words[0]` is the integer part, `words[1]` the decimal digits of the
/// fraction, zero-padded to at least two digits: `[12, 5]` reads as `12.05`,
/// `[12, 50]` as `12.50`, `[12, 505]` as `12.505`.
///
/// A missing register yields `None` under [`MissingValuePolicy::Absent`] and
/// substitutes `0` under [`MissingValuePolicy::Zero`].
pub fn decode_fixed_point(words: &[u16], policy: MissingValuePolicy) -> Option<f64> {
    let integer = match (words.first(), policy) {
        (Some(&w), _) => w,
        (None, MissingValuePolicy::Zero) => 0,
        (None, MissingValuePolicy::Absent) => return None,
    };
    let fraction = match (words.get(1), policy) {
        (Some(&w), _) => w,
        (None, MissingValuePolicy::Zero) => 0,
        (None, MissingValuePolicy::Absent) => return None,
    };

    // Fraction registers hold decimal digits, minimum two places: 5 -> .05
    let digits = if fraction == 0 {
        2
    } else {
        let mut n = fraction;
        let mut count = 0u32;
        while n > 0 {
            n /= 10;
            count += 1;
        }
        count.max(2)
    };

    let scale = 10u32.pow(digits) as f64;
    Some(f64::from(integer) + f64::from(fraction) / scale)
}

/// Encode a non-negative decimal into the two-register `int.frac` layout.
///
/// The fraction is rounded to two decimal places, matching what the devices
/// using this encoding actually store.
pub fn encode_fixed_point(value: f64) -> ToolboxResult<[u16; 2]> {
    if !value.is_finite() || value < 0.0 || value >= f64::from(u16::MAX) + 1.0 {
        return Err(ToolboxError::decode(format!(
            "value {value} not representable as fixed-point"
        )));
    }

    let integer = value.trunc() as u16;
    let fraction = ((value - value.trunc()) * 100.0).round() as u16;
    // 0.999.. rounds up to 100 hundredths, carry into the integer part;
    // at 65535.995+ the carry itself leaves u16 range
    if fraction >= 100 {
        let carried = integer.checked_add(1).ok_or_else(|| {
            ToolboxError::decode(format!("value {value} not representable as fixed-point"))
        })?;
        return Ok([carried, 0]);
    }
    Ok([integer, fraction])
}

// ============================================================================
// Booleans
// ============================================================================

/// Extract a single bit from a coil/discrete-input read.
///
/// # Errors
/// `Decode` if `index` is past the end of the bit sequence.
pub fn decode_boolean(bits: &[bool], index: usize) -> ToolboxResult<bool> {
    bits.get(index).copied().ok_or_else(|| {
        ToolboxError::decode(format!(
            "bit index {} out of range for {} bits",
            index,
            bits.len()
        ))
    })
}

/// Extract a bit from a register word (LSB = bit 0).
///
/// # Errors
/// `Decode` if `bit` is not in 0-15.
pub fn extract_bit(word: u16, bit: u8) -> ToolboxResult<bool> {
    if bit > 15 {
        return Err(ToolboxError::decode(format!(
            "Invalid bit position: {bit} (must be 0-15)"
        )));
    }
    Ok((word >> bit) & 0x01 == 1)
}
