//! Resilient polling engine
//!
//! Wraps a [`Transport`] with bounded retries, sentinel pre-flight checks,
//! partial-failure absorption and an optional wall-clock budget. The engine
//! never aborts a batch because one slot failed: failed slots come back
//! absent and the outcome's status says what happened.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::address::discrete_to_coil;
use crate::codec::{
    decode_boolean, decode_fixed_point, decode_float32, encode_fixed_point, encode_float32,
};
use crate::error::{ToolboxError, ToolboxResult};
use crate::profile::{DecodeKind, DeviceProfile};
use crate::transport::Transport;

// ============================================================================
// Outcome types
// ============================================================================

/// A decoded measurement value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedValue {
    Float(f64),
    Bool(bool),
}

impl DecodedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Float(v) => Some(*v),
            DecodedValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DecodedValue::Bool(b) => Some(*b),
            DecodedValue::Float(_) => None,
        }
    }
}

/// How a batch poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Every requested slot decoded
    Complete,
    /// Some slots failed and were absorbed as absent
    Partial { failed: u32 },
    /// The sentinel pre-flight failed; no slot was attempted
    SentinelFailed,
    /// The wall-clock budget ran out before all slots were polled
    TimedOut,
}

/// Result of one batch poll
///
/// `values.len()` always equals the requested amount; failed slots are
/// `None` in their original position.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub values: Vec<Option<DecodedValue>>,
    pub status: PollStatus,
    pub polled_at: DateTime<Utc>,
}

impl PollOutcome {
    fn new(values: Vec<Option<DecodedValue>>, status: PollStatus) -> Self {
        Self {
            values,
            status,
            polled_at: Utc::now(),
        }
    }

    fn all_absent(amount: u32, status: PollStatus) -> Self {
        Self::new(vec![None; amount as usize], status)
    }

    /// True when no slot produced a value
    pub fn is_all_absent(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Number of slots that produced a value
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Polling engine bound to one device profile
///
/// Holds no transport: every operation borrows one, so the same executor
/// can serve any number of devices sharing a profile.
pub struct PollExecutor<'a> {
    profile: &'a DeviceProfile,
}

impl<'a> PollExecutor<'a> {
    /// Bind an executor to a profile.
    ///
    /// # Errors
    /// `InvalidProfile` when the profile fails validation.
    pub fn new(profile: &'a DeviceProfile) -> ToolboxResult<Self> {
        profile.validate()?;
        Ok(Self { profile })
    }

    pub fn profile(&self) -> &DeviceProfile {
        self.profile
    }

    // ------------------------------------------------------------------
    // Retry wrappers
    // ------------------------------------------------------------------

    /// Read registers, retrying per the profile's policy.
    ///
    /// # Errors
    /// `RetriesExhausted` once the attempt budget is spent.
    pub async fn read_with_retry<T: Transport>(
        &self,
        transport: &mut T,
        address: u32,
        count: u16,
    ) -> ToolboxResult<Vec<u16>> {
        let policy = &self.profile.retry;
        for attempt in 1..=policy.max_attempts {
            match transport.read_registers(address, count).await {
                Ok(words) => {
                    trace!(
                        "Read {} registers at {} (attempt {}/{})",
                        count,
                        address,
                        attempt,
                        policy.max_attempts
                    );
                    return Ok(words);
                }
                Err(e) => {
                    warn!(
                        "Read failed at address {} (attempt {}/{}): {}",
                        address, attempt, policy.max_attempts, e
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.backoff()).await;
                    }
                }
            }
        }
        Err(ToolboxError::RetriesExhausted {
            address,
            attempts: policy.max_attempts,
        })
    }

    /// Write registers, retrying per the profile's policy.
    pub async fn write_with_retry<T: Transport>(
        &self,
        transport: &mut T,
        address: u32,
        values: Vec<u16>,
    ) -> ToolboxResult<()> {
        let policy = &self.profile.retry;
        for attempt in 1..=policy.max_attempts {
            match transport.write_registers(address, values.clone()).await {
                Ok(()) => {
                    debug!("Wrote {} registers at {}", values.len(), address);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Write failed at address {} (attempt {}/{}): {}",
                        address, attempt, policy.max_attempts, e
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.backoff()).await;
                    }
                }
            }
        }
        Err(ToolboxError::RetriesExhausted {
            address,
            attempts: policy.max_attempts,
        })
    }

    /// Read coils, retrying per the profile's policy.
    pub async fn read_coils_with_retry<T: Transport>(
        &self,
        transport: &mut T,
        address: u32,
        count: u16,
    ) -> ToolboxResult<Vec<bool>> {
        let policy = &self.profile.retry;
        for attempt in 1..=policy.max_attempts {
            match transport.read_coils(address, count).await {
                Ok(bits) => return Ok(bits),
                Err(e) => {
                    warn!(
                        "Coil read failed at address {} (attempt {}/{}): {}",
                        address, attempt, policy.max_attempts, e
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.backoff()).await;
                    }
                }
            }
        }
        Err(ToolboxError::RetriesExhausted {
            address,
            attempts: policy.max_attempts,
        })
    }

    /// Write coils, retrying per the profile's policy.
    pub async fn write_coils_with_retry<T: Transport>(
        &self,
        transport: &mut T,
        address: u32,
        values: Vec<bool>,
    ) -> ToolboxResult<()> {
        let policy = &self.profile.retry;
        for attempt in 1..=policy.max_attempts {
            match transport.write_coils(address, values.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Coil write failed at address {} (attempt {}/{}): {}",
                        address, attempt, policy.max_attempts, e
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.backoff()).await;
                    }
                }
            }
        }
        Err(ToolboxError::RetriesExhausted {
            address,
            attempts: policy.max_attempts,
        })
    }

    // ------------------------------------------------------------------
    // Single-slot operations
    // ------------------------------------------------------------------

    /// Read and decode one logical slot.
    pub async fn read_value<T: Transport>(
        &self,
        transport: &mut T,
        index: u32,
    ) -> ToolboxResult<DecodedValue> {
        let address = self.profile.scheme.logical_to_raw(index)?;

        match self.profile.decode_kind {
            DecodeKind::Boolean => {
                let bits = self.read_coils_with_retry(transport, address, 1).await?;
                Ok(DecodedValue::Bool(decode_boolean(&bits, 0)?))
            }
            _ => {
                let words = self
                    .read_with_retry(transport, address, self.profile.words_per_value())
                    .await?;
                self.decode_words(&words)
            }
        }
    }

    /// Encode and write one logical slot.
    ///
    /// Boolean slots are written through [`write_flag`](Self::write_flag);
    /// calling this on a boolean profile is a decode error.
    pub async fn write_value<T: Transport>(
        &self,
        transport: &mut T,
        index: u32,
        value: f64,
    ) -> ToolboxResult<()> {
        let address = self.profile.scheme.logical_to_raw(index)?;

        let words = match self.profile.decode_kind {
            DecodeKind::Float32 => {
                encode_float32(value as f32, self.profile.byte_order, self.profile.word_order)
            }
            DecodeKind::FixedPoint => encode_fixed_point(value)?,
            DecodeKind::Boolean => {
                return Err(ToolboxError::decode(
                    "boolean slots are written as coils, not registers",
                ));
            }
        };

        self.write_with_retry(transport, address, words.to_vec()).await
    }

    /// Write a coil addressed by its discrete-input table number.
    ///
    /// Device manuals for these families list flag points as discrete
    /// inputs (10001+); the writable coil sits at the un-based address.
    pub async fn write_flag<T: Transport>(
        &self,
        transport: &mut T,
        discrete_address: u32,
        state: bool,
    ) -> ToolboxResult<()> {
        let coil = discrete_to_coil(discrete_address)?;
        debug!(
            "Writing flag: discrete {} -> coil {} = {}",
            discrete_address, coil, state
        );
        self.write_coils_with_retry(transport, coil, vec![state]).await
    }

    // ------------------------------------------------------------------
    // Batch polls
    // ------------------------------------------------------------------

    /// Poll slots `1..=amount` one read at a time.
    ///
    /// Per-slot failures are absorbed as absent values. When the profile
    /// requires a sentinel, a single un-retried read of the sentinel
    /// address gates the whole batch: if it fails, no slot is attempted
    /// and every value comes back absent. An optional `budget` caps the
    /// wall-clock time; slots not reached before it expires are absent
    /// and the status is [`PollStatus::TimedOut`].
    ///
    /// # Errors
    /// Only non-absorbable errors (e.g. `AddressOutOfRange`) propagate.
    pub async fn poll_sequence<T: Transport>(
        &self,
        transport: &mut T,
        amount: u32,
        budget: Option<Duration>,
    ) -> ToolboxResult<PollOutcome> {
        self.check_amount(amount)?;

        if let Some(sentinel) = self.sentinel_gate(transport).await {
            return Ok(PollOutcome::all_absent(amount, sentinel));
        }

        let started = tokio::time::Instant::now();
        let mut values = Vec::with_capacity(amount as usize);
        let mut failed = 0u32;
        let mut timed_out = false;

        for index in 1..=amount {
            if let Some(limit) = budget {
                if started.elapsed() >= limit {
                    warn!(
                        "Poll budget of {:?} exhausted at slot {}/{}",
                        limit, index, amount
                    );
                    timed_out = true;
                    break;
                }
            }

            match self.read_value(transport, index).await {
                Ok(value) => values.push(Some(value)),
                Err(e) if e.is_absorbable() => {
                    debug!("Slot {} absorbed failure: {}", index, e);
                    failed += 1;
                    values.push(None);
                }
                Err(e) => return Err(e),
            }
        }

        values.resize(amount as usize, None);
        let status = if timed_out {
            PollStatus::TimedOut
        } else if failed == 0 {
            PollStatus::Complete
        } else {
            PollStatus::Partial { failed }
        };
        Ok(PollOutcome::new(values, status))
    }

    /// Poll slots `1..=amount` with one contiguous block read.
    ///
    /// One read covers every slot; if it fails after retries the whole
    /// batch is absent. Individual slots that fail to decode are absent
    /// while the rest of the block survives.
    pub async fn poll_block<T: Transport>(
        &self,
        transport: &mut T,
        amount: u32,
    ) -> ToolboxResult<PollOutcome> {
        self.check_amount(amount)?;

        if let Some(sentinel) = self.sentinel_gate(transport).await {
            return Ok(PollOutcome::all_absent(amount, sentinel));
        }

        let words_per = self.profile.words_per_value();
        let (start, count) = self.profile.scheme.block_extent(amount, words_per)?;

        let block = match self.read_with_retry(transport, start, count).await {
            Ok(block) => block,
            Err(e) if e.is_absorbable() => {
                warn!("Block read at {} failed: {}", start, e);
                return Ok(PollOutcome::all_absent(
                    amount,
                    PollStatus::Partial { failed: amount },
                ));
            }
            Err(e) => return Err(e),
        };

        let mut values = Vec::with_capacity(amount as usize);
        let mut failed = 0u32;
        for index in 1..=amount {
            let offset = self.profile.scheme.slot_offset(index)?;
            let end = offset + words_per as usize;
            let slot = block.get(offset..end).unwrap_or(&[]);
            match self.decode_words(slot) {
                Ok(value) => values.push(Some(value)),
                Err(e) => {
                    debug!("Slot {} failed to decode from block: {}", index, e);
                    failed += 1;
                    values.push(None);
                }
            }
        }

        let status = if failed == 0 {
            PollStatus::Complete
        } else {
            PollStatus::Partial { failed }
        };
        Ok(PollOutcome::new(values, status))
    }

    /// Poll `amount` contiguous flag points as one coil read.
    pub async fn poll_flags<T: Transport>(
        &self,
        transport: &mut T,
        amount: u32,
    ) -> ToolboxResult<PollOutcome> {
        self.check_amount(amount)?;

        let start = self.profile.scheme.logical_to_raw(1)?;
        let bits = match self
            .read_coils_with_retry(transport, start, amount as u16)
            .await
        {
            Ok(bits) => bits,
            Err(e) if e.is_absorbable() => {
                warn!("Flag read at {} failed: {}", start, e);
                return Ok(PollOutcome::all_absent(
                    amount,
                    PollStatus::Partial { failed: amount },
                ));
            }
            Err(e) => return Err(e),
        };

        let mut values = Vec::with_capacity(amount as usize);
        let mut failed = 0u32;
        for index in 0..amount as usize {
            match decode_boolean(&bits, index) {
                Ok(bit) => values.push(Some(DecodedValue::Bool(bit))),
                Err(_) => {
                    failed += 1;
                    values.push(None);
                }
            }
        }

        let status = if failed == 0 {
            PollStatus::Complete
        } else {
            PollStatus::Partial { failed }
        };
        Ok(PollOutcome::new(values, status))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run the sentinel pre-flight if the profile requires one.
    ///
    /// Exactly one transport call, no retries. Returns the short-circuit
    /// status on failure.
    async fn sentinel_gate<T: Transport>(&self, transport: &mut T) -> Option<PollStatus> {
        if !self.profile.require_sentinel {
            return None;
        }
        // validate() guarantees the address is set
        let address = self.profile.sentinel_address?;

        match transport.read_registers(address, 1).await {
            Ok(_) => {
                trace!("Sentinel read at {} ok", address);
                None
            }
            Err(e) => {
                warn!("Sentinel read at {} failed, skipping batch: {}", address, e);
                Some(PollStatus::SentinelFailed)
            }
        }
    }

    fn check_amount(&self, amount: u32) -> ToolboxResult<()> {
        if amount == 0 {
            return Err(ToolboxError::AddressOutOfRange { index: 0 });
        }
        if let Some(limit) = self.profile.scheme.slot_count() {
            if amount as usize > limit {
                return Err(ToolboxError::AddressOutOfRange { index: amount });
            }
        }
        Ok(())
    }

    fn decode_words(&self, words: &[u16]) -> ToolboxResult<DecodedValue> {
        match self.profile.decode_kind {
            DecodeKind::Float32 => {
                let v = decode_float32(words, self.profile.byte_order, self.profile.word_order)?;
                Ok(DecodedValue::Float(f64::from(v)))
            }
            DecodeKind::FixedPoint => {
                decode_fixed_point(words, self.profile.missing_value_policy)
                    .map(DecodedValue::Float)
                    .ok_or_else(|| ToolboxError::decode("fixed-point registers missing"))
            }
            DecodeKind::Boolean => {
                let word = words
                    .first()
                    .ok_or_else(|| ToolboxError::decode("empty register response"))?;
                Ok(DecodedValue::Bool(*word != 0))
            }
        }
    }
}
