//! # Modbus Toolbox
//!
//! Register decoding and resilient polling for Modbus TCP field devices.
//!
//! Industrial endpoints that speak the same protocol still disagree on
//! everything above it: byte and word order of 32-bit values, fixed-point
//! encodings, 1-based register numbering, hard-coded channel blocks, and
//! how gracefully they fail. This crate captures those per-family quirks
//! as data ([`DeviceProfile`]) and runs batch polls that survive flaky
//! links instead of aborting on the first bad slot.
//!
//! ## Features
//!
//! - **Register codec**: IEEE-754 floats in all four byte/word order
//!   combinations, two-register fixed-point decimals, bit extraction
//! - **Address mapping**: linear stride and fixed-offset schemes, plus the
//!   classic discrete-input to coil translation
//! - **Resilient polling**: bounded retries with fixed backoff, sentinel
//!   pre-flight gating, partial-failure absorption, wall-clock budgets
//! - **Device profiles**: known family presets, YAML/JSON profile sets
//! - **Session sharing**: per-device transport registry for concurrent
//!   polling without interleaved requests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modbus_toolbox::{DeviceProfile, PollExecutor, Transport};
//!
//! async fn poll_station(transport: &mut impl Transport) -> modbus_toolbox::ToolboxResult<()> {
//!     let profile = DeviceProfile::accutech();
//!     let executor = PollExecutor::new(&profile)?;
//!
//!     let outcome = executor.poll_sequence(transport, 30, None).await?;
//!     for (slot, value) in outcome.values.iter().enumerate() {
//!         match value {
//!             Some(v) => println!("slot {}: {:?}", slot + 1, v),
//!             None => println!("slot {}: absent", slot + 1),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod codec;
pub mod error;
pub mod poll;
pub mod profile;
pub mod registry;
pub mod transport;

// Re-export main types for convenience
pub use address::{discrete_to_coil, AddressScheme, DISCRETE_INPUT_BASE};
pub use codec::{
    decode_boolean, decode_fixed_point, decode_float32, encode_fixed_point, encode_float32,
    extract_bit, ByteOrder, MissingValuePolicy, WordOrder,
};
pub use error::{ToolboxError, ToolboxResult, TransportError};
pub use poll::{DecodedValue, PollExecutor, PollOutcome, PollStatus};
pub use profile::{
    DecodeKind, DeviceProfile, ProfileSet, RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS,
};
pub use registry::{DeviceId, DeviceRegistry};
pub use transport::Transport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Modbus TCP port
pub const DEFAULT_TCP_PORT: u16 = 502;
