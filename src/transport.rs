//! Transport abstraction
//!
//! The toolkit is a client-side decoding/polling engine; the wire protocol
//! itself (sockets, MBAP framing, transaction ids) is owned by whatever
//! Modbus TCP library the host environment chooses. Implementations wrap
//! that library behind this trait.
//!
//! Concurrency contract: at most one in-flight operation per `Transport`
//! instance, enforced by the caller (e.g. a `tokio::sync::Mutex` per device,
//! as [`DeviceRegistry`](crate::registry::DeviceRegistry) hands out).
//! Independent devices may be polled concurrently through independent
//! instances.

use async_trait::async_trait;

use crate::error::TransportError;

/// Client-side register/coil access against one device session
#[async_trait]
pub trait Transport: Send {
    /// Read `count` holding registers starting at `address`.
    async fn read_registers(&mut self, address: u32, count: u16)
        -> Result<Vec<u16>, TransportError>;

    /// Write a block of registers starting at `address`.
    async fn write_registers(
        &mut self,
        address: u32,
        values: Vec<u16>,
    ) -> Result<(), TransportError>;

    /// Read `count` coils starting at `address`.
    async fn read_coils(&mut self, address: u32, count: u16) -> Result<Vec<bool>, TransportError>;

    /// Write a block of coils starting at `address`.
    async fn write_coils(&mut self, address: u32, values: Vec<bool>)
        -> Result<(), TransportError>;
}
