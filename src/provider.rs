//! Provider trait for packet sources

use crate::Result;
use crate::wire::Packet;

/// A source of framed listen-node packets.
///
/// Providers own the byte source and the framer; everything downstream only sees
/// sentinel-terminated candidates, which may still fail validation.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next framed packet
    ///
    /// Returns:
    /// - `Ok(Some(packet))` - A sentinel-terminated candidate
    /// - `Ok(None)` - The byte source ended
    /// - `Err(e)` - Reading the source failed
    async fn next_packet(&mut self) -> Result<Option<Packet>>;

    /// Times the framer dropped its accumulated bytes because no sentinel arrived.
    fn framer_overflows(&self) -> u64 {
        0
    }
}
