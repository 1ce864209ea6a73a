//! Byte-stream framing on the 0xBEEF packet sentinel

use tracing::debug;

use super::Packet;

/// Little-endian 16-bit marker closing every packet.
pub const SENTINEL_WORD: u16 = 0xBEEF;

/// The marker as it appears on the wire: low byte first.
pub const SENTINEL: [u8; 2] = SENTINEL_WORD.to_le_bytes();

/// Default accumulation window. Far larger than any packet a 255-node mesh can send.
pub const DEFAULT_WINDOW: usize = 1024;

/// Splits a raw byte stream into candidate packets.
///
/// Bytes are accumulated until the last two equal [`SENTINEL`]; everything since the
/// previous sentinel (sentinel included) is then handed out as a [`Packet`]. Length and
/// content are not checked here, that is the decoder's job.
///
/// ```rust
/// use meshrss::wire::Framer;
///
/// let mut framer = Framer::new();
/// assert!(framer.feed(0x01).is_none());
/// assert!(framer.feed(0xEF).is_none());
/// let packet = framer.feed(0xBE).expect("sentinel closes the packet");
/// assert_eq!(packet.as_bytes(), &[0x01, 0xEF, 0xBE]);
/// ```
#[derive(Debug, Clone)]
pub struct Framer {
    buffer: Vec<u8>,
    window: usize,
    overflows: u64,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create a framer that drops its accumulated bytes once more than `window` arrive
    /// without a sentinel. The window never goes below the sentinel length.
    pub fn with_window(window: usize) -> Self {
        let window = window.max(SENTINEL.len());
        Self { buffer: Vec::with_capacity(window.min(DEFAULT_WINDOW)), window, overflows: 0 }
    }

    /// Append one byte, returning a candidate packet when it completes a sentinel.
    pub fn feed(&mut self, byte: u8) -> Option<Packet> {
        self.buffer.push(byte);

        if self.buffer.ends_with(&SENTINEL) {
            let bytes = std::mem::take(&mut self.buffer);
            return Some(Packet::from_bytes(bytes));
        }

        if self.buffer.len() > self.window {
            // Keep the newest byte, it may be the first half of a sentinel
            self.overflows += 1;
            debug!(
                window = self.window,
                overflows = self.overflows,
                "No sentinel within framing window, dropping accumulated bytes"
            );
            self.buffer.clear();
            self.buffer.push(byte);
        }

        None
    }

    /// Frame a whole chunk, returning every packet it completes in arrival order.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Vec<Packet> {
        bytes.iter().filter_map(|&byte| self.feed(byte)).collect()
    }

    /// Bytes received since the last sentinel.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// How many times the window filled up without a sentinel.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Drop any partially accumulated packet.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
