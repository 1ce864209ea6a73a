//! Listen-node packet layout and validation

use serde::{Deserialize, Serialize};

use super::framer::SENTINEL;
use crate::types::Rss;
use crate::{ListenError, Result};

/// Offset of the receiver id.
pub const RECEIVER_OFFSET: usize = 2;

/// Offset of the first RSS sample (transmitter slot 0, node id 1).
pub const RSS_OFFSET: usize = 3;

/// Channel id position, counted back from the end of the framed packet.
pub const CHANNEL_OFFSET_FROM_END: usize = 4;

/// Bytes in a framed packet besides the RSS samples: two leading bytes, the
/// receiver id, the channel id, one trailing byte and the two sentinel bytes.
pub const OVERHEAD: usize = 7;

/// Packet geometry, fixed by the number of nodes the mesh firmware was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketLayout {
    pub max_nodes: usize,
}

impl PacketLayout {
    pub fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// Length of a framed packet, sentinel included.
    pub fn expected_len(&self) -> usize {
        self.max_nodes + OVERHEAD
    }
}

/// A framed candidate packet, as cut from the byte stream by the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the packet carries the closing sentinel.
    pub fn is_terminated(&self) -> bool {
        self.bytes.ends_with(&SENTINEL)
    }

    /// Receiver id byte, without any validation against a node list.
    pub fn receiver_id(&self) -> Option<u8> {
        self.bytes.get(RECEIVER_OFFSET).copied()
    }

    /// Channel id byte, without any validation against a channel list.
    pub fn channel_id(&self) -> Option<u8> {
        self.bytes.len().checked_sub(CHANNEL_OFFSET_FROM_END).map(|i| self.bytes[i])
    }

    /// Validate the packet against the session configuration.
    ///
    /// # Errors
    ///
    /// - [`ListenError::LengthMismatch`] when the framed length is not
    ///   `max_nodes + 7`
    /// - [`ListenError::UnknownReceiverOrChannel`] when the receiver or channel byte is
    ///   not configured
    ///
    /// Both are per-packet problems: drop the packet and keep framing.
    pub fn decode<'a>(
        &'a self,
        layout: &PacketLayout,
        node_list: &[u8],
        channel_list: &[u8],
    ) -> Result<DecodedPacket<'a>> {
        let expected = layout.expected_len();
        if self.bytes.len() != expected {
            return Err(ListenError::LengthMismatch { expected, actual: self.bytes.len() });
        }

        let receiver = self.bytes[RECEIVER_OFFSET];
        let channel = self.bytes[expected - CHANNEL_OFFSET_FROM_END];
        if !node_list.contains(&receiver) || !channel_list.contains(&channel) {
            return Err(ListenError::UnknownReceiverOrChannel { receiver, channel });
        }

        Ok(DecodedPacket {
            receiver,
            channel,
            samples: &self.bytes[RSS_OFFSET..RSS_OFFSET + layout.max_nodes],
        })
    }
}

/// A validated packet: who listened, on which channel, and what it heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPacket<'a> {
    pub receiver: u8,
    /// The channel the receiver was on when the packet was sent
    pub channel: u8,
    /// Raw RSS bytes, one per transmitter slot
    pub samples: &'a [u8],
}

impl DecodedPacket<'_> {
    /// Reading of transmitter `tx` (node ids start at 1), if it has a slot.
    pub fn sample_for(&self, tx: u8) -> Option<Rss> {
        let slot = usize::from(tx).checked_sub(1)?;
        self.samples.get(slot).map(|&byte| Rss::from_wire(byte))
    }

    /// Every transmitter slot as `(node id, reading)`.
    pub fn samples(&self) -> impl Iterator<Item = (u8, Rss)> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map_while(|(slot, &byte)| Some((u8::try_from(slot + 1).ok()?, Rss::from_wire(byte))))
    }
}
