//! Listen-node wire format.
//!
//! The listen node writes one packet per overheard transmission:
//!
//! ```text
//! offset  0      1      2      3 .. 3+N          len-4    len-3   len-2  len-1
//!         [hdr]  [hdr]  [rx]   [rss slot 0..N)   [chan]   [..]    0xEF   0xBE
//! ```
//!
//! `N` is the firmware's `max_nodes`, so a framed packet is `N + 7` bytes. RSS slot `k`
//! holds the reading of node id `k + 1` as heard by `rx`, as a signed byte; 127 marks a
//! node that was not heard.
//!
//! [`Framer`] cuts the stream on the sentinel and [`Packet::decode`] validates what it
//! cuts against a [`PacketLayout`] and the configured node and channel lists.

mod framer;
mod packet;

pub use framer::{DEFAULT_WINDOW, Framer, SENTINEL, SENTINEL_WORD};
pub use packet::{
    CHANNEL_OFFSET_FROM_END, DecodedPacket, OVERHEAD, Packet, PacketLayout, RECEIVER_OFFSET,
    RSS_OFFSET,
};
