//! Synthetic listen-node traffic for tests and benchmarks
//!
//! [`MeshSimulator`] plays a mesh of nodes that transmit in id order and hop through
//! the channel list together, and renders what a listen node would write to its
//! serial port. Every link gets a fixed, recognisable reading so tests can check that
//! each value lands on the right canonical index.

#![cfg(any(test, feature = "benchmark"))]

use crate::topology::LinkIndexer;
use crate::types::{Link, Rss};
use crate::wire::{CHANNEL_OFFSET_FROM_END, Packet, PacketLayout, RECEIVER_OFFSET, RSS_OFFSET, SENTINEL};

/// Build one framed packet: two header bytes, the receiver id, `samples` (padded with
/// the missing marker up to `max_nodes`), the channel id, a trailing byte and the
/// sentinel.
pub fn build_packet(layout: &PacketLayout, receiver: u8, channel: u8, samples: &[u8]) -> Packet {
    let mut bytes = vec![0u8; layout.expected_len()];
    bytes[0] = 0xAA;
    bytes[1] = 0x55;
    bytes[RECEIVER_OFFSET] = receiver;
    for slot in 0..layout.max_nodes {
        bytes[RSS_OFFSET + slot] = samples.get(slot).copied().unwrap_or(0x7F);
    }
    let len = bytes.len();
    bytes[len - CHANNEL_OFFSET_FROM_END] = channel;
    bytes[len - 2..].copy_from_slice(&SENTINEL);
    Packet::from_bytes(bytes)
}

/// A deterministic mesh of nodes as seen by one listen node.
#[derive(Debug, Clone)]
pub struct MeshSimulator {
    pub layout: PacketLayout,
    pub indexer: LinkIndexer,
    /// Links that are never heard
    pub silent: Vec<(u8, u8)>,
}

impl MeshSimulator {
    /// Nodes `1..=num_nodes` on the given channels, firmware built for exactly that many.
    pub fn new(num_nodes: u8, channels: Vec<u8>) -> Self {
        let nodes: Vec<u8> = (1..=num_nodes).collect();
        let indexer = match LinkIndexer::new(nodes, channels) {
            Ok(indexer) => indexer,
            Err(e) => panic!("invalid simulated mesh: {e}"),
        };
        Self { layout: PacketLayout::new(usize::from(num_nodes)), indexer, silent: Vec::new() }
    }

    /// Never hear `tx` at `rx` on any channel.
    pub fn with_silent_link(mut self, tx: u8, rx: u8) -> Self {
        self.silent.push((tx, rx));
        self
    }

    /// The reading every round carries for `link`.
    pub fn expected_rss(&self, link: Link) -> Rss {
        if self.silent.contains(&(link.tx, link.rx)) {
            return Rss::MISSING;
        }
        let ch_ord = self.indexer.channel_ordinal(link.channel).unwrap_or_default() as i8;
        Rss::new(-(20 + 3 * link.tx as i8 + link.rx as i8 + 5 * ch_ord))
    }

    /// Expected values of a full round, in canonical order.
    pub fn expected_round(&self) -> Vec<Rss> {
        self.indexer.links().map(|link| self.expected_rss(link)).collect()
    }

    /// The packet receiver `rx` sends while the mesh is on `channel`.
    pub fn packet(&self, rx: u8, channel: u8) -> Packet {
        let samples: Vec<u8> = (1..=self.layout.max_nodes as u8)
            .map(|tx| {
                if tx == rx {
                    return Rss::MISSING.to_wire();
                }
                self.indexer
                    .transmit_channel(tx, rx, channel)
                    .map_or(Rss::MISSING, |ch| self.expected_rss(Link::new(tx, rx, ch)))
                    .to_wire()
            })
            .collect();
        build_packet(&self.layout, rx, channel, &samples)
    }

    /// Every packet of `cycles` full trips through the channel list.
    pub fn packets(&self, cycles: usize) -> Vec<Packet> {
        let mut packets = Vec::new();
        for _ in 0..cycles {
            for &channel in self.indexer.channel_list() {
                for &rx in self.indexer.node_list() {
                    packets.push(self.packet(rx, channel));
                }
            }
        }
        packets
    }

    /// The serial byte stream for `cycles` cycles.
    pub fn stream(&self, cycles: usize) -> Vec<u8> {
        self.packets(cycles).iter().flat_map(|p| p.as_bytes().to_vec()).collect()
    }
}
