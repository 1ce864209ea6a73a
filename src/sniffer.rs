//! Mesh discovery without a configuration.
//!
//! Listening for a few seconds is enough to see every node transmit on every channel.
//! The sniffer records which receiver and channel ids appear, grouped by packet
//! length so that a packet spoiled by line noise cannot add ids of its own.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::config::ListenConfig;
use crate::provider::Provider;
use crate::wire::{OVERHEAD, Packet};
use crate::{ListenError, Result};

/// What the sniffer saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Node slots per packet, from the packet length
    pub max_nodes: usize,
    /// Receiver ids seen, ascending
    pub nodes: Vec<u8>,
    /// Channel ids seen, ascending (hop order is not observable)
    pub channels: Vec<u8>,
    /// Packets the result is based on
    pub packets: u64,
}

impl Discovery {
    /// A starting configuration for the discovered mesh.
    ///
    /// Channels are listed in ascending order; fix the order by hand if the mesh
    /// hops differently.
    pub fn to_config(&self) -> Result<ListenConfig> {
        let config = ListenConfig::new(self.nodes.clone(), self.channels.clone(), self.max_nodes);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default)]
struct LengthGroup {
    packets: u64,
    nodes: BTreeSet<u8>,
    channels: BTreeSet<u8>,
}

/// Accumulates ids from framed packets.
#[derive(Debug, Default)]
pub struct Sniffer {
    groups: BTreeMap<usize, LengthGroup>,
}

impl Sniffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, packet: &Packet) {
        if packet.len() <= OVERHEAD {
            return;
        }
        let (Some(node), Some(channel)) = (packet.receiver_id(), packet.channel_id()) else {
            return;
        };
        let group = self.groups.entry(packet.len()).or_default();
        group.packets += 1;
        group.nodes.insert(node);
        group.channels.insert(channel);
    }

    /// Packets observed so far, of any length.
    pub fn packets(&self) -> u64 {
        self.groups.values().map(|g| g.packets).sum()
    }

    /// Summarise the most common packet length.
    ///
    /// `None` when nothing usable was observed.
    pub fn finish(&self) -> Option<Discovery> {
        let (&len, group) = self.groups.iter().max_by_key(|(_, group)| group.packets)?;
        Some(Discovery {
            max_nodes: len - OVERHEAD,
            nodes: group.nodes.iter().copied().collect(),
            channels: group.channels.iter().copied().collect(),
            packets: group.packets,
        })
    }
}

/// Listen to `provider` for `duration` (or until it ends) and report what was seen.
///
/// # Errors
///
/// Source errors from the provider, and [`ListenError::Config`] when no usable packet
/// arrived.
pub async fn sniff<P: Provider>(provider: &mut P, duration: Duration) -> Result<Discovery> {
    let deadline = Instant::now() + duration;
    let mut sniffer = Sniffer::new();
    info!(?duration, "Sniffing for nodes and channels");

    loop {
        match timeout_at(deadline, provider.next_packet()).await {
            Ok(Ok(Some(packet))) => sniffer.observe(&packet),
            Ok(Ok(None)) => {
                debug!("Byte source ended while sniffing");
                break;
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }

    let discovery = sniffer.finish().ok_or_else(|| {
        ListenError::config(format!("no listen-node packets seen in {:?}", duration))
    })?;
    info!(
        max_nodes = discovery.max_nodes,
        nodes = ?discovery.nodes,
        channels = ?discovery.channels,
        packets = discovery.packets,
        "Sniffing finished"
    );
    Ok(discovery)
}
