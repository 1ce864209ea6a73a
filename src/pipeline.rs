//! Packet-to-round processing, independent of any runtime

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::ListenConfig;
use crate::round::{FlushPolicy, RoundAccumulator};
use crate::topology::Network;
use crate::types::{FlushReason, Round};
use crate::wire::{Packet, PacketLayout};
use crate::{ListenError, Result};

/// Running counters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Framed candidates seen
    pub packets: u64,
    /// Candidates that passed validation
    pub decoded: u64,
    pub length_mismatches: u64,
    pub unknown_receiver_or_channel: u64,
    /// Times the framer dropped its window without finding a sentinel
    pub framer_overflows: u64,
    pub rounds_collision: u64,
    pub rounds_complete: u64,
    pub rounds_deadline: u64,
    pub rounds_end_of_stream: u64,
}

impl IngestStats {
    /// Candidates dropped by validation.
    pub fn discarded(&self) -> u64 {
        self.length_mismatches + self.unknown_receiver_or_channel
    }

    pub fn rounds(&self) -> u64 {
        self.rounds_collision + self.rounds_complete + self.rounds_deadline + self.rounds_end_of_stream
    }

    fn record_round(&mut self, reason: FlushReason) {
        match reason {
            FlushReason::Collision => self.rounds_collision += 1,
            FlushReason::Complete => self.rounds_complete += 1,
            FlushReason::Deadline => self.rounds_deadline += 1,
            FlushReason::EndOfStream => self.rounds_end_of_stream += 1,
        }
    }
}

/// Decode, resolve, accumulate and select.
///
/// Rounds come out projected onto the network's master index set. A packet that fails
/// validation is counted and otherwise has no effect.
#[derive(Debug)]
pub struct Pipeline {
    layout: PacketLayout,
    network: Arc<Network>,
    accumulator: RoundAccumulator,
    stats: IngestStats,
}

impl Pipeline {
    pub fn new(layout: PacketLayout, network: Arc<Network>, policy: FlushPolicy) -> Self {
        let accumulator = RoundAccumulator::new(network.num_links_all(), policy);
        Self { layout, network, accumulator, stats: IngestStats::default() }
    }

    /// A pipeline for a validated configuration.
    pub fn from_config(config: &ListenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.layout(), Arc::new(config.network()?), config.flush_policy()))
    }

    /// Restart the accumulator clock at `started`.
    pub fn starting_at(mut self, started: Instant) -> Self {
        self.accumulator =
            RoundAccumulator::starting_at(self.network.num_links_all(), self.accumulator.policy(), started);
        self
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn layout(&self) -> PacketLayout {
        self.layout
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn set_framer_overflows(&mut self, overflows: u64) {
        self.stats.framer_overflows = overflows;
    }

    /// Feed one framed candidate, returning the rounds it closes.
    pub fn ingest(&mut self, packet: &Packet) -> Vec<Round> {
        self.ingest_at(packet, Instant::now())
    }

    pub fn ingest_at(&mut self, packet: &Packet, now: Instant) -> Vec<Round> {
        self.stats.packets += 1;

        let network = Arc::clone(&self.network);
        let indexer = network.indexer();
        let decoded = match packet.decode(&self.layout, indexer.node_list(), indexer.channel_list()) {
            Ok(decoded) => decoded,
            Err(e) => {
                match e {
                    ListenError::LengthMismatch { .. } => self.stats.length_mismatches += 1,
                    ListenError::UnknownReceiverOrChannel { .. } => {
                        self.stats.unknown_receiver_or_channel += 1
                    }
                    _ => {}
                }
                debug!(error = %e, "Discarding packet");
                return Vec::new();
            }
        };

        self.stats.decoded += 1;
        trace!(receiver = decoded.receiver, channel = decoded.channel, "Packet decoded");

        let mut closed = Vec::new();
        for (index, rss) in indexer.resolve(&decoded) {
            if let Some(round) = self.accumulator.push_at(index, rss, now) {
                closed.extend(self.select(round));
            }
        }
        closed
    }

    /// When the open round would pass its age limit, if a limit is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.accumulator.deadline()
    }

    /// Close the open round if it has outlived its age limit.
    pub fn expire_at(&mut self, now: Instant) -> Option<Round> {
        let round = self.accumulator.expire_at(now)?;
        self.select(round)
    }

    /// Close the open round at end of stream.
    pub fn finish(&mut self) -> Option<Round> {
        self.finish_at(Instant::now())
    }

    pub fn finish_at(&mut self, now: Instant) -> Option<Round> {
        let round = self.accumulator.finish_at(now)?;
        self.select(round)
    }

    fn select(&mut self, round: Round) -> Option<Round> {
        self.stats.record_round(round.reason);
        match self.network.select_round(&round) {
            Ok(selected) => Some(selected),
            Err(e) => {
                warn!(error = %e, sequence = round.sequence, "Dropping round");
                None
            }
        }
    }
}
