//! Round accumulation.
//!
//! Every listen node reports once per sweep, so a link that reports a second time
//! means a new round has begun. [`RoundAccumulator`] keeps one slot per canonical link
//! and closes the open round on that collision. The optional [`FlushPolicy`] adds two
//! fallbacks for streams where collisions arrive late or not at all.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, trace};

use crate::types::{FlushReason, Round, Rss};

/// Fallback round boundaries on top of collision detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Close the round as soon as this many links have reported
    pub expected_count: Option<usize>,
    /// Close the round once this long has passed since its first sample
    pub max_round_age: Option<Duration>,
}

impl FlushPolicy {
    /// Collision detection only.
    pub fn collision_only() -> Self {
        Self::default()
    }

    pub fn with_expected_count(mut self, count: usize) -> Self {
        self.expected_count = Some(count);
        self
    }

    pub fn with_max_round_age(mut self, age: Duration) -> Self {
        self.max_round_age = Some(age);
        self
    }
}

/// Collects resolved samples into rounds.
#[derive(Debug)]
pub struct RoundAccumulator {
    slots: Vec<Rss>,
    filled: usize,
    policy: FlushPolicy,
    sequence: u64,
    started: Instant,
    started_wall: SystemTime,
    opened_at: Option<Instant>,
}

impl RoundAccumulator {
    /// An accumulator over `num_links` canonical slots, all missing.
    pub fn new(num_links: usize, policy: FlushPolicy) -> Self {
        Self::starting_at(num_links, policy, Instant::now())
    }

    /// Like [`new`](Self::new) with an explicit start instant.
    pub fn starting_at(num_links: usize, policy: FlushPolicy, started: Instant) -> Self {
        Self {
            slots: vec![Rss::MISSING; num_links],
            filled: 0,
            policy,
            sequence: 0,
            started,
            started_wall: SystemTime::now(),
            opened_at: None,
        }
    }

    pub fn num_links(&self) -> usize {
        self.slots.len()
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Slots filled in the open round.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Sequence number the next emitted round will carry.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// The open round's values, without closing it.
    pub fn pending(&self) -> &[Rss] {
        &self.slots
    }

    /// Store one resolved sample, returning the round it closes, if any.
    ///
    /// `index` must be a canonical link index below [`num_links`](Self::num_links);
    /// an out-of-range index is ignored.
    pub fn push(&mut self, index: usize, rss: Rss) -> Option<Round> {
        self.push_at(index, rss, Instant::now())
    }

    /// [`push`](Self::push) with an explicit arrival time.
    ///
    /// A single sample closes at most one round: a deadline or collision flush leaves
    /// one filled slot at most, which cannot reach an `expected_count` the open round
    /// had not already reached.
    pub fn push_at(&mut self, index: usize, rss: Rss, now: Instant) -> Option<Round> {
        if index >= self.slots.len() {
            debug!(index, num_links = self.slots.len(), "Ignoring sample for unknown link");
            return None;
        }

        let mut flushed = self.expire_at(now);
        if self.slots[index].is_present() {
            flushed = self.emit(FlushReason::Collision, now);
        }

        trace!(index, rss = %rss, "Sample stored");
        if rss.is_present() {
            self.filled += 1;
            self.opened_at.get_or_insert(now);
        }
        self.slots[index] = rss;

        if self.policy.expected_count.is_some_and(|count| self.filled >= count) {
            flushed = flushed.or_else(|| self.emit(FlushReason::Complete, now));
        }

        flushed
    }

    /// Close the open round if it has outlived `max_round_age`.
    pub fn expire_at(&mut self, now: Instant) -> Option<Round> {
        let max_age = self.policy.max_round_age?;
        let opened = self.opened_at?;
        if now.saturating_duration_since(opened) >= max_age {
            self.emit(FlushReason::Deadline, now)
        } else {
            None
        }
    }

    /// When the open round will pass its age limit, if it can.
    pub fn deadline(&self) -> Option<Instant> {
        Some(self.opened_at? + self.policy.max_round_age?)
    }

    /// Close whatever is open at end of stream.
    pub fn finish(&mut self) -> Option<Round> {
        self.finish_at(Instant::now())
    }

    pub fn finish_at(&mut self, now: Instant) -> Option<Round> {
        self.emit(FlushReason::EndOfStream, now)
    }

    /// Emit the open round and reset every slot. Empty rounds are not emitted.
    fn emit(&mut self, reason: FlushReason, now: Instant) -> Option<Round> {
        if self.filled == 0 {
            return None;
        }

        let width = self.slots.len();
        let values = std::mem::replace(&mut self.slots, vec![Rss::MISSING; width]);
        let elapsed = now.saturating_duration_since(self.started);
        let round = Round {
            values,
            sequence: self.sequence,
            elapsed,
            captured_at: self.started_wall + elapsed,
            reason,
        };

        debug!(
            sequence = round.sequence,
            reason = ?reason,
            present = self.filled,
            "Round closed"
        );

        self.sequence += 1;
        self.filled = 0;
        self.opened_at = None;
        Some(round)
    }
}
