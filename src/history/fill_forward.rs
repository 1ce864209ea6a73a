//! Last-heard view of the selected links

use crate::topology::Network;
use crate::types::{Round, Rss};
use crate::{ListenError, Result};

/// Carries every link's most recent reading forward across rounds.
///
/// Hands out values for the network's master index set, fed either full rounds
/// ([`new`](Self::new)) or rounds already projected onto the selection
/// ([`over_selection`](Self::over_selection)). Once every selected link has been heard
/// at least once the view is [`complete`](Self::complete), and stays so.
#[derive(Debug, Clone)]
pub struct FillForward {
    master_indexes: Vec<usize>,
    last_heard: Vec<Rss>,
    complete: bool,
}

impl FillForward {
    /// A view fed full rounds, one value per canonical link.
    pub fn new(network: &Network) -> Self {
        Self {
            master_indexes: network.master_indexes().to_vec(),
            last_heard: vec![Rss::MISSING; network.num_links_all()],
            complete: false,
        }
    }

    /// A view fed selected rounds, as published by a connection.
    pub fn over_selection(network: &Network) -> Self {
        let width = network.num_links_subset();
        Self {
            master_indexes: (0..width).collect(),
            last_heard: vec![Rss::MISSING; width],
            complete: false,
        }
    }

    /// Fold in one round and return the carried-forward selection.
    ///
    /// # Errors
    ///
    /// [`ListenError::DimensionMismatch`] when `values` is not as wide as the view's input.
    pub fn observe(&mut self, values: &[Rss]) -> Result<Vec<Rss>> {
        if values.len() != self.last_heard.len() {
            return Err(ListenError::DimensionMismatch {
                context: "fill-forward round",
                expected: self.last_heard.len(),
                actual: values.len(),
            });
        }

        for (slot, &value) in self.last_heard.iter_mut().zip(values) {
            if value.is_present() {
                *slot = value;
            }
        }
        if !self.complete {
            self.complete = self.master_indexes.iter().all(|&i| self.last_heard[i].is_present());
        }

        Ok(self.current())
    }

    /// [`observe`](Self::observe) for a [`Round`].
    pub fn observe_round(&mut self, round: &Round) -> Result<Vec<Rss>> {
        self.observe(&round.values)
    }

    /// The carried-forward selection without observing anything new.
    pub fn current(&self) -> Vec<Rss> {
        self.master_indexes.iter().map(|&i| self.last_heard[i]).collect()
    }

    /// Whether every selected link has been heard at least once.
    pub fn complete(&self) -> bool {
        self.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LinkIndexer, NetworkSelection};
    use crate::types::{LinkOrder, LoggedRound};

    fn forward_network() -> Network {
        let indexer = LinkIndexer::new(vec![1, 2], vec![1, 2]).unwrap();
        Network::new(indexer, &NetworkSelection::all(LinkOrder::Forward)).unwrap()
    }

    #[test]
    fn carries_values_and_latches_when_all_heard() {
        let mut view = FillForward::new(&forward_network());

        let out = view.observe(&[Rss::new(-40), Rss::new(-41), Rss::MISSING, Rss::MISSING]).unwrap();
        assert_eq!(out, vec![Rss::new(-40), Rss::MISSING]);
        assert!(!view.complete());

        let out = view.observe(&[Rss::MISSING, Rss::MISSING, Rss::new(-60), Rss::MISSING]).unwrap();
        assert_eq!(out, vec![Rss::new(-40), Rss::new(-60)]);
        assert!(view.complete());

        let out = view.observe(&[Rss::new(-45); 4]).unwrap();
        assert_eq!(out, vec![Rss::new(-45), Rss::new(-45)]);
        assert!(view.complete());
    }

    #[test]
    fn replays_logged_lines() {
        let mut view = FillForward::new(&forward_network());
        for line in ["-40 127 127 127 100", "127 127 -62.0 127 200"] {
            let logged = LoggedRound::parse_line(line).unwrap();
            view.observe(&logged.values).unwrap();
        }
        assert_eq!(view.current(), vec![Rss::new(-40), Rss::new(-62)]);
    }

    #[test]
    fn selected_rounds_carry_forward_too() {
        let mut view = FillForward::over_selection(&forward_network());
        view.observe(&[Rss::MISSING, Rss::new(-60)]).unwrap();
        assert!(!view.complete());
        assert_eq!(view.observe(&[Rss::new(-40), Rss::MISSING]).unwrap(), vec![Rss::new(-40), Rss::new(-60)]);
        assert!(view.complete());
    }

    #[test]
    fn short_round_is_rejected() {
        let mut view = FillForward::new(&forward_network());
        assert!(matches!(
            view.observe(&[Rss::new(-40)]),
            Err(ListenError::DimensionMismatch { expected: 4, actual: 1, .. })
        ));
    }
}
