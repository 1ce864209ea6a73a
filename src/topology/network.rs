//! Node/channel subsets and the master index set

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LinkIndexer;
use crate::types::{Link, LinkOrder, Round, Rss};
use crate::{ListenError, Result};

/// Which part of the full network a session exposes.
///
/// `None` for nodes or channels means "all of them".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSelection {
    pub nodes: Option<Vec<u8>>,
    pub channels: Option<Vec<u8>>,
    pub order: LinkOrder,
}

impl NetworkSelection {
    pub fn all(order: LinkOrder) -> Self {
        Self { nodes: None, channels: None, order }
    }
}

/// The full network plus the user's view of it.
///
/// The master index set lists canonical link indices in the order consumers see them.
/// It is computed once and never changes.
#[derive(Debug, Clone)]
pub struct Network {
    indexer: LinkIndexer,
    nodes: Vec<u8>,
    channels: Vec<u8>,
    order: LinkOrder,
    master_indexes: Vec<usize>,
}

impl Network {
    /// Compute the master index set for `selection`.
    ///
    /// Chosen nodes and channels are taken in the order of the full lists, whatever
    /// order they were given in.
    ///
    /// # Errors
    ///
    /// - [`ListenError::UnknownNode`] / [`ListenError::UnknownChannel`] for ids outside
    ///   the full lists
    /// - [`ListenError::EmptySelection`] when no link survives the selection
    pub fn new(indexer: LinkIndexer, selection: &NetworkSelection) -> Result<Self> {
        let nodes = match &selection.nodes {
            Some(chosen) => {
                if let Some(&node) = chosen.iter().find(|n| !indexer.node_list().contains(n)) {
                    return Err(ListenError::UnknownNode { node });
                }
                indexer.node_list().iter().copied().filter(|n| chosen.contains(n)).collect()
            }
            None => indexer.node_list().to_vec(),
        };
        let channels = match &selection.channels {
            Some(chosen) => {
                if let Some(&channel) =
                    chosen.iter().find(|c| !indexer.channel_list().contains(c))
                {
                    return Err(ListenError::UnknownChannel { channel });
                }
                indexer.channel_list().iter().copied().filter(|c| chosen.contains(c)).collect()
            }
            None => indexer.channel_list().to_vec(),
        };

        let mut network =
            Self { indexer, nodes, channels, order: selection.order, master_indexes: Vec::new() };
        network.master_indexes = match selection.order {
            LinkOrder::Forward => network.forward_indexes(),
            LinkOrder::Backward => network.backward_indexes(),
            LinkOrder::ForwardBackward => {
                let mut indexes = network.forward_indexes();
                indexes.extend(network.backward_indexes());
                indexes
            }
            LinkOrder::All => network.filtered(|_| true),
        };

        if network.master_indexes.is_empty() {
            return Err(ListenError::empty_selection(format!(
                "{} node(s), {} channel(s), order '{}'",
                network.nodes.len(),
                network.channels.len(),
                network.order
            )));
        }

        debug!(
            links = network.master_indexes.len(),
            nodes = network.nodes.len(),
            channels = network.channels.len(),
            order = %network.order,
            "Master index set computed"
        );

        Ok(network)
    }

    /// Canonical indices of the selected links passing `keep`, in canonical order.
    fn filtered(&self, keep: impl Fn(&Link) -> bool) -> Vec<usize> {
        self.indexer
            .links()
            .enumerate()
            .filter(|(_, link)| {
                self.nodes.contains(&link.tx)
                    && self.nodes.contains(&link.rx)
                    && self.channels.contains(&link.channel)
                    && keep(link)
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn forward_indexes(&self) -> Vec<usize> {
        self.filtered(Link::is_forward)
    }

    /// Backward links grouped by channel, then receiver, then transmitter, so that
    /// entry k is the reverse of forward entry k.
    fn backward_indexes(&self) -> Vec<usize> {
        let mut indexes = Vec::new();
        for &channel in &self.channels {
            for &rx in &self.nodes {
                for &tx in self.nodes.iter().filter(|&&tx| tx > rx) {
                    if let Ok(index) = self.indexer.link_index(tx, rx, channel) {
                        indexes.push(index);
                    }
                }
            }
        }
        indexes
    }

    pub fn indexer(&self) -> &LinkIndexer {
        &self.indexer
    }

    /// Canonical indices exposed to consumers, in consumer order.
    pub fn master_indexes(&self) -> &[usize] {
        &self.master_indexes
    }

    /// The link at each master index position.
    pub fn master_links(&self) -> Vec<Link> {
        self.master_indexes
            .iter()
            .filter_map(|&index| self.indexer.triple_for_index(index).ok())
            .collect()
    }

    pub fn order(&self) -> LinkOrder {
        self.order
    }

    pub fn selected_nodes(&self) -> &[u8] {
        &self.nodes
    }

    pub fn selected_channels(&self) -> &[u8] {
        &self.channels
    }

    /// Links in the full network.
    pub fn num_links_all(&self) -> usize {
        self.indexer.num_links()
    }

    /// Links in the selection.
    pub fn num_links_subset(&self) -> usize {
        self.master_indexes.len()
    }

    /// Node pairs in the selection.
    pub fn num_link_lines_subset(&self) -> usize {
        self.nodes.len() * (self.nodes.len() - 1) / 2
    }

    /// Selected links per node pair.
    pub fn links_per_link_line_subset(&self) -> usize {
        self.order.links_per_link_line(self.channels.len())
    }

    /// Project a full round vector onto the master index set.
    ///
    /// # Errors
    ///
    /// [`ListenError::DimensionMismatch`] unless `values` has one entry per canonical link.
    pub fn select(&self, values: &[Rss]) -> Result<Vec<Rss>> {
        if values.len() != self.num_links_all() {
            return Err(ListenError::DimensionMismatch {
                context: "network selection",
                expected: self.num_links_all(),
                actual: values.len(),
            });
        }
        Ok(self.master_indexes.iter().map(|&index| values[index]).collect())
    }

    /// A copy of `round` holding only the selected links.
    pub fn select_round(&self, round: &Round) -> Result<Round> {
        Ok(Round { values: self.select(&round.values)?, ..round.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(nodes: Vec<u8>, channels: Vec<u8>, selection: NetworkSelection) -> Result<Network> {
        Network::new(LinkIndexer::new(nodes, channels)?, &selection)
    }

    #[test]
    fn forward_on_two_nodes_picks_one_link_per_channel() {
        let net = network(vec![1, 2], vec![1, 2], NetworkSelection::all(LinkOrder::Forward)).unwrap();
        assert_eq!(net.master_indexes(), &[0, 2]);
        assert_eq!(net.master_links(), vec![Link::new(1, 2, 1), Link::new(1, 2, 2)]);
    }

    #[test]
    fn backward_lines_up_with_forward() {
        let nodes = vec![1, 2, 3, 4];
        let channels = vec![11, 16, 21];
        let forward =
            network(nodes.clone(), channels.clone(), NetworkSelection::all(LinkOrder::Forward))
                .unwrap();
        let backward =
            network(nodes, channels, NetworkSelection::all(LinkOrder::Backward)).unwrap();

        assert_eq!(forward.num_links_subset(), backward.num_links_subset());
        for (f, b) in forward.master_links().iter().zip(backward.master_links()) {
            assert_eq!(f.reversed(), b);
        }
    }

    #[test]
    fn backward_is_not_canonical_order() {
        let net =
            network(vec![1, 2, 3], vec![11], NetworkSelection::all(LinkOrder::Backward)).unwrap();
        // Canonical order would be (2,1) (3,1) (3,2); grouping by receiver keeps (2,1),(3,1)
        // together and pairs them with forward (1,2),(1,3)
        assert_eq!(
            net.master_links(),
            vec![Link::new(2, 1, 11), Link::new(3, 1, 11), Link::new(3, 2, 11)]
        );

        let net = network(vec![1, 2, 3], vec![11, 16], NetworkSelection::all(LinkOrder::Backward))
            .unwrap();
        let indexer = net.indexer();
        assert_eq!(
            net.master_indexes(),
            &[
                indexer.link_index(2, 1, 11).unwrap(),
                indexer.link_index(3, 1, 11).unwrap(),
                indexer.link_index(3, 2, 11).unwrap(),
                indexer.link_index(2, 1, 16).unwrap(),
                indexer.link_index(3, 1, 16).unwrap(),
                indexer.link_index(3, 2, 16).unwrap(),
            ]
        );
    }

    #[test]
    fn forward_backward_doubles_forward() {
        let fb = network(vec![1, 2, 3], vec![11, 16], NetworkSelection::all(LinkOrder::ForwardBackward))
            .unwrap();
        let f = network(vec![1, 2, 3], vec![11, 16], NetworkSelection::all(LinkOrder::Forward))
            .unwrap();
        assert_eq!(fb.num_links_subset(), 2 * f.num_links_subset());
        assert_eq!(&fb.master_indexes()[..f.num_links_subset()], f.master_indexes());
        assert_eq!(fb.links_per_link_line_subset(), 4);
    }

    #[test]
    fn all_filters_by_subset_in_canonical_order() {
        let selection = NetworkSelection {
            nodes: Some(vec![3, 1]),
            channels: Some(vec![16]),
            order: LinkOrder::All,
        };
        let net = network(vec![1, 2, 3], vec![11, 16], selection).unwrap();
        assert_eq!(net.selected_nodes(), &[1, 3]);
        assert_eq!(net.master_links(), vec![Link::new(1, 3, 16), Link::new(3, 1, 16)]);
        assert_eq!(net.num_link_lines_subset(), 1);
        assert_eq!(net.num_links_all(), 12);
    }

    #[test]
    fn single_node_selection_is_empty() {
        let selection =
            NetworkSelection { nodes: Some(vec![2]), channels: None, order: LinkOrder::All };
        let err = network(vec![1, 2, 3], vec![11], selection).unwrap_err();
        assert!(matches!(err, ListenError::EmptySelection { .. }));
        assert!(err.is_fatal_at_startup());
    }

    #[test]
    fn unknown_subset_ids_are_rejected() {
        let selection =
            NetworkSelection { nodes: Some(vec![1, 9]), channels: None, order: LinkOrder::All };
        assert!(matches!(
            network(vec![1, 2], vec![11], selection),
            Err(ListenError::UnknownNode { node: 9 })
        ));

        let selection =
            NetworkSelection { nodes: None, channels: Some(vec![12]), order: LinkOrder::All };
        assert!(matches!(
            network(vec![1, 2], vec![11], selection),
            Err(ListenError::UnknownChannel { channel: 12 })
        ));
    }

    #[test]
    fn select_projects_rounds() {
        let net = network(vec![1, 2], vec![1, 2], NetworkSelection::all(LinkOrder::Backward)).unwrap();
        let values = vec![Rss::new(-10), Rss::new(-11), Rss::new(-12), Rss::new(-13)];
        assert_eq!(net.select(&values).unwrap(), vec![Rss::new(-11), Rss::new(-13)]);
        assert!(matches!(net.select(&values[..3]), Err(ListenError::DimensionMismatch { .. })));
    }
}
