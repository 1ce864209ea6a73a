//! Canonical link numbering and channel skew correction

use crate::types::{Link, Rss};
use crate::wire::DecodedPacket;
use crate::{ListenError, Result};

/// Dense numbering of every (tx, rx, channel) link in a node/channel configuration.
///
/// Channel is the outermost key, then transmitter, then receiver; self-links are
/// skipped, so each transmitter owns a block of `nodes - 1` indices per channel.
///
/// ```rust
/// use meshrss::topology::LinkIndexer;
///
/// let indexer = LinkIndexer::new(vec![1, 2], vec![1, 2]).unwrap();
/// assert_eq!(indexer.num_links(), 4);
/// assert_eq!(indexer.link_index(1, 2, 1).unwrap(), 0);
/// assert_eq!(indexer.link_index(2, 1, 2).unwrap(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIndexer {
    node_list: Vec<u8>,
    channel_list: Vec<u8>,
}

impl LinkIndexer {
    /// Build an indexer over ordered node and channel lists.
    ///
    /// # Errors
    ///
    /// [`ListenError::Config`] when either list is empty or repeats an id.
    pub fn new(node_list: Vec<u8>, channel_list: Vec<u8>) -> Result<Self> {
        check_list("node_list", &node_list)?;
        check_list("channel_list", &channel_list)?;
        Ok(Self { node_list, channel_list })
    }

    pub fn node_list(&self) -> &[u8] {
        &self.node_list
    }

    pub fn channel_list(&self) -> &[u8] {
        &self.channel_list
    }

    pub fn num_nodes(&self) -> usize {
        self.node_list.len()
    }

    pub fn num_channels(&self) -> usize {
        self.channel_list.len()
    }

    /// Links measured on one channel: `nodes * (nodes - 1)`.
    pub fn links_per_channel(&self) -> usize {
        self.num_nodes() * (self.num_nodes() - 1)
    }

    /// Size of the canonical index space.
    pub fn num_links(&self) -> usize {
        self.links_per_channel() * self.num_channels()
    }

    pub fn node_ordinal(&self, node: u8) -> Option<usize> {
        self.node_list.iter().position(|&n| n == node)
    }

    pub fn channel_ordinal(&self, channel: u8) -> Option<usize> {
        self.channel_list.iter().position(|&c| c == channel)
    }

    /// Canonical index of `(tx, rx, ch)`.
    ///
    /// # Errors
    ///
    /// [`ListenError::InvalidTriple`] when an id is not configured or `tx == rx`.
    pub fn link_index(&self, tx: u8, rx: u8, channel: u8) -> Result<usize> {
        let invalid = || ListenError::InvalidTriple { tx, rx, channel };
        if tx == rx {
            return Err(invalid());
        }
        let tx_ord = self.node_ordinal(tx).ok_or_else(invalid)?;
        let rx_ord = self.node_ordinal(rx).ok_or_else(invalid)?;
        let ch_ord = self.channel_ordinal(channel).ok_or_else(invalid)?;

        let mut index = ch_ord * self.links_per_channel() + tx_ord * (self.num_nodes() - 1) + rx_ord;
        // The self-link slot inside the transmitter's block is skipped
        if rx_ord > tx_ord {
            index -= 1;
        }
        Ok(index)
    }

    pub fn index_of(&self, link: Link) -> Result<usize> {
        self.link_index(link.tx, link.rx, link.channel)
    }

    /// Inverse of [`link_index`](Self::link_index).
    ///
    /// # Errors
    ///
    /// [`ListenError::IndexOutOfRange`] when `index >= num_links()`.
    pub fn triple_for_index(&self, index: usize) -> Result<Link> {
        let num_links = self.num_links();
        if index >= num_links {
            return Err(ListenError::IndexOutOfRange { index, num_links });
        }

        let block = self.num_nodes() - 1;
        let ch_ord = index / self.links_per_channel();
        let rem = index % self.links_per_channel();
        let tx_ord = rem / block;
        let mut rx_ord = rem % block;
        if rx_ord >= tx_ord {
            rx_ord += 1;
        }

        Ok(Link::new(self.node_list[tx_ord], self.node_list[rx_ord], self.channel_list[ch_ord]))
    }

    /// Every link in canonical order.
    pub fn links(&self) -> impl Iterator<Item = Link> + '_ {
        self.channel_list.iter().flat_map(move |&channel| {
            self.node_list.iter().flat_map(move |&tx| {
                self.node_list
                    .iter()
                    .filter(move |&&rx| rx != tx)
                    .map(move |&rx| Link::new(tx, rx, channel))
            })
        })
    }

    /// The channel before `channel` in the configured hop order, wrapping around.
    pub fn prev_channel(&self, channel: u8) -> Option<u8> {
        let ord = self.channel_ordinal(channel)?;
        let prev = (ord + self.num_channels() - 1) % self.num_channels();
        Some(self.channel_list[prev])
    }

    /// The channel `tx` was transmitting on when `rx` heard it on `current`.
    ///
    /// Nodes transmit in increasing id order and then all hop to the next channel.
    /// A transmitter with a lower id than the receiver was heard in the current sweep;
    /// a higher id was heard at the end of the previous sweep, one channel back.
    pub fn transmit_channel(&self, tx: u8, rx: u8, current: u8) -> Option<u8> {
        if rx > tx { Some(current) } else { self.prev_channel(current) }
    }

    /// Resolve every transmitter reading in a decoded packet to its canonical index.
    ///
    /// Self-links and transmitters without a slot in the packet are skipped.
    pub fn resolve<'a>(
        &'a self,
        packet: &'a DecodedPacket<'a>,
    ) -> impl Iterator<Item = (usize, Rss)> + 'a {
        self.node_list.iter().filter(move |&&tx| tx != packet.receiver).filter_map(move |&tx| {
            let channel = self.transmit_channel(tx, packet.receiver, packet.channel)?;
            let rss = packet.sample_for(tx)?;
            let index = self.link_index(tx, packet.receiver, channel).ok()?;
            Some((index, rss))
        })
    }
}

fn check_list(name: &str, list: &[u8]) -> Result<()> {
    if list.is_empty() {
        return Err(ListenError::config(format!("{} is empty", name)));
    }
    for (i, id) in list.iter().enumerate() {
        if list[..i].contains(id) {
            return Err(ListenError::config(format!("{} repeats id {}", name, id)));
        }
    }
    Ok(())
}
