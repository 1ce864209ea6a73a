//! Link identity and direction policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// A directed (transmitter, receiver, channel) measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub tx: u8,
    pub rx: u8,
    pub channel: u8,
}

impl Link {
    pub fn new(tx: u8, rx: u8, channel: u8) -> Self {
        Self { tx, rx, channel }
    }

    /// Forward links run from a lower node id to a higher one.
    pub fn is_forward(&self) -> bool {
        self.tx < self.rx
    }

    /// The same node pair measured in the other direction.
    pub fn reversed(&self) -> Self {
        Self { tx: self.rx, rx: self.tx, channel: self.channel }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, ch{})", self.tx, self.rx, self.channel)
    }
}

/// Which link directions a selection keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkOrder {
    /// tx < rx only
    #[serde(rename = "f")]
    Forward,
    /// tx > rx only, grouped to line up with the forward order
    #[serde(rename = "b")]
    Backward,
    /// Forward links followed by the matching backward links
    #[serde(rename = "fb")]
    ForwardBackward,
    /// Every link in canonical order
    #[default]
    #[serde(rename = "a")]
    All,
}

impl LinkOrder {
    /// The configuration token for this order.
    pub fn token(self) -> &'static str {
        match self {
            LinkOrder::Forward => "f",
            LinkOrder::Backward => "b",
            LinkOrder::ForwardBackward => "fb",
            LinkOrder::All => "a",
        }
    }

    /// Links per node pair in a selection using this order.
    pub fn links_per_link_line(self, num_channels: usize) -> usize {
        match self {
            LinkOrder::Forward | LinkOrder::Backward => num_channels,
            LinkOrder::ForwardBackward | LinkOrder::All => num_channels * 2,
        }
    }
}

impl std::str::FromStr for LinkOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "f" => Ok(LinkOrder::Forward),
            "b" => Ok(LinkOrder::Backward),
            "fb" => Ok(LinkOrder::ForwardBackward),
            "a" => Ok(LinkOrder::All),
            other => Err(format!("unknown link order '{}' (expected f, b, fb or a)", other)),
        }
    }
}

impl fmt::Display for LinkOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
