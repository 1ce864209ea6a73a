//! Link numbering and link selection.
//!
//! [`LinkIndexer`] fixes the canonical index of every (tx, rx, channel) link for the full
//! node and channel lists. [`Network`] then picks and orders the subset consumers see,
//! according to a [`NetworkSelection`].

mod link_index;
mod network;

pub use link_index::LinkIndexer;
pub use network::{Network, NetworkSelection};
