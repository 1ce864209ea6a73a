//! Session configuration.
//!
//! A listening session is described by a YAML document:
//!
//! ```yaml
//! node_list: [1, 2, 3, 4]
//! channel_list: [11, 16, 21, 26]
//! max_nodes: 4
//! selection:
//!   order: fb          # f, b, fb or a
//!   nodes: [1, 2, 3]   # optional subset
//! flush:
//!   expected_count: 48
//!   max_round_age_ms: 500
//! history_depth: 50
//! round_buffer: 1024
//! ```
//!
//! Everything but the two lists and `max_nodes` has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::history::CircularBuffer;
use crate::round::FlushPolicy;
use crate::topology::{LinkIndexer, Network, NetworkSelection};
use crate::types::TimestampFormat;
use crate::wire::{DEFAULT_WINDOW, PacketLayout};
use crate::{ListenError, Result};

/// Optional round boundaries besides collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    pub expected_count: Option<usize>,
    pub max_round_age_ms: Option<u64>,
}

/// Everything a listening session needs to know about the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Node ids, ascending; nodes transmit in id order
    pub node_list: Vec<u8>,
    /// Channels in hop order
    pub channel_list: Vec<u8>,
    /// Node slots the firmware reserves in each packet
    pub max_nodes: usize,
    #[serde(default)]
    pub selection: NetworkSelection,
    #[serde(default)]
    pub flush: FlushConfig,
    /// Rounds kept in the shared history; no history when absent
    #[serde(default)]
    pub history_depth: Option<usize>,
    #[serde(default = "default_framer_window")]
    pub framer_window: usize,
    #[serde(default)]
    pub timestamp: TimestampFormat,
    /// Rounds a `rounds()` subscriber may fall behind before it skips ahead
    #[serde(default = "default_round_buffer")]
    pub round_buffer: usize,
}

fn default_framer_window() -> usize {
    DEFAULT_WINDOW
}

fn default_round_buffer() -> usize {
    1024
}

impl ListenConfig {
    /// A configuration with every optional setting at its default.
    pub fn new(node_list: Vec<u8>, channel_list: Vec<u8>, max_nodes: usize) -> Self {
        Self {
            node_list,
            channel_list,
            max_nodes,
            selection: NetworkSelection::default(),
            flush: FlushConfig::default(),
            history_depth: None,
            framer_window: DEFAULT_WINDOW,
            timestamp: TimestampFormat::default(),
            round_buffer: default_round_buffer(),
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ListenConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| ListenError::config_with_source("invalid configuration YAML", Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ListenError::source_error(path, e))?;
        debug!(path = %path.display(), "Loading configuration");
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| ListenError::config_with_source("cannot serialize configuration", Box::new(e)))
    }

    /// Check the configuration for mistakes that would make every packet fail.
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 || self.max_nodes > usize::from(u8::MAX) {
            return Err(ListenError::config(format!("max_nodes {} is outside 1..=255", self.max_nodes)));
        }
        // List emptiness and duplicates
        LinkIndexer::new(self.node_list.clone(), self.channel_list.clone())?;
        // Channel skew and backward regrouping rely on the transmit order
        if !self.node_list.is_sorted() {
            return Err(ListenError::config(format!(
                "node_list {:?} must be in ascending id order",
                self.node_list
            )));
        }

        if let Some(&node) = self.node_list.iter().find(|&&n| n == 0 || usize::from(n) > self.max_nodes) {
            return Err(ListenError::config(format!(
                "node id {} is outside 1..={} (max_nodes)",
                node, self.max_nodes
            )));
        }
        if self.framer_window < self.layout().expected_len() {
            return Err(ListenError::config(format!(
                "framer_window {} is shorter than a {}-byte packet",
                self.framer_window,
                self.layout().expected_len()
            )));
        }
        if self.round_buffer == 0 {
            return Err(ListenError::config("round_buffer must be at least 1"));
        }
        if self.history_depth == Some(0) {
            return Err(ListenError::config("history_depth must be at least 1"));
        }
        if self.flush.expected_count == Some(0) {
            return Err(ListenError::config("flush.expected_count must be at least 1"));
        }
        if self.flush.max_round_age_ms == Some(0) {
            return Err(ListenError::config("flush.max_round_age_ms must be at least 1"));
        }
        Ok(())
    }

    pub fn layout(&self) -> PacketLayout {
        PacketLayout::new(self.max_nodes)
    }

    pub fn indexer(&self) -> Result<LinkIndexer> {
        LinkIndexer::new(self.node_list.clone(), self.channel_list.clone())
    }

    pub fn network(&self) -> Result<Network> {
        Network::new(self.indexer()?, &self.selection)
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            expected_count: self.flush.expected_count,
            max_round_age: self.flush.max_round_age_ms.map(Duration::from_millis),
        }
    }

    /// An empty history sized for `network`'s selection, if one is configured.
    pub fn history(&self, network: &Network) -> Result<Option<CircularBuffer>> {
        self.history_depth
            .map(|depth| CircularBuffer::new(depth, network.num_links_subset()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkOrder;
    use std::io::Write;

    const FULL: &str = r#"
node_list: [1, 2, 3]
channel_list: [11, 16]
max_nodes: 4
selection:
  order: fb
  channels: [16]
flush:
  expected_count: 6
  max_round_age_ms: 250
history_depth: 20
timestamp: wall_clock
"#;

    #[test]
    fn parses_full_document() {
        let config = ListenConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(config.node_list, vec![1, 2, 3]);
        assert_eq!(config.selection.order, LinkOrder::ForwardBackward);
        assert_eq!(config.selection.channels, Some(vec![16]));
        assert_eq!(config.framer_window, DEFAULT_WINDOW);
        assert_eq!(config.timestamp, TimestampFormat::WallClock);
        assert_eq!(config.layout().expected_len(), 11);
        assert_eq!(config.flush_policy().max_round_age, Some(Duration::from_millis(250)));

        let network = config.network().unwrap();
        assert_eq!(network.num_links_subset(), 6);
        let history = config.history(&network).unwrap().unwrap();
        assert_eq!((history.depth(), history.rows()), (20, 6));
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config =
            ListenConfig::from_yaml_str("node_list: [1, 2]\nchannel_list: [26]\nmax_nodes: 2\n").unwrap();
        assert_eq!(config, ListenConfig::new(vec![1, 2], vec![26], 2));
        assert_eq!(config.selection.order, LinkOrder::All);
        assert_eq!(config.flush_policy(), FlushPolicy::collision_only());
        assert!(config.history(&config.network().unwrap()).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_node_ids() {
        let err = ListenConfig::new(vec![1, 5], vec![11], 4).validate().unwrap_err();
        assert!(matches!(err, ListenError::Config { .. }));
        assert!(err.to_string().contains("node id 5"));

        assert!(ListenConfig::new(vec![0, 1], vec![11], 4).validate().is_err());
        assert!(ListenConfig::new(vec![1, 1], vec![11], 4).validate().is_err());
        assert!(ListenConfig::new(vec![], vec![11], 4).validate().is_err());
        assert!(ListenConfig::new(vec![1, 2], vec![], 4).validate().is_err());
    }

    #[test]
    fn rejects_nodes_out_of_transmit_order() {
        let err = ListenConfig::new(vec![2, 1, 3], vec![11], 3).validate().unwrap_err();
        assert!(matches!(err, ListenError::Config { .. }));
        assert!(err.to_string().contains("ascending"));

        // Channels hop in any configured order
        assert!(ListenConfig::new(vec![1, 2, 3], vec![26, 11, 16], 3).validate().is_ok());
    }

    #[test]
    fn rejects_more_slots_than_node_ids() {
        let mut config = ListenConfig::new(vec![1, 2], vec![11], 256);
        config.framer_window = 4096;
        assert!(matches!(config.validate(), Err(ListenError::Config { .. })));

        config.max_nodes = 255;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_window_smaller_than_packet() {
        let mut config = ListenConfig::new(vec![1, 2], vec![11], 30);
        config.framer_window = 36;
        assert!(config.validate().is_err());
        config.framer_window = 37;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = ListenConfig::from_yaml_str("node_list: [1, 2\n").unwrap_err();
        assert!(matches!(err, ListenError::Config { source: Some(_), .. }));
    }

    #[test]
    fn loads_from_file_and_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = ListenConfig::load(file.path()).unwrap();
        let again = ListenConfig::from_yaml_str(&config.to_yaml_string().unwrap()).unwrap();
        assert_eq!(config, again);

        assert!(matches!(
            ListenConfig::load("/nonexistent/meshrss.yaml"),
            Err(ListenError::Source { .. })
        ));
    }
}
