//! Error types for link RSS decoding.
//!
//! Every fallible operation in the crate returns [`ListenError`]. The variants fall
//! into three groups that callers treat very differently:
//!
//! - **Decode errors** ([`ListenError::LengthMismatch`],
//!   [`ListenError::UnknownReceiverOrChannel`]): a single bad packet. The packet is
//!   dropped, framing resumes, and no round is touched.
//! - **Configuration errors** ([`ListenError::InvalidTriple`],
//!   [`ListenError::EmptySelection`], [`ListenError::UnknownNode`],
//!   [`ListenError::UnknownChannel`], [`ListenError::Config`]): the session cannot
//!   start and the error must reach the user.
//! - **Buffer misuse** ([`ListenError::InvalidOffset`],
//!   [`ListenError::IndexOutOfRange`], [`ListenError::DimensionMismatch`],
//!   [`ListenError::BufferNotFull`]): programmer errors surfaced to the caller.
//!
//! ```rust
//! use meshrss::ListenError;
//!
//! let error = ListenError::LengthMismatch { expected: 9, actual: 4 };
//! assert!(error.is_recoverable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for listen operations.
pub type Result<T, E = ListenError> = std::result::Result<T, E>;

/// Main error type for the decode pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ListenError {
    #[error("Packet length mismatch: expected {expected} bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Packet from unknown receiver {receiver} or channel {channel}")]
    UnknownReceiverOrChannel { receiver: u8, channel: u8 },

    #[error("Invalid link triple (tx={tx}, rx={rx}, ch={channel})")]
    InvalidTriple { tx: u8, rx: u8, channel: u8 },

    #[error("Link index {index} out of range (network has {num_links} links)")]
    IndexOutOfRange { index: usize, num_links: usize },

    #[error("Offset {offset} is invalid for a buffer holding {available} observations")]
    InvalidOffset { offset: usize, available: usize },

    #[error("Link selection is empty: {reason}")]
    EmptySelection { reason: String },

    #[error("Node {node} is not part of the configured node list")]
    UnknownNode { node: u8 },

    #[error("Channel {channel} is not part of the configured channel list")]
    UnknownChannel { channel: u8 },

    #[error("Dimension mismatch in {context}: expected {expected}, found {actual}")]
    DimensionMismatch { context: &'static str, expected: usize, actual: usize },

    #[error("Masked add requires a full buffer ({num_obs}/{depth} observations)")]
    BufferNotFull { num_obs: usize, depth: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Byte source error: {path}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ListenError {
    /// Returns whether the error only affects a single packet.
    ///
    /// Recoverable errors are counted and logged by the driver; the stream keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ListenError::LengthMismatch { .. } | ListenError::UnknownReceiverOrChannel { .. }
        )
    }

    /// Returns whether the error means the configuration is unusable.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            ListenError::InvalidTriple { .. }
                | ListenError::EmptySelection { .. }
                | ListenError::UnknownNode { .. }
                | ListenError::UnknownChannel { .. }
                | ListenError::Config { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ListenError::LengthMismatch { .. } => vec![
                "Check that max_nodes matches the value the nodes are programmed with",
                "Check the serial link for dropped bytes",
            ],
            ListenError::UnknownReceiverOrChannel { .. } => vec![
                "Add the receiver id to node_list",
                "Add the channel to channel_list",
                "Run the sniffer to discover the active nodes and channels",
            ],
            ListenError::InvalidTriple { .. } => vec![
                "Transmitter and receiver must differ",
                "Use ids present in node_list and channel_list",
            ],
            ListenError::IndexOutOfRange { .. } => {
                vec!["Link indices must be below nodes * (nodes - 1) * channels"]
            }
            ListenError::InvalidOffset { .. } => {
                vec!["Offsets start at 1 (newest) and cannot exceed the observation count"]
            }
            ListenError::EmptySelection { .. } => vec![
                "Select at least two nodes",
                "Select at least one channel",
                "Check the link order against the chosen nodes",
            ],
            ListenError::UnknownNode { .. } | ListenError::UnknownChannel { .. } => {
                vec!["Subsets must be drawn from the full node and channel lists"]
            }
            ListenError::DimensionMismatch { .. } => {
                vec!["Pass exactly one value per buffer row"]
            }
            ListenError::BufferNotFull { .. } => {
                vec!["Fill the buffer with add() before switching to add_masked()"]
            }
            ListenError::Parse { .. } => vec![
                "Check the round log was written by this tool",
                "Each line holds one value per link followed by a timestamp",
            ],
            ListenError::Config { .. } => vec![
                "Check the YAML configuration against the documented fields",
                "Node ids must be between 1 and max_nodes",
            ],
            ListenError::Source { .. } => vec![
                "Check the device or capture file exists and is readable",
                "Check the listen node is plugged in",
            ],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        ListenError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with a source.
    pub fn config_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ListenError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for byte source errors with path context.
    pub fn source_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ListenError::Source { path: path.into(), source }
    }

    /// Helper constructor for empty selections.
    pub fn empty_selection(reason: impl Into<String>) -> Self {
        ListenError::EmptySelection { reason: reason.into() }
    }
}

impl From<std::io::Error> for ListenError {
    fn from(err: std::io::Error) -> Self {
        ListenError::Source { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn messages_carry_their_context(
                expected in 0usize..512,
                actual in 0usize..512,
                receiver in any::<u8>(),
                channel in any::<u8>(),
                reason in "[a-z ]{1,40}",
            ) {
                let length = ListenError::LengthMismatch { expected, actual }.to_string();
                prop_assert!(length.contains(&expected.to_string()));
                prop_assert!(length.contains(&actual.to_string()));

                let unknown = ListenError::UnknownReceiverOrChannel { receiver, channel }.to_string();
                prop_assert!(unknown.contains(&receiver.to_string()));
                prop_assert!(unknown.contains(&channel.to_string()));

                let empty = ListenError::empty_selection(reason.clone()).to_string();
                prop_assert!(empty.contains(&reason));
            }
        }
    }

    #[test]
    fn decode_errors_are_recoverable() {
        assert!(ListenError::LengthMismatch { expected: 9, actual: 3 }.is_recoverable());
        assert!(
            ListenError::UnknownReceiverOrChannel { receiver: 9, channel: 30 }.is_recoverable()
        );
        assert!(!ListenError::InvalidOffset { offset: 4, available: 2 }.is_recoverable());
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(ListenError::empty_selection("single node").is_fatal_at_startup());
        assert!(ListenError::InvalidTriple { tx: 1, rx: 1, channel: 11 }.is_fatal_at_startup());
        assert!(ListenError::config("bad").is_fatal_at_startup());
        assert!(!ListenError::LengthMismatch { expected: 9, actual: 3 }.is_fatal_at_startup());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = vec![
            ListenError::LengthMismatch { expected: 9, actual: 3 },
            ListenError::UnknownReceiverOrChannel { receiver: 1, channel: 2 },
            ListenError::InvalidTriple { tx: 1, rx: 1, channel: 1 },
            ListenError::IndexOutOfRange { index: 10, num_links: 4 },
            ListenError::InvalidOffset { offset: 3, available: 1 },
            ListenError::empty_selection("none"),
            ListenError::UnknownNode { node: 4 },
            ListenError::UnknownChannel { channel: 4 },
            ListenError::DimensionMismatch { context: "add", expected: 2, actual: 1 },
            ListenError::BufferNotFull { num_obs: 1, depth: 4 },
            ListenError::Parse { context: "round line".to_string(), details: "empty".to_string() },
            ListenError::config("bad"),
            ListenError::source_error("/dev/ttyACM0", std::io::Error::other("gone")),
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "{error} has no suggestions");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ListenError>();

        let error = ListenError::config("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn io_errors_convert_to_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no device");
        let err: ListenError = io_err.into();

        match err {
            ListenError::Source { source, .. } => assert_eq!(source.to_string(), "no device"),
            _ => panic!("Expected Source error variant"),
        }
    }

    #[test]
    fn config_source_is_chained() {
        let inner = std::io::Error::other("yaml broke");
        let err = ListenError::config_with_source("parse", Box::new(inner));
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert!(source.to_string().contains("yaml broke"));
    }
}
