//! Real-time link RSS reconstruction from a sensor-mesh listen node.
//!
//! A mesh of radio nodes takes turns transmitting, each packet carrying the signal
//! strength at which the sender last heard every other node, and hops through a list
//! of channels together. A listen node overhears all of it and writes the packets to a
//! serial port. meshrss turns that byte stream back into rounds: one value per
//! (transmitter, receiver, channel) link, per sweep of the mesh.
//!
//! # Pipeline
//!
//! - [`wire`]: cut the byte stream on the `0xBEEF` sentinel and validate packets
//! - [`topology`]: number every link and pick the subset consumers want
//! - [`round`]: collect samples until a link repeats, then close the round
//! - [`history`]: rolling per-link history with missing-aware statistics
//! - [`connection`]: run all of the above on a tokio task and stream the rounds
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use meshrss::{ListenConfig, ListenConnection, TimestampFormat};
//!
//! #[tokio::main]
//! async fn main() -> meshrss::Result<()> {
//!     let config = ListenConfig::load("mesh.yaml")?;
//!     let connection = ListenConnection::open("/dev/ttyACM0", &config).await?;
//!
//!     let mut rounds = connection.rounds();
//!     while let Some(round) = rounds.next().await {
//!         println!("{}", round.to_line(TimestampFormat::ElapsedMillis));
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decode pipeline
pub mod history;
pub mod pipeline;
pub mod round;
pub mod sniffer;
pub mod topology;
pub mod wire;

// Stream-based session architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::ListenConfig;
pub use connection::ListenConnection;
pub use history::{CircularBuffer, FillForward};
pub use pipeline::{IngestStats, Pipeline};
pub use round::{FlushPolicy, RoundAccumulator};
pub use sniffer::{Discovery, Sniffer, sniff};
pub use topology::{LinkIndexer, Network, NetworkSelection};
pub use wire::{Framer, Packet, PacketLayout};
