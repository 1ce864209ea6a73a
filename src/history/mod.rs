//! Rolling history of rounds.
//!
//! [`CircularBuffer`] keeps the last `depth` observations of every link and computes
//! sentinel-aware statistics over them. [`FillForward`] is the lighter alternative that
//! only remembers the last reading of each link.
//!
//! ```rust
//! use meshrss::history::CircularBuffer;
//! use meshrss::Rss;
//!
//! let mut history = CircularBuffer::new(4, 1).unwrap();
//! history.add(&[Rss::new(-48)]).unwrap();
//! history.add(&[Rss::MISSING]).unwrap();
//! history.add(&[Rss::new(-52)]).unwrap();
//!
//! assert_eq!(history.mean(), vec![-50.0]);
//! assert_eq!(history.present_count(), vec![2]);
//! ```

mod circular;
mod fill_forward;
mod stats;

pub use circular::CircularBuffer;
pub use fill_forward::FillForward;

/// History shared between the ingest task and its readers.
pub type SharedHistory = std::sync::Arc<std::sync::Mutex<CircularBuffer>>;
