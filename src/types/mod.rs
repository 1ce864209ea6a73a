//! Core value types shared across the pipeline.
//!
//! - [`Rss`] is one reading, with the wire's 127 marker lifted into an explicit missing state
//! - [`Link`] names a (tx, rx, channel) measurement and [`LinkOrder`] a direction policy
//! - [`Round`] is one closed sampling cycle, tagged with the [`FlushReason`] that closed it
//! - [`UpdateRate`] controls how latest-round subscriptions are paced
//!
//! ```rust
//! use meshrss::types::{Link, LinkOrder, Rss};
//!
//! let sample = Rss::from_wire(0xF6);
//! assert_eq!(sample.value(), Some(-10));
//!
//! let link = Link::new(1, 2, 11);
//! assert!(link.is_forward());
//! assert_eq!("fb".parse::<LinkOrder>().unwrap(), LinkOrder::ForwardBackward);
//! ```

mod link;
mod round;
mod rss;
mod update_rate;

pub use link::{Link, LinkOrder};
pub use round::{FlushReason, LoggedRound, Round, TimestampFormat};
pub use rss::{MISSING_WIRE, Rss};
pub use update_rate::UpdateRate;
