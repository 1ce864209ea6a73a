//! Typed RSS sample with an explicit missing state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire value the listen node uses for "no sample this cycle".
pub const MISSING_WIRE: u8 = 0x7F;

/// A single received-signal-strength reading in dBm, or missing.
///
/// The wire encoding reserves 127 for missing; internally the two states are kept apart
/// so that no statistic can mistake the marker for a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rss(Option<i8>);

impl Rss {
    /// The missing sample.
    pub const MISSING: Rss = Rss(None);

    /// Wrap a present reading. 127 is the wire marker and maps to missing.
    pub fn new(dbm: i8) -> Self {
        if dbm == MISSING_WIRE as i8 { Rss(None) } else { Rss(Some(dbm)) }
    }

    /// Decode a wire byte by two's-complement reinterpretation.
    ///
    /// ```rust
    /// use meshrss::Rss;
    ///
    /// assert_eq!(Rss::from_wire(0xF6).value(), Some(-10));
    /// assert!(Rss::from_wire(0x7F).is_missing());
    /// ```
    pub fn from_wire(byte: u8) -> Self {
        Self::new(byte as i8)
    }

    /// Encode back to the wire representation.
    pub fn to_wire(self) -> u8 {
        match self.0 {
            Some(dbm) => dbm as u8,
            None => MISSING_WIRE,
        }
    }

    /// The reading, if present.
    pub fn value(self) -> Option<i8> {
        self.0
    }

    pub fn is_present(self) -> bool {
        self.0.is_some()
    }

    pub fn is_missing(self) -> bool {
        self.0.is_none()
    }
}

impl From<Option<i8>> for Rss {
    fn from(value: Option<i8>) -> Self {
        value.map_or(Rss::MISSING, Rss::new)
    }
}

/// Renders the wire convention: the reading, or `127` when missing.
impl fmt::Display for Rss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(dbm) => write!(f, "{}", dbm),
            None => write!(f, "{}", MISSING_WIRE),
        }
    }
}
