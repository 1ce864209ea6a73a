//! One sampling cycle of link readings

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::Rss;
use crate::{ListenError, Result};

/// Why the accumulator closed a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlushReason {
    /// A link reported twice; the protocol's own round boundary
    Collision,
    /// The expected number of links had all reported
    Complete,
    /// The round stayed open longer than the configured age limit
    Deadline,
    /// The byte stream ended with a round still open
    EndOfStream,
}

impl FlushReason {
    /// Fallback flushes are not driven by the protocol itself.
    pub fn is_fallback(self) -> bool {
        !matches!(self, FlushReason::Collision)
    }
}

/// Timestamp rendered at the end of a round line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// Whole milliseconds since the session started
    #[default]
    ElapsedMillis,
    /// Seconds since the Unix epoch, with fraction
    WallClock,
}

/// A complete round of RSS readings.
///
/// `values` is indexed by canonical link index for a full round, or by position in the
/// master index set once [`crate::Network::select_round`] has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub values: Vec<Rss>,

    /// Monotonic round counter, starting at 0
    pub sequence: u64,

    /// Time since the accumulator started (monotonic clock)
    pub elapsed: Duration,

    /// Wall-clock time the round was closed
    pub captured_at: SystemTime,

    pub reason: FlushReason,
}

impl Round {
    /// Number of links that reported in this round.
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_present()).count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render the classic text row: each value (127 for missing) then the timestamp.
    pub fn to_line(&self, format: TimestampFormat) -> String {
        let mut line = self.values.iter().map(Rss::to_string).collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            line.push(' ');
        }
        match format {
            TimestampFormat::ElapsedMillis => line.push_str(&self.elapsed.as_millis().to_string()),
            TimestampFormat::WallClock => {
                let secs = self
                    .captured_at
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or_default();
                line.push_str(&format!("{:.6}", secs));
            }
        }
        line
    }
}

/// A round read back from a text log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRound {
    pub values: Vec<Rss>,
    /// Trailing timestamp column, in whatever unit the log was written with
    pub timestamp: f64,
}

impl LoggedRound {
    /// Parse one row written by [`Round::to_line`].
    ///
    /// Values may be written as integers or floats (`-47` or `-47.0`); `127` is missing.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace().collect::<Vec<_>>();
        let timestamp_field = fields.pop().ok_or_else(|| ListenError::Parse {
            context: "round line".to_string(),
            details: "line is empty".to_string(),
        })?;
        let timestamp = timestamp_field.parse::<f64>().map_err(|e| ListenError::Parse {
            context: "round line".to_string(),
            details: format!("bad timestamp '{}': {}", timestamp_field, e),
        })?;

        let values = fields
            .iter()
            .map(|field| {
                let value = field.parse::<f64>().map_err(|e| ListenError::Parse {
                    context: "round line".to_string(),
                    details: format!("bad value '{}': {}", field, e),
                })?;
                if value.fract() != 0.0 || !(-128.0..=127.0).contains(&value) {
                    return Err(ListenError::Parse {
                        context: "round line".to_string(),
                        details: format!("value '{}' is not a signed byte", field),
                    });
                }
                Ok(Rss::new(value as i8))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { values, timestamp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(values: Vec<Rss>) -> Round {
        Round {
            values,
            sequence: 3,
            elapsed: Duration::from_millis(1520),
            captured_at: UNIX_EPOCH + Duration::from_secs(10),
            reason: FlushReason::Collision,
        }
    }

    #[test]
    fn line_uses_missing_marker_and_elapsed_ms() {
        let round = round(vec![Rss::new(-10), Rss::MISSING, Rss::new(-62)]);
        assert_eq!(round.to_line(TimestampFormat::ElapsedMillis), "-10 127 -62 1520");
        assert_eq!(round.to_line(TimestampFormat::WallClock), "-10 127 -62 10.000000");
        assert_eq!(round.present_count(), 2);
    }

    #[test]
    fn parses_written_lines() {
        let original = round(vec![Rss::new(-10), Rss::MISSING, Rss::new(-62)]);
        let logged =
            LoggedRound::parse_line(&original.to_line(TimestampFormat::ElapsedMillis)).unwrap();
        assert_eq!(logged.values, original.values);
        assert_eq!(logged.timestamp, 1520.0);
    }

    #[test]
    fn parses_float_logs() {
        let logged = LoggedRound::parse_line("-45.0 127.0 1349812345.25\n").unwrap();
        assert_eq!(logged.values, vec![Rss::new(-45), Rss::MISSING]);
        assert_eq!(logged.timestamp, 1349812345.25);
    }

    #[test]
    fn rejects_garbage() {
        assert!(LoggedRound::parse_line("").is_err());
        assert!(LoggedRound::parse_line("-45 abc 12").is_err());
        assert!(LoggedRound::parse_line("-45 300 12").is_err());
        assert!(LoggedRound::parse_line("-45 -4.5 12").is_err());
    }

    #[test]
    fn only_collisions_are_protocol_flushes() {
        assert!(!FlushReason::Collision.is_fallback());
        assert!(FlushReason::Complete.is_fallback());
        assert!(FlushReason::Deadline.is_fallback());
        assert!(FlushReason::EndOfStream.is_fallback());
    }
}
