//! Delivery rate control for round subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a latest-round subscription yields.
///
/// Rounds arrive at whatever rate the mesh sweeps (a few Hz for a small network). Plotters
/// rarely need more than that, so subscriptions can be capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Yield every round as it is emitted
    Native,

    /// Yield at most this many rounds per second, latest round wins
    Max(u32),
}

impl UpdateRate {
    /// Normalize a rate: `Max(0)` cannot throttle anything and becomes `Native`.
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            other => other,
        }
    }

    /// Interval between yielded rounds, if the rate throttles
    pub fn throttle_interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

impl std::str::FromStr for UpdateRate {
    type Err = String;

    /// Parses `native` or a rate in Hz such as `5` or `5hz`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        if trimmed == "native" {
            return Ok(UpdateRate::Native);
        }
        let digits = trimmed.strip_suffix("hz").unwrap_or(&trimmed);
        digits
            .parse::<u32>()
            .map(|hz| UpdateRate::Max(hz).normalize())
            .map_err(|_| format!("invalid update rate '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hz_means_native() {
        assert_eq!(UpdateRate::Max(0).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(0).throttle_interval(), None);
    }

    #[test]
    fn interval_from_hz() {
        assert_eq!(UpdateRate::Max(5).throttle_interval(), Some(Duration::from_millis(200)));
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
    }

    #[test]
    fn parses_tokens() {
        assert_eq!("native".parse::<UpdateRate>(), Ok(UpdateRate::Native));
        assert_eq!("10".parse::<UpdateRate>(), Ok(UpdateRate::Max(10)));
        assert_eq!("4Hz".parse::<UpdateRate>(), Ok(UpdateRate::Max(4)));
        assert!("fast".parse::<UpdateRate>().is_err());
    }
}
