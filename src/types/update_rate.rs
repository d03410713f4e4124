//! Delivery rate control for renderer subscriptions

use serde::{Deserialize, Serialize};

/// Rate at which finished matrices are delivered to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every matrix as soon as it is finished
    Native,

    /// Throttled to at most this many matrices per second (latest wins)
    /// A rate of zero is treated as Native
    Max(u32),
}

impl UpdateRate {
    /// Normalize the rate, folding `Max(0)` into `Native`
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            other => other,
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<std::time::Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(std::time::Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_rate_is_native() {
        assert_eq!(UpdateRate::Max(0).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(0).throttle_interval(), None);
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
    }

    #[test]
    fn max_rate_yields_interval() {
        assert_eq!(UpdateRate::Native.normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(4).throttle_interval(), Some(Duration::from_millis(250)));
    }
}
