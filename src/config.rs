// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Damping configuration.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the damping subprotocol.
///
/// The serialized form uses the recognized key names (`dampReqNVal`,
/// `dampTimerInterval`, ...), with durations expressed as integer
/// milliseconds. All members of the ring must agree on `suppress_limit`,
/// `n_val` and `r_val` for quorum decisions to be meaningful.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampConfig {
    /// Number of observers contacted per subprotocol round.
    ///
    /// Must be non-zero.
    ///
    /// Defaults to 3.
    #[serde(rename = "dampReqNVal")]
    pub n_val: usize,

    /// Quorum of successful responses required for a round to conclude.
    ///
    /// Must be non-zero. Rounds with fewer reachable observers lower their
    /// quorum to the observer count.
    ///
    /// Defaults to 3.
    #[serde(rename = "dampReqRVal")]
    pub r_val: usize,

    /// Damp-score threshold at or above which an observer votes "suppress".
    ///
    /// Defaults to 4500.
    #[serde(rename = "dampScoringSuppressLimit")]
    pub suppress_limit: f64,

    /// How long a damped member remains suppressed before automatic release.
    ///
    /// Defaults to 30 minutes.
    #[serde(rename = "dampScoringSuppressDuration", with = "duration_ms")]
    pub suppress_duration: Duration,

    /// Interval between expiration scans of the damped set.
    ///
    /// Defaults to 1 minute.
    #[serde(rename = "dampedMemberExpirationInterval", with = "duration_ms")]
    pub expiration_interval: Duration,

    /// Interval between subprotocol initiations.
    ///
    /// Defaults to 1 second.
    #[serde(rename = "dampTimerInterval", with = "duration_ms")]
    pub damp_timer_interval: Duration,

    /// Cluster-wide cap on the fraction of damped members, in `[0, 1]`.
    ///
    /// Rounds initiated at or above the cap are skipped.
    ///
    /// Defaults to 0.25.
    #[serde(rename = "dampedMaxPercentage")]
    pub damped_max_percentage: f64,
}

impl Default for DampConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DampConfig {
    /// Returns the default configuration.
    pub const fn new() -> Self {
        Self {
            n_val: 3,
            r_val: 3,
            suppress_limit: 4500.0,
            suppress_duration: Duration::from_secs(30 * 60),
            expiration_interval: Duration::from_secs(60),
            damp_timer_interval: Duration::from_secs(1),
            damped_max_percentage: 0.25,
        }
    }

    /// Check the invariants listed on each field.
    ///
    /// # Panics
    /// Panics if any invariant is not upheld.
    pub(crate) fn validate(&self) {
        assert_ne!(0, self.n_val);
        assert_ne!(0, self.r_val);
        assert!(self.suppress_limit >= 0.0);
        assert!((0.0..=1.0).contains(&self.damped_max_percentage));
    }
}

/// Millisecond-valued durations, as the recognized keys specify.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_keys_round_trip() {
        let cfg = DampConfig {
            n_val: 10,
            suppress_duration: Duration::from_millis(1500),
            ..DampConfig::new()
        };

        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["dampReqNVal"], 10);
        assert_eq!(json["dampScoringSuppressDuration"], 1500);

        let back: DampConfig = serde_json::from_value(json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn partial_configs_fall_back_to_defaults() {
        let cfg: DampConfig = serde_json::from_str(r#"{"dampReqRVal": 2}"#).unwrap();

        assert_eq!(2, cfg.r_val);
        assert_eq!(DampConfig::new().n_val, cfg.n_val);
        assert_eq!(DampConfig::new().suppress_duration, cfg.suppress_duration);
    }

    #[test]
    #[should_panic]
    fn zero_r_val_is_rejected() {
        DampConfig {
            r_val: 0,
            ..DampConfig::new()
        }
        .validate();
    }
}
