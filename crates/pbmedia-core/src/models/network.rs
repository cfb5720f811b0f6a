use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

/// Coarse classification of the current connection quality.
///
/// Each class maps to a compression budget (see `PipelineConfig::budget_for`)
/// and is derived from observed throughput by the [`NetworkProfiler`](crate::NetworkProfiler).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Slow,
    Medium,
    Fast,
}

impl ConnectionClass {
    /// Throughput assumed for this class before any real samples exist.
    pub fn assumed_bytes_per_second(self) -> u64 {
        match self {
            ConnectionClass::Slow => 25 * 1024,
            ConnectionClass::Medium => 200 * 1024,
            ConnectionClass::Fast => 1024 * 1024,
        }
    }

    /// Round-trip estimate used when no latency-dominated samples exist.
    pub fn assumed_rtt(self) -> Duration {
        match self {
            ConnectionClass::Slow => Duration::from_millis(600),
            ConnectionClass::Medium => Duration::from_millis(150),
            ConnectionClass::Fast => Duration::from_millis(40),
        }
    }
}

impl Display for ConnectionClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConnectionClass::Slow => write!(f, "slow"),
            ConnectionClass::Medium => write!(f, "medium"),
            ConnectionClass::Fast => write!(f, "fast"),
        }
    }
}

impl FromStr for ConnectionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slow" | "2g" | "slow-2g" => Ok(ConnectionClass::Slow),
            "medium" | "3g" => Ok(ConnectionClass::Medium),
            "fast" | "4g" | "wifi" => Ok(ConnectionClass::Fast),
            _ => Err(format!("Invalid connection class: {}", s)),
        }
    }
}

/// Snapshot of the profiler's current network estimate.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkProfile {
    pub class: ConnectionClass,
    pub bytes_per_second: u64,
    pub rtt: Duration,
    pub sampled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_class_display() {
        assert_eq!(ConnectionClass::Slow.to_string(), "slow");
        assert_eq!(ConnectionClass::Medium.to_string(), "medium");
        assert_eq!(ConnectionClass::Fast.to_string(), "fast");
    }

    #[test]
    fn test_connection_class_from_str() {
        assert_eq!(
            "slow".parse::<ConnectionClass>().unwrap(),
            ConnectionClass::Slow
        );
        assert_eq!(
            "3g".parse::<ConnectionClass>().unwrap(),
            ConnectionClass::Medium
        );
        assert_eq!(
            "WIFI".parse::<ConnectionClass>().unwrap(),
            ConnectionClass::Fast
        );
        assert!("invalid".parse::<ConnectionClass>().is_err());
    }

    #[test]
    fn test_assumed_throughput_ordering() {
        assert!(
            ConnectionClass::Slow.assumed_bytes_per_second()
                < ConnectionClass::Medium.assumed_bytes_per_second()
        );
        assert!(
            ConnectionClass::Medium.assumed_bytes_per_second()
                < ConnectionClass::Fast.assumed_bytes_per_second()
        );
    }
}
