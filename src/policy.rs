//! Refresh policies and freshness decisions

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::GolderError;

/// How long a captured snapshot stays usable before it is re-golded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Roughly a twelfth of a year (30.44 days)
    Monthly,
    /// Seven days
    Weekly,
    /// One day
    Daily,
    /// One hour
    Hourly,
}

impl RefreshPolicy {
    /// Every accepted policy, longest first
    pub const ALL: [RefreshPolicy; 4] = [Self::Monthly, Self::Weekly, Self::Daily, Self::Hourly];

    /// Threshold in milliseconds
    #[must_use]
    pub const fn millis(self) -> u64 {
        match self {
            Self::Monthly => 2_629_740_000,
            Self::Weekly => 604_800_000,
            Self::Daily => 86_400_000,
            Self::Hourly => 3_600_000,
        }
    }

    /// Threshold as a `Duration`
    #[must_use]
    pub const fn duration(self) -> Duration {
        Duration::from_millis(self.millis())
    }

    /// Lowercase policy name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshPolicy {
    type Err = GolderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| {
                let list = Self::ALL.map(Self::as_str).join(", ");
                GolderError::Configuration(format!(
                    "refresh rate '{s}' is not one of {list}"
                ))
            })
    }
}

/// Time elapsed between a write and `now`, clamped at zero for writes that
/// appear to lie in the future
#[must_use]
pub fn age(written_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(written_at).unwrap_or(Duration::ZERO)
}

/// Decide whether an existing snapshot may still be served
///
/// Without a policy a snapshot never goes stale. With one, a snapshot aged
/// exactly the threshold is still fresh.
#[must_use]
pub fn is_fresh(written_at: SystemTime, policy: Option<RefreshPolicy>, now: SystemTime) -> bool {
    match policy {
        None => true,
        Some(policy) => age(written_at, now) <= policy.duration(),
    }
}
