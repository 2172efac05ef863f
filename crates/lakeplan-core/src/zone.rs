//! Lifecycle zones of the lake.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Top-level lifecycle stage of a stored object.
///
/// Closed set. The zone is always the first path segment of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Raw,
    Staging,
    Processed,
    Features,
    Archive,
    Metadata,
    Models,
}

impl Zone {
    /// All zones, in declaration order.
    pub const ALL: [Zone; 7] = [
        Zone::Raw,
        Zone::Staging,
        Zone::Processed,
        Zone::Features,
        Zone::Archive,
        Zone::Metadata,
        Zone::Models,
    ];

    /// Path segment for this zone.
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Raw => "raw",
            Zone::Staging => "staging",
            Zone::Processed => "processed",
            Zone::Features => "features",
            Zone::Archive => "archive",
            Zone::Metadata => "metadata",
            Zone::Models => "models",
        }
    }

    /// Archive is terminal: nothing transitions out of it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Zone::Archive)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL
            .into_iter()
            .find(|z| z.as_str() == s)
            .ok_or_else(|| PlanError::InvalidIdentifier {
                field: "zone",
                value: s.to_string(),
            })
    }
}
