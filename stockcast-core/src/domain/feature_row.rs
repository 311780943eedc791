//! One labelled training example.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Trailing features and the forward-looking label for one (symbol, minute).
///
/// `label` is 1 when the close `horizon` minutes later is strictly greater than
/// the close at `timestamp`, else 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub rolling_avg: f64,
    pub volume_sum: f64,
    pub label: u8,
}

/// Which partition of the dataset a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "train" => Some(Split::Train),
            "test" => Some(Split::Test),
            _ => None,
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
