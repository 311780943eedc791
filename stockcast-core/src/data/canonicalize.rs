//! Canonicalization: sort raw ticks by timestamp and resolve duplicates.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::RawTick;
use crate::error::DataIntegrityError;

/// What to do when two raw ticks share a timestamp but disagree on values.
///
/// Exact duplicates (same timestamp, same values) are always collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first occurrence in input order and log the conflict.
    #[default]
    KeepFirst,
    /// Fail the symbol with `DataIntegrityError::ConflictingDuplicate`.
    Reject,
}

/// Sorted, duplicate-free ticks plus what was removed to get there.
#[derive(Debug, Clone)]
pub struct CanonicalTicks {
    pub ticks: Vec<RawTick>,
    pub exact_duplicates: usize,
    pub conflicting_duplicates: usize,
    pub was_sorted: bool,
}

/// Canonicalizer for raw tick data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonicalizer {
    policy: DuplicatePolicy,
}

impl Canonicalizer {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    /// Sort by timestamp (stable, so input order decides among equals) and
    /// dedupe on timestamp.
    pub fn canonicalize(
        &self,
        symbol: &str,
        mut ticks: Vec<RawTick>,
    ) -> Result<CanonicalTicks, DataIntegrityError> {
        if ticks.is_empty() {
            return Err(DataIntegrityError::Empty {
                symbol: symbol.to_string(),
            });
        }

        let was_sorted = ticks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp);
        if !was_sorted {
            ticks.sort_by_key(|t| t.timestamp);
        }

        let mut exact_duplicates = 0;
        let mut conflicting_duplicates = 0;
        let mut out: Vec<RawTick> = Vec::with_capacity(ticks.len());

        for tick in ticks {
            match out.last() {
                Some(prev) if prev.timestamp == tick.timestamp => {
                    if prev.same_values(&tick) {
                        exact_duplicates += 1;
                        continue;
                    }
                    if self.policy == DuplicatePolicy::Reject {
                        return Err(DataIntegrityError::ConflictingDuplicate {
                            symbol: symbol.to_string(),
                            timestamp: tick.timestamp,
                        });
                    }
                    conflicting_duplicates += 1;
                }
                _ => out.push(tick),
            }
        }

        if conflicting_duplicates > 0 {
            warn!(
                symbol = %symbol,
                conflicting_duplicates,
                "conflicting duplicate timestamps, kept first occurrence"
            );
        }

        Ok(CanonicalTicks {
            ticks: out,
            exact_duplicates,
            conflicting_duplicates,
            was_sorted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn tick(hm: &str, close: f64) -> RawTick {
        RawTick {
            symbol: "SPY".into(),
            timestamp: NaiveDateTime::parse_from_str(&format!("2021-01-04 {hm}"), "%Y-%m-%d %H:%M")
                .unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn sorts_unsorted_input() {
        let out = Canonicalizer::default()
            .canonicalize("SPY", vec![tick("09:17", 3.0), tick("09:15", 1.0), tick("09:16", 2.0)])
            .unwrap();
        assert!(!out.was_sorted);
        let closes: Vec<f64> = out.ticks.iter().map(|t| t.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn collapses_exact_duplicates_silently() {
        let out = Canonicalizer::new(DuplicatePolicy::Reject)
            .canonicalize("SPY", vec![tick("09:15", 1.0), tick("09:15", 1.0), tick("09:16", 2.0)])
            .unwrap();
        assert_eq!(out.ticks.len(), 2);
        assert_eq!(out.exact_duplicates, 1);
        assert_eq!(out.conflicting_duplicates, 0);
    }

    #[test]
    fn keep_first_keeps_first_in_input_order() {
        // The conflicting pair is out of order relative to 09:15; the stable
        // sort must still keep the 09:16 tick that appeared first.
        let out = Canonicalizer::new(DuplicatePolicy::KeepFirst)
            .canonicalize(
                "SPY",
                vec![tick("09:16", 5.0), tick("09:15", 1.0), tick("09:16", 9.0)],
            )
            .unwrap();
        assert_eq!(out.ticks.len(), 2);
        assert_eq!(out.ticks[1].close, 5.0);
        assert_eq!(out.conflicting_duplicates, 1);
    }

    #[test]
    fn reject_policy_fails_on_conflict() {
        let err = Canonicalizer::new(DuplicatePolicy::Reject)
            .canonicalize("SPY", vec![tick("09:15", 1.0), tick("09:15", 2.0)])
            .unwrap_err();
        assert!(matches!(err, DataIntegrityError::ConflictingDuplicate { .. }));
    }

    #[test]
    fn empty_input_is_integrity_error() {
        let err = Canonicalizer::default().canonicalize("SPY", vec![]).unwrap_err();
        assert!(matches!(err, DataIntegrityError::Empty { .. }));
    }

    #[test]
    fn policy_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DuplicatePolicy::KeepFirst).unwrap(),
            "\"keep_first\""
        );
        let p: DuplicatePolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(p, DuplicatePolicy::Reject);
    }
}
