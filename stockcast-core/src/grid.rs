//! Session grid builder: a gap-free per-minute timeline for one symbol.
//!
//! Given raw ticks and a `SessionCalendar`, emit one row for every trading
//! minute between the symbol's first and last in-session tick:
//!
//! - a minute with an exact raw tick uses it as is;
//! - a missing minute copies the previous grid row's values, but only when the
//!   previous row belongs to the same session;
//! - a missing minute with no same-session predecessor (the opening minutes of
//!   a session before its first tick) is dropped, never zero-filled;
//! - with a fill cap, a missing minute more than `cap` minutes after the last
//!   observed tick of its session is dropped, as is the rest of that gap.
//!
//! Raw ticks outside every session are discarded and never act as a fill
//! source.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calendar::SessionCalendar;
use crate::data::canonicalize::{Canonicalizer, DuplicatePolicy};
use crate::domain::{GapFilledTick, RawTick};
use crate::error::{ConfigError, DataIntegrityError};

/// Row counts explaining how a grid was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridStats {
    /// Raw ticks read, before any cleaning.
    pub raw_ticks: usize,
    pub exact_duplicates: usize,
    pub conflicting_duplicates: usize,
    /// Raw ticks outside every trading session.
    pub outside_session: usize,
    /// Grid rows backed by a raw tick.
    pub observed: usize,
    /// Grid rows copied from the previous minute.
    pub forward_filled: usize,
    /// Minutes dropped for lack of a same-session fill source.
    pub dropped_unfillable: usize,
    /// Minutes dropped because the gap exceeded the fill cap.
    pub dropped_fill_cap: usize,
    /// Distinct sessions present in the grid.
    pub sessions: usize,
    /// Whether the source file was already in timestamp order.
    #[serde(default)]
    pub source_sorted: bool,
}

impl GridStats {
    pub fn grid_rows(&self) -> usize {
        self.observed + self.forward_filled
    }
}

/// The gap-filled grid of one symbol, ascending by timestamp.
#[derive(Debug, Clone)]
pub struct GapFilledSeries {
    pub symbol: String,
    pub ticks: Vec<GapFilledTick>,
    pub stats: GridStats,
}

impl GapFilledSeries {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Builds `GapFilledSeries` from raw ticks.
#[derive(Debug, Clone)]
pub struct SessionGridBuilder {
    calendar: SessionCalendar,
    canonicalizer: Canonicalizer,
    max_fill_minutes: Option<u32>,
}

impl SessionGridBuilder {
    pub fn new(calendar: SessionCalendar) -> Self {
        Self {
            calendar,
            canonicalizer: Canonicalizer::default(),
            max_fill_minutes: None,
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.canonicalizer = Canonicalizer::new(policy);
        self
    }

    /// Cap forward-fill at `minutes` after the last observed tick. `None`
    /// means unbounded within a session.
    pub fn with_fill_cap(mut self, minutes: Option<u32>) -> Result<Self, ConfigError> {
        if minutes == Some(0) {
            return Err(ConfigError::invalid(
                "max_fill_minutes",
                "must be at least 1 when set",
            ));
        }
        self.max_fill_minutes = minutes;
        Ok(self)
    }

    pub fn calendar(&self) -> &SessionCalendar {
        &self.calendar
    }

    /// Build the grid for `symbol`.
    ///
    /// Fails with `DataIntegrityError` when `ticks` is empty or when
    /// conflicting duplicates meet a `Reject` policy.
    pub fn build(
        &self,
        symbol: &str,
        ticks: Vec<RawTick>,
    ) -> Result<GapFilledSeries, DataIntegrityError> {
        let raw_ticks = ticks.len();
        let canonical = self.canonicalizer.canonicalize(symbol, ticks)?;

        let mut stats = GridStats {
            raw_ticks,
            exact_duplicates: canonical.exact_duplicates,
            conflicting_duplicates: canonical.conflicting_duplicates,
            source_sorted: canonical.was_sorted,
            ..GridStats::default()
        };

        let in_session: Vec<RawTick> = canonical
            .ticks
            .into_iter()
            .filter(|t| self.calendar.contains(t.timestamp))
            .collect();
        stats.outside_session = raw_ticks
            - stats.exact_duplicates
            - stats.conflicting_duplicates
            - in_session.len();
        if stats.outside_session > 0 {
            warn!(
                symbol = %symbol,
                outside_session = stats.outside_session,
                "discarded raw ticks outside trading sessions"
            );
        }

        let (first, last) = match (in_session.first(), in_session.last()) {
            (Some(f), Some(l)) => (f.timestamp, l.timestamp),
            _ => {
                return Ok(GapFilledSeries {
                    symbol: symbol.to_string(),
                    ticks: Vec::new(),
                    stats,
                })
            }
        };

        let mut grid: Vec<GapFilledTick> = Vec::new();
        let mut raw = in_session.iter().peekable();
        // Last grid row of the current session, and when its values were observed.
        let mut carry: Option<(GapFilledTick, chrono::NaiveDateTime)> = None;

        for minute in self.calendar.trading_minutes(first, last) {
            let session = minute.date();
            if carry.as_ref().is_some_and(|(row, _)| row.session != session) {
                carry = None;
            }

            if let Some(tick) = raw.next_if(|t| t.timestamp == minute) {
                let row = GapFilledTick::observed(tick, session);
                carry = Some((row.clone(), minute));
                grid.push(row);
                stats.observed += 1;
                continue;
            }

            match &carry {
                None => stats.dropped_unfillable += 1,
                Some((_, observed_at))
                    if self
                        .max_fill_minutes
                        .is_some_and(|cap| (minute - *observed_at).num_minutes() > i64::from(cap)) =>
                {
                    stats.dropped_fill_cap += 1;
                }
                Some((prev, _)) => {
                    grid.push(prev.carried_to(minute));
                    stats.forward_filled += 1;
                }
            }
        }

        stats.sessions = count_sessions(&grid);
        debug!(
            symbol = %symbol,
            observed = stats.observed,
            forward_filled = stats.forward_filled,
            dropped_unfillable = stats.dropped_unfillable,
            dropped_fill_cap = stats.dropped_fill_cap,
            sessions = stats.sessions,
            "built session grid"
        );

        Ok(GapFilledSeries {
            symbol: symbol.to_string(),
            ticks: grid,
            stats,
        })
    }
}

fn count_sessions(grid: &[GapFilledTick]) -> usize {
    match grid.first() {
        None => 0,
        Some(_) => 1 + grid.windows(2).filter(|w| w[0].session != w[1].session).count(),
    }
}
