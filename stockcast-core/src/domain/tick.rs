//! Minute ticks: raw observations and their gap-filled grid counterparts.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One observed OHLCV minute for a symbol, exactly as read from the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl RawTick {
    /// True when both ticks carry identical OHLCV values (timestamps ignored).
    pub fn same_values(&self, other: &RawTick) -> bool {
        self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
    }
}

/// Where a grid row's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillKind {
    /// An exact raw tick exists for this minute.
    Observed,
    /// Copied from the previous minute of the same session.
    ForwardFilled,
}

/// One row of the per-minute grid.
///
/// `session` is the trading day the minute belongs to. Two rows with the same
/// `session` are in the same trading session; forward-fill never crosses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFilledTick {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub session: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub fill: FillKind,
}

impl GapFilledTick {
    pub(crate) fn observed(tick: &RawTick, session: NaiveDate) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            timestamp: tick.timestamp,
            session,
            open: tick.open,
            high: tick.high,
            low: tick.low,
            close: tick.close,
            volume: tick.volume,
            fill: FillKind::Observed,
        }
    }

    /// Copy of `self` moved to `timestamp`, marked forward-filled.
    pub(crate) fn carried_to(&self, timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            fill: FillKind::ForwardFilled,
            ..self.clone()
        }
    }

    pub fn is_observed(&self) -> bool {
        self.fill == FillKind::Observed
    }
}
