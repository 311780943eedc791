//! Forward-looking binary target.
//!
//! `label(t) = 1` iff `close[t + h] > close[t]`, where `t + h` must be a grid
//! row of the same session. Equal closes label 0.

use chrono::Duration;

use crate::domain::GapFilledTick;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelGenerator {
    horizon_minutes: u32,
}

impl LabelGenerator {
    pub fn new(horizon_minutes: u32) -> Result<Self, ConfigError> {
        if horizon_minutes == 0 {
            return Err(ConfigError::invalid("label_horizon_minutes", "must be at least 1"));
        }
        Ok(Self { horizon_minutes })
    }

    pub fn horizon_minutes(&self) -> u32 {
        self.horizon_minutes
    }

    /// Labels aligned with `grid`: `result[i]` belongs to `grid[i]`.
    ///
    /// `None` when the minute `t + h` is absent from the grid or lies in a
    /// different session.
    pub fn compute(&self, grid: &[GapFilledTick]) -> Vec<Option<u8>> {
        let horizon = Duration::minutes(i64::from(self.horizon_minutes));
        let h = self.horizon_minutes as usize;

        grid.iter()
            .enumerate()
            .map(|(i, now)| {
                let target = now.timestamp + horizon;
                // Grid rows are unique and ascending, so t + h can only sit
                // within the next h rows.
                let end = (i + h).min(grid.len().saturating_sub(1));
                let ahead = grid.get(i + 1..=end)?;
                let pos = ahead.binary_search_by_key(&target, |r| r.timestamp).ok()?;
                let future = &ahead[pos];
                (future.session == now.session).then(|| u8::from(future.close > now.close))
            })
            .collect()
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        Self { horizon_minutes: 5 }
    }
}
