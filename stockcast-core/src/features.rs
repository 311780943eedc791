//! Trailing rolling statistics over the gap-filled grid.
//!
//! For a window of `w` minutes ending at (and including) minute `t`:
//! - `rolling_avg` = arithmetic mean of close over `[t-(w-1), t]`
//! - `volume_sum`  = sum of volume over the same minutes
//!
//! A value exists only when all `w` minutes are present in the grid and belong
//! to the same session as `t`. Windows are causal: nothing after `t` is read.

use serde::{Deserialize, Serialize};

use crate::domain::GapFilledTick;
use crate::error::ConfigError;

/// Rolling statistics for one grid row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub rolling_avg: f64,
    pub volume_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEngine {
    window: usize,
}

impl FeatureEngine {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::invalid("rolling_window_size", "must be at least 1"));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Rolling stats aligned with `grid`: `result[i]` belongs to `grid[i]`.
    pub fn compute(&self, grid: &[GapFilledTick]) -> Vec<Option<RollingStats>> {
        let run = contiguous_run_lengths(grid);
        let w = self.window;

        (0..grid.len())
            .map(|i| {
                if run[i] < w {
                    return None;
                }
                let window = &grid[i + 1 - w..=i];
                let close_sum: f64 = window.iter().map(|t| t.close).sum();
                let volume_sum: f64 = window.iter().map(|t| t.volume).sum();
                Some(RollingStats {
                    rolling_avg: close_sum / w as f64,
                    volume_sum,
                })
            })
            .collect()
    }
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self { window: 10 }
    }
}

/// For each row, how many consecutive minutes of the same session end there.
///
/// The run restarts at a session change or at a missing minute.
fn contiguous_run_lengths(grid: &[GapFilledTick]) -> Vec<usize> {
    let mut run = Vec::with_capacity(grid.len());
    for (i, row) in grid.iter().enumerate() {
        let continues = i > 0 && {
            let prev = &grid[i - 1];
            prev.session == row.session
                && (row.timestamp - prev.timestamp).num_minutes() == 1
        };
        let len = if continues { run[i - 1] + 1 } else { 1 };
        run.push(len);
    }
    run
}
