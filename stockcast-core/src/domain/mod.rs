//! Domain types for the minute-bar dataset pipeline.

pub mod feature_row;
pub mod tick;

pub use feature_row::{FeatureRow, Split};
pub use tick::{FillKind, GapFilledTick, RawTick};
