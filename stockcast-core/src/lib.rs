//! Stockcast Core: minute ticks in, labelled feature rows out.
//!
//! This crate holds the preprocessing logic and its invariants:
//! - Session calendar (valid trading minutes per day)
//! - Raw tick ingestion and canonicalization
//! - Session grid builder with same-session forward-fill
//! - Trailing rolling features and the look-ahead label
//! - Chronological per-symbol train/test assembly
//! - The error taxonomy and content hashing
//!
//! Nothing here touches the network or writes files.

pub mod calendar;
pub mod data;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod grid;
pub mod labels;

pub use calendar::SessionCalendar;
pub use dataset::{Dataset, DatasetAssembler, PartitionSummary, SymbolRows};
pub use domain::{FeatureRow, FillKind, GapFilledTick, RawTick, Split};
pub use error::{ConfigError, DataIntegrityError, InsufficientDataError, SymbolError};
pub use features::{FeatureEngine, RollingStats};
pub use grid::{GapFilledSeries, GridStats, SessionGridBuilder};
pub use labels::LabelGenerator;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a per-symbol worker touches is Send + Sync,
    /// so symbols can be processed on a thread pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<RawTick>();
        require_sync::<RawTick>();
        require_send::<GapFilledTick>();
        require_sync::<GapFilledTick>();
        require_send::<FeatureRow>();
        require_sync::<FeatureRow>();
        require_send::<SessionCalendar>();
        require_sync::<SessionCalendar>();
        require_send::<SessionGridBuilder>();
        require_sync::<SessionGridBuilder>();
        require_send::<FeatureEngine>();
        require_sync::<FeatureEngine>();
        require_send::<LabelGenerator>();
        require_sync::<LabelGenerator>();
        require_send::<DatasetAssembler>();
        require_sync::<DatasetAssembler>();
        require_send::<Dataset>();
        require_sync::<Dataset>();

        // Errors cross thread boundaries when collected from workers.
        require_send::<SymbolError>();
        require_sync::<SymbolError>();
        require_send::<ConfigError>();
        require_sync::<ConfigError>();
    }
}
