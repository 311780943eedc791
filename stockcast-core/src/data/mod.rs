//! Raw input handling and the output table layout.

pub mod canonicalize;
pub mod ingest;
pub mod schema;

pub use canonicalize::{CanonicalTicks, Canonicalizer, DuplicatePolicy};
pub use ingest::{parse_timestamp, symbol_from_path, DataIngestor};
pub use schema::{DatasetSchema, SchemaError};
