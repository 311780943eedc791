use polars::prelude::*;

use crate::dataset::Dataset;

/// Column layout of the processed dataset artifact.
///
/// Feature column names carry the window size (`rolling_avg_10`,
/// `volume_sum_10`), so a schema is bound to one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    window: usize,
}

impl DatasetSchema {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn rolling_avg_column(&self) -> String {
        format!("rolling_avg_{}", self.window)
    }

    pub fn volume_sum_column(&self) -> String {
        format!("volume_sum_{}", self.window)
    }

    /// Header in output order.
    pub fn column_names(&self) -> Vec<String> {
        vec![
            "symbol".to_string(),
            "timestamp".to_string(),
            self.rolling_avg_column(),
            self.volume_sum_column(),
            "label".to_string(),
            "split".to_string(),
        ]
    }

    /// Model input columns, in the order the trainer consumes them.
    pub fn feature_columns(&self) -> [String; 2] {
        [self.rolling_avg_column(), self.volume_sum_column()]
    }

    /// Polars schema for the columnar artifact.
    pub fn schema(&self) -> Schema {
        Schema::from_iter(vec![
            Field::new("symbol".into(), DataType::String),
            Field::new("timestamp".into(), DataType::Datetime(TimeUnit::Milliseconds, None)),
            Field::new(self.rolling_avg_column().into(), DataType::Float64),
            Field::new(self.volume_sum_column().into(), DataType::Float64),
            Field::new("label".into(), DataType::Int64),
            Field::new("split".into(), DataType::String),
        ])
    }

    /// Build the columnar form of `dataset`, rows in output order.
    pub fn to_dataframe(&self, dataset: &Dataset) -> PolarsResult<DataFrame> {
        let n = dataset.len();
        let mut symbol = Vec::with_capacity(n);
        let mut timestamp = Vec::with_capacity(n);
        let mut rolling_avg = Vec::with_capacity(n);
        let mut volume_sum = Vec::with_capacity(n);
        let mut label = Vec::with_capacity(n);
        let mut split = Vec::with_capacity(n);

        for (row, part) in dataset.rows() {
            symbol.push(row.symbol.as_str());
            timestamp.push(row.timestamp.and_utc().timestamp_millis());
            rolling_avg.push(row.rolling_avg);
            volume_sum.push(row.volume_sum);
            label.push(i64::from(row.label));
            split.push(part.as_str());
        }

        let timestamp = Series::new("timestamp".into(), timestamp)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

        DataFrame::new(vec![
            Column::from(Series::new("symbol".into(), symbol)),
            Column::from(timestamp),
            Column::from(Series::new(self.rolling_avg_column().into(), rolling_avg)),
            Column::from(Series::new(self.volume_sum_column().into(), volume_sum)),
            Column::from(Series::new("label".into(), label)),
            Column::from(Series::new("split".into(), split)),
        ])
    }

    /// Validate a DataFrame against the schema.
    pub fn validate(&self, df: &DataFrame) -> Result<(), SchemaError> {
        let expected = self.schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::new(10)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
