use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error("Invalid numeric value '{value}' in {context}")]
    InvalidNumber { value: String, context: String },

    #[error("Sample '{0}' has no individual mapping")]
    UnmappedSample(String),

    #[error("Palette exhausted: {individuals} individuals but only {slots} colors")]
    PaletteExhausted { individuals: usize, slots: usize },

    #[error("Invalid hex color '{0}'")]
    InvalidColor(String),

    #[error("Duplicate matrix row for sample '{0}'")]
    DuplicateRow(String),

    #[error("Duplicate matrix column for sample '{0}'")]
    DuplicateColumn(String),

    #[error("Matrix row '{0}' has no matching column")]
    RowWithoutColumn(String),

    #[error("Matrix column '{0}' has no matching row")]
    ColumnWithoutRow(String),

    #[error("Graph rendering with '{engine}' failed: {status}")]
    RenderFailed { engine: String, status: String },
}
