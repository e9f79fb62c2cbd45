use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Column not found in observation table: {0}")]
    ColumnNotFound(String),
    #[error("Invalid position set: {0}")]
    InvalidPositions(String),
    #[error("Non-binary indicator {value} in column {column}, row {row}")]
    NonBinaryValue { column: String, row: usize, value: f64 },
    #[error("Column {column} has {found} values, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Input table is empty: {0}")]
    EmptyInput(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to render heatmap: {0}")]
    Render(String),
}
