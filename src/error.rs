use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Failures while loading survey data. Missing or malformed survey content
/// is never an error here; the engine degrades to zero/empty output instead.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures at the export boundary. These surface to the user.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to render document: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid export file id: {0}")]
    InvalidFileId(String),

    #[error("Export file not found: {0}")]
    NotFound(String),

    #[error("Chart image is not valid base64: {0}")]
    InvalidChartImage(String),
}
