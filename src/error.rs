use thiserror::Error;

/// Failures while turning an uploaded file into a table
///
/// Any of these aborts the upload before the spreadsheet is contacted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("{0} file is empty or could not be parsed.")]
    EmptyInput(String),

    #[error("Malformed {format} input: {reason}")]
    MalformedInput { format: String, reason: String },
}

impl IngestError {
    pub fn malformed(format: impl Into<String>, reason: impl ToString) -> Self {
        IngestError::MalformedInput {
            format: format.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures while appending rows to the spreadsheet
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Spreadsheet unavailable: {0}")]
    SinkUnavailable(String),
}

/// Missing or unusable configuration values
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
