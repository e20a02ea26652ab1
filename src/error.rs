use thiserror::Error;

pub type BlearnResult<T> = Result<T, BlearnError>;

#[derive(Error, Debug)]
pub enum BlearnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Grading sheet error: {0}")]
    GradeSheet(String),

    #[error("Export error: {0}")]
    Export(String),

    /// A pipeline stage produced data that contradicts an earlier stage.
    #[error("BUG: {0}")]
    Internal(String),
}

impl BlearnError {
    /// Parse error that quotes the text and the pattern it failed to match
    pub fn no_match(text: &str, pattern: &str) -> Self {
        BlearnError::Parse(format!(
            "Cannot parse:\n---\n{}\n---\nwith\n---\n{}\n---",
            text, pattern
        ))
    }
}
