use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MetaboError {
    #[error("invalid accession code: {0}")]
    #[diagnostic(help("accessions start with MTBLS, ST or MTBK"))]
    InvalidAccession(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("FTP operation failed: {0}")]
    Ftp(String),

    #[error("deadline exceeded while acquiring {0}")]
    DeadlineExceeded(String),

    #[error("cached artifact missing: {0}")]
    MissingArtifact(PathBuf),

    #[error("column {column} not found in {file}")]
    MissingColumn { file: String, column: String },

    #[error("failed to read table {file}: {message}")]
    Table { file: String, message: String },

    #[error("failed to parse JSON document {file}: {message}")]
    Json { file: String, message: String },

    #[error("key {key} missing in {file}")]
    MissingJsonKey { file: String, key: String },

    #[error("refusing to cache file outside the dataset directory: {0}")]
    InvalidFileName(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
}

impl MetaboError {
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            MetaboError::Http(_)
                | MetaboError::HttpStatus { .. }
                | MetaboError::Ftp(_)
                | MetaboError::DeadlineExceeded(_)
        )
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            MetaboError::MissingArtifact(_)
                | MetaboError::MissingColumn { .. }
                | MetaboError::Table { .. }
                | MetaboError::Json { .. }
                | MetaboError::MissingJsonKey { .. }
        )
    }
}
