use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EnricherError {
    #[error("missing directory credential: {0}")]
    #[diagnostic(help("export PODCASTINDEX_API_KEY and PODCASTINDEX_API_SECRET"))]
    MissingCredentials(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("invalid feed id: {0}")]
    InvalidFeedId(String),

    #[error("directory request failed: {0}")]
    DirectoryHttp(String),

    #[error("directory returned status {status}: {message}")]
    DirectoryStatus { status: u16, message: String },

    #[error("failed to decode directory response: {0}")]
    DirectoryDecode(String),

    #[error("directory response is missing {0}")]
    MissingField(String),

    #[error("database error: {0}")]
    Database(String),
}
