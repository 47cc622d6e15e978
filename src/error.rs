use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Unable to map \"{identifier}\" into a valid object")]
    Unresolved { identifier: String },
    #[error("{callable}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword { callable: String, keyword: String },
    #[error("{callable}() is missing required argument '{argument}'")]
    MissingArgument { callable: String, argument: String },
    #[error("Invalid argument for {callable}(): {message}")]
    InvalidArgument { callable: String, message: String },
    #[error("The document did not contain enough keys to determine the path {0}")]
    UnresolvedPath(String),
    #[error("Not a bitemporal table: {0}")]
    NotBitemporal(String),
    #[error("Shape mismatch: {0}")]
    Shape(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, EncoderError>;

impl EncoderError {
    pub(crate) fn invalid(callable: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            callable: callable.to_string(),
            message: message.into(),
        }
    }
}

// Helper conversions
impl From<rusqlite::Error> for EncoderError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<std::io::Error> for EncoderError {
    fn from(e: std::io::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<serde_json::Error> for EncoderError {
    fn from(e: serde_json::Error) -> Self { Self::DataCorruption { message: e.to_string() } }
}
impl From<config::ConfigError> for EncoderError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<ndarray::ShapeError> for EncoderError {
    fn from(e: ndarray::ShapeError) -> Self { Self::Shape(e.to_string()) }
}
