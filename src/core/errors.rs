//! Error types for the badcode-rs library.
//!
//! Mining and postprocessing tolerate most failures locally (a blob that does
//! not parse is skipped, a commit with an odd topology is skipped). The
//! variants here cover what does propagate: unreadable configuration, corrupt
//! persisted stages, repository access and transport problems.

use std::io;
use std::str::Utf8Error;

use thiserror::Error;

/// Main result type for badcode operations.
pub type Result<T> = std::result::Result<T, BadcodeError>;

/// Error type for all badcode operations.
#[derive(Error, Debug)]
pub enum BadcodeError {
    /// I/O related errors (file operations, network, etc.)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Parse service failures
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Language the parser was configured for
        language: String,
        /// Error description
        message: String,
        /// File path being parsed
        file_path: Option<String>,
    },

    /// Version-control access errors
    #[error("Repository error: {message}")]
    Vcs {
        /// Error description
        message: String,
        /// Repository name, when known
        repository: Option<String>,
        /// Underlying git error
        #[source]
        source: Option<git2::Error>,
    },

    /// Postprocessing pipeline errors
    #[error("Pipeline error at stage '{stage}': {message}")]
    Pipeline {
        /// Pipeline stage where error occurred
        stage: String,
        /// Error description
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },

    /// Unsupported operation or feature
    #[error("Unsupported: {message}")]
    Unsupported {
        /// Error description
        message: String,
    },
}

/// Constructor helpers for [`BadcodeError`].
impl BadcodeError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a new parse error for a specific file
    pub fn parse_in_file(
        language: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: Some(file_path.into()),
        }
    }

    /// Create a new repository error
    pub fn vcs(message: impl Into<String>) -> Self {
        Self::Vcs {
            message: message.into(),
            repository: None,
            source: None,
        }
    }

    /// Create a new repository error tied to a named repository
    pub fn vcs_in_repo(
        message: impl Into<String>,
        repository: impl Into<String>,
        source: git2::Error,
    ) -> Self {
        Self::Vcs {
            message: message.into(),
            repository: Some(repository.into()),
            source: Some(source),
        }
    }

    /// Create a new pipeline error
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            data_type: Some(data_type.into()),
            source: None,
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. } | Self::Pipeline { message, .. } => {
                *message = format!("{}: {}", context.into(), message);
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for BadcodeError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for BadcodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for BadcodeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<bincode::Error> for BadcodeError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization {
            message: format!("Binary encoding failed: {err}"),
            data_type: Some("bincode".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<git2::Error> for BadcodeError {
    fn from(err: git2::Error) -> Self {
        Self::Vcs {
            message: err.message().to_string(),
            repository: None,
            source: Some(err),
        }
    }
}

impl From<Utf8Error> for BadcodeError {
    fn from(err: Utf8Error) -> Self {
        Self::parse("unknown", format!("UTF-8 encoding error: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<BadcodeError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BadcodeError::config("Invalid configuration");
        assert!(matches!(err, BadcodeError::Config { .. }));

        let err = BadcodeError::parse("go", "Syntax error");
        assert!(matches!(err, BadcodeError::Parse { .. }));
    }

    #[test]
    fn test_error_with_context() {
        let err = BadcodeError::internal("Something went wrong").with_context("During merge");

        if let BadcodeError::Internal { context, .. } = err {
            assert_eq!(context, Some("During merge".to_string()));
        } else {
            panic!("Expected Internal error");
        }
    }

    #[test]
    fn test_io_context_is_prefixed() {
        let result: std::result::Result<(), io::Error> = Err(io::Error::new(
            io::ErrorKind::NotFound,
            "missing",
        ));

        let err = result
            .with_context(|| "Loading stats.db".to_string())
            .unwrap_err();
        if let BadcodeError::Io { message, source } = err {
            assert!(message.starts_with("Loading stats.db"));
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        } else {
            panic!("Expected Io error");
        }
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = BadcodeError::pipeline("ranked", "unreadable state file");
        let display = format!("{err}");
        assert!(display.contains("ranked"));
        assert!(display.contains("unreadable state file"));
    }

    #[test]
    fn test_config_field_error() {
        let err = BadcodeError::config_field("Invalid value", "extraction.max_depth");

        if let BadcodeError::Config { message, field } = err {
            assert_eq!(message, "Invalid value");
            assert_eq!(field, Some("extraction.max_depth".to_string()));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_from_git_error() {
        let git_err = git2::Error::from_str("reference not found");
        let err: BadcodeError = git_err.into();
        assert!(matches!(err, BadcodeError::Vcs { .. }));
        assert!(format!("{err}").contains("reference not found"));
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<i32>("invalid: yaml: content").unwrap_err();
        let err: BadcodeError = yaml_err.into();

        if let BadcodeError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("YAML".to_string()));
        } else {
            panic!("Expected Serialization error");
        }
    }

    #[test]
    fn test_from_utf8_error() {
        let invalid_utf8 = vec![0, 159, 146, 150];
        let utf8_err = std::str::from_utf8(&invalid_utf8).unwrap_err();
        let err: BadcodeError = utf8_err.into();

        assert!(matches!(err, BadcodeError::Parse { .. }));
    }
}
