use crate::runner::CapturedOutput;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BcExtractorError {
    #[error("Invalid input '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Failed to start extraction tool {program}: {source}")]
    ExecutionFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to capture extraction tool output: {message}")]
    CaptureFailure {
        message: String,
        captured: CapturedOutput,
    },

    #[error("Failed to collect outputs from {path}: {message}")]
    OutputCollectionFailure { path: String, message: String },

    #[error("Job was cancelled: {reason}")]
    Cancelled {
        reason: String,
        captured: CapturedOutput,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Manifest error: {message}")]
    Manifest { message: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workspace already exists and is not empty: {path}")]
    WorkspaceExists { path: String },

    #[error("Permission denied: {path}")]
    Permission { path: String },
}

/// Failure classes reported to the caller of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ExecutionFailure,
    OutputCollectionFailure,
    Cancelled,
    /// Host-side problems (configuration, workspace, manifest writing).
    /// Never produced by the job handler itself.
    Environment,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ExecutionFailure => "execution failure",
            ErrorKind::OutputCollectionFailure => "output collection failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Environment => "environment error",
        };
        f.write_str(label)
    }
}

impl BcExtractorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BcExtractorError::InvalidInput { .. } => ErrorKind::InvalidInput,
            BcExtractorError::ExecutionFailure { .. } | BcExtractorError::CaptureFailure { .. } => {
                ErrorKind::ExecutionFailure
            }
            BcExtractorError::OutputCollectionFailure { .. } => ErrorKind::OutputCollectionFailure,
            BcExtractorError::Cancelled { .. } => ErrorKind::Cancelled,
            _ => ErrorKind::Environment,
        }
    }

    /// Output captured from the tool before the failure, if the error carries any.
    pub fn captured_output(&self) -> Option<&CapturedOutput> {
        match self {
            BcExtractorError::Cancelled { captured, .. }
            | BcExtractorError::CaptureFailure { captured, .. } => Some(captured),
            _ => None,
        }
    }

    pub(crate) fn invalid_input<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        BcExtractorError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for BcExtractorError {
    fn user_message(&self) -> String {
        match self {
            BcExtractorError::InvalidInput { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            BcExtractorError::ExecutionFailure { program, source } => {
                format!("Could not start extraction tool '{}': {}", program, source)
            }
            BcExtractorError::OutputCollectionFailure { path, .. } => {
                format!("Could not read tool output directory: {}", path)
            }
            BcExtractorError::Cancelled { reason, .. } => {
                format!("Extraction was cancelled ({})", reason)
            }
            BcExtractorError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            BcExtractorError::InvalidInput { .. } => Some(
                "Timestamps must look like 2020-01-01_00:00:00 and the BC table must be a readable file.".to_string()
            ),
            BcExtractorError::ExecutionFailure { .. } => Some(
                "Check [tool].executable in the configuration file and make sure it exists and is executable (or set [tool].interpreter for scripts).".to_string()
            ),
            BcExtractorError::OutputCollectionFailure { .. } => Some(
                "The extraction tool probably did not run; inspect the captured stderr for details.".to_string()
            ),
            BcExtractorError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            BcExtractorError::WorkspaceExists { .. } => Some(
                "Remove the existing directory, choose another one with --workdir, or use --force to clear it.".to_string()
            ),
            BcExtractorError::Permission { .. } => Some(
                "Ensure you have the necessary read/write permissions for the target directory.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for BcExtractorError {
    fn from(error: toml::de::Error) -> Self {
        BcExtractorError::Config {
            message: error.to_string(),
        }
    }
}

impl From<regex::Error> for BcExtractorError {
    fn from(error: regex::Error) -> Self {
        BcExtractorError::Config {
            message: format!("Invalid file name pattern: {}", error),
        }
    }
}

impl From<serde_json::Error> for BcExtractorError {
    fn from(error: serde_json::Error) -> Self {
        BcExtractorError::Manifest {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BcExtractorError>;
