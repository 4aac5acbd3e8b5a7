//! Error types for bootrun
//!
//! Error messages are shown to the operator verbatim, so they name the file
//! or row at fault and, where useful, how to fix it.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bootrun
#[derive(Error, Debug)]
pub enum Error {
    // === Schema Errors ===
    #[error("Scenario schema mismatch in '{path}': {details}")]
    Schema { path: PathBuf, details: String },

    #[error("Unknown scenario column '{column}' (not a header of '{schema}')")]
    UnknownColumn { column: String, schema: PathBuf },

    #[error("Malformed scenario file '{path}': {details}")]
    MalformedScenarioFile { path: PathBuf, details: String },

    #[error("Expected a single row in '{0}', but found more than one")]
    MultipleScenarioRows(PathBuf),

    // === Configuration Errors ===
    #[error("Unknown action '{0}' in response definitions")]
    UnknownAction(String),

    #[error("Unknown condition '{0}' in response definitions")]
    UnknownCondition(String),

    #[error("Invalid parameters for action '{action}': {details}")]
    InvalidActionParams { action: String, details: String },

    #[error("Hotkey '{key}' is used for multiple descriptions: '{existing}' and '{conflicting}'")]
    HotkeyCollision {
        key: char,
        existing: String,
        conflicting: String,
    },

    #[error("Invalid response file '{path}': {details}")]
    MalformedResponseFile { path: PathBuf, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Template directory not found: '{name}' (looked in '{path}')")]
    MissingTemplate { name: String, path: PathBuf },

    // === Lifecycle Errors ===
    #[error("There are pending tests in '{0}'. Run them before enrolling new tests")]
    PendingTestsExist(PathBuf),

    #[error("No pending tests in '{0}'")]
    NoPendingTests(PathBuf),

    #[error("Test directory '{0}' has no boot id and none can be recovered from its name")]
    MissingBootId(PathBuf),

    #[error("Test '{0}' is already finalized and can no longer be changed")]
    AlreadyFinalized(PathBuf),

    // === External Command Errors ===
    #[error("Command '{command}' not found: {details}")]
    CommandNotFound { command: String, details: String },

    #[error("Command '{command}' failed: {details}")]
    CommandFailed { command: String, details: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable category code, one per class of failure the operator can hit
    pub fn code(&self) -> &'static str {
        match self {
            Error::Schema { .. } | Error::UnknownColumn { .. } => "SCHEMA_ERROR",
            Error::MalformedScenarioFile { .. } => "MALFORMED_SCENARIO_FILE",
            Error::MultipleScenarioRows(_) => "MULTIPLE_SCENARIO_ROWS",
            Error::UnknownAction(_)
            | Error::UnknownCondition(_)
            | Error::InvalidActionParams { .. }
            | Error::HotkeyCollision { .. }
            | Error::MalformedResponseFile { .. }
            | Error::Config(_)
            | Error::ConfigParse(_) => "CONFIGURATION_ERROR",
            Error::MissingTemplate { .. } => "MISSING_TEMPLATE",
            Error::PendingTestsExist(_) => "PENDING_TESTS_EXIST",
            Error::NoPendingTests(_) | Error::MissingBootId(_) | Error::AlreadyFinalized(_) => {
                "LIFECYCLE_ERROR"
            }
            Error::CommandNotFound { .. } | Error::CommandFailed { .. } => "COMMAND_FAILED",
            Error::Io(_) | Error::FileRead { .. } | Error::Csv(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create a schema mismatch error for a file
    pub fn schema(path: &Path, details: impl Into<String>) -> Self {
        Self::Schema {
            path: path.to_path_buf(),
            details: details.into(),
        }
    }

    /// Create a malformed scenario file error
    pub fn malformed_scenario(path: &Path, details: impl Into<String>) -> Self {
        Self::MalformedScenarioFile {
            path: path.to_path_buf(),
            details: details.into(),
        }
    }

    /// Create a malformed response file error
    pub fn malformed_responses(path: &Path, details: impl Into<String>) -> Self {
        Self::MalformedResponseFile {
            path: path.to_path_buf(),
            details: details.into(),
        }
    }

    /// Create an invalid action parameters error
    pub fn invalid_params(action: &str, details: impl Into<String>) -> Self {
        Self::InvalidActionParams {
            action: action.to_string(),
            details: details.into(),
        }
    }

    /// Create a command failure error
    pub fn command_failed(command: &str, details: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            details: details.into(),
        }
    }

    /// Create a file read error, keeping the path for the operator
    pub fn file_read(path: &Path, error: io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_taxonomy() {
        assert_eq!(
            Error::UnknownColumn {
                column: "result".into(),
                schema: PathBuf::from("scenarios.csv"),
            }
            .code(),
            "SCHEMA_ERROR"
        );
        assert_eq!(
            Error::HotkeyCollision {
                key: 'p',
                existing: "Passed [p]".into(),
                conflicting: "[P]ending".into(),
            }
            .code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            Error::PendingTestsExist(PathBuf::from("runtime/pending")).code(),
            "PENDING_TESTS_EXIST"
        );
        assert_eq!(
            Error::MultipleScenarioRows(PathBuf::from("scenario.csv")).code(),
            "MULTIPLE_SCENARIO_ROWS"
        );
    }

    #[test]
    fn test_hotkey_collision_message_names_both_descriptions() {
        let err = Error::HotkeyCollision {
            key: 'p',
            existing: "Passed [p]".into(),
            conflicting: "[P]ending".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Passed [p]"));
        assert!(msg.contains("[P]ending"));
    }
}
