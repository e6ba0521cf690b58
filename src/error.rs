use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VpicError {
    #[error("no project selected")]
    #[diagnostic(help("pass --project <name> or create one with `vpic project create`"))]
    NoProjectSelected,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("image name is required")]
    MissingName,

    #[error("invalid project folder: {0}")]
    InvalidFolder(String),

    #[error("corrupt JSON in {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("confirmation required: {0}")]
    #[diagnostic(help("re-run with --yes to confirm"))]
    ConfirmationRequired(String),

    #[error("batch import: {0}")]
    WorkflowState(String),

    #[error("terminal error: {0}")]
    Terminal(String),
}

impl VpicError {
    pub(crate) fn fs(err: impl std::fmt::Display) -> Self {
        VpicError::Filesystem(err.to_string())
    }
}
