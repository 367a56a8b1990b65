use thiserror::Error;

use crate::common::error::JobError::Specification;

#[derive(Debug, Error)]
pub enum JobError {
    /// A required field is missing or malformed. Never sent to the scheduler.
    #[error("Invalid job specification: {0}")]
    Specification(String),
    /// The scheduler refused the job. The message is its own diagnostic.
    #[error("Submission rejected by the scheduler: {0}")]
    SubmissionRejected(String),
    /// The parallel launcher could not be started.
    #[error("Launch failed: {0}")]
    LaunchFailure(String),
    /// The launched command finished unsuccessfully.
    #[error("Application failed: {}", describe_exit_code(.code))]
    ApplicationFailure { code: Option<i32> },
    #[error("Hook `{hook}` failed: {message}")]
    HookFailure { hook: String, message: String },
    #[error("Command `{command}` failed: {message}")]
    CommandError { command: String, message: String },
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl JobError {
    /// Exit code that should be reported by the process when this error ends it.
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::ApplicationFailure { code: Some(code) } if *code != 0 => *code,
            _ => 1,
        }
    }
}

pub fn describe_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by a signal".to_string(),
    }
}

impl From<serde_json::error::Error> for JobError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<anyhow::Error> for JobError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(error.to_string())
    }
}

impl From<toml::de::Error> for JobError {
    fn from(error: toml::de::Error) -> Self {
        Self::DeserializationError(error.to_string())
    }
}

pub fn spec_error<T>(message: impl Into<String>) -> crate::Result<T> {
    Err(Specification(message.into()))
}
