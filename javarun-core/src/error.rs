use thiserror::Error;

#[derive(Error, Debug)]
pub enum JavarunError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Execution error: {0}")]
    ExecutionFailure(String),

    #[error("Process exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Process timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JavarunError>;
