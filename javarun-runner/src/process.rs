// Process launch settings and helpers shared by the invoker and the bridge

use javarun_core::{Invocation, JavarunError};
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Settings layered onto every invocation a bridge builds
#[derive(Debug, Clone, Default)]
pub struct ProcessConfig {
    /// Applies to streaming calls only; blocking calls wait for exit
    pub timeout: Option<Duration>,
    pub env: Vec<(String, String)>,
    pub working_directory: Option<PathBuf>,
}

impl ProcessConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn apply(&self, mut invocation: Invocation) -> Invocation {
        for (key, value) in &self.env {
            invocation = invocation.with_env(key.clone(), value.clone());
        }
        if let Some(ref dir) = self.working_directory {
            invocation = invocation.with_working_dir(dir);
        }
        invocation
    }
}

/// Numeric exit status; signal terminations map to the negated signal number
pub fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

/// Classify a spawn failure
pub fn launch_error(program: &str, err: io::Error) -> JavarunError {
    match err.kind() {
        io::ErrorKind::NotFound => JavarunError::ExecutableNotFound(program.to_string()),
        _ => JavarunError::ExecutionFailure(format!("Failed to start {}: {}", program, err)),
    }
}
