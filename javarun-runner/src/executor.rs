use crate::process::{exit_code_of, launch_error};
use javarun_core::{Invocation, JavarunError, ProcessResult, Result};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use chrono::Utc;
use tracing::{error, info};

/// Launches an invocation and blocks until the child exits
#[derive(Debug, Clone, Default)]
pub struct Invoker;

impl Invoker {
    pub fn new() -> Self {
        Self
    }

    /// Locate the executable the way a shell would, honouring an overridden `PATH`
    pub fn resolve_program(&self, invocation: &Invocation) -> Result<PathBuf> {
        let search_path: Option<OsString> = invocation
            .env
            .iter()
            .rev()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| OsString::from(value))
            .or_else(|| env::var_os("PATH"));

        let cwd = match invocation.working_dir {
            Some(ref dir) => dir.clone(),
            None => env::current_dir()?,
        };

        which::which_in(&invocation.program, search_path, cwd).map_err(|e| {
            error!(
                invocation_id = %invocation.id,
                program = %invocation.program,
                error = %e,
                "Executable not found"
            );
            JavarunError::ExecutableNotFound(invocation.program.clone())
        })
    }

    /// Build a ready-to-spawn command for `invocation`
    pub(crate) fn prepare(&self, invocation: &Invocation) -> Result<Command> {
        if let Some(ref dir) = invocation.working_dir {
            if !dir.is_dir() {
                return Err(JavarunError::ExecutionFailure(format!(
                    "Working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        let program = self.resolve_program(invocation)?;
        let mut command = Command::new(program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(ref dir) = invocation.working_dir {
            command.current_dir(dir);
        }
        Ok(command)
    }

    /// Run to completion, capturing exit code, stdout and stderr.
    ///
    /// A non-zero exit is reported in the result, not as an error.
    pub fn run(&self, invocation: &Invocation) -> Result<ProcessResult> {
        let mut command = self.prepare(invocation)?;

        info!(
            invocation_id = %invocation.id,
            command = %invocation.command_line(),
            "Launching process"
        );

        let started_at = Utc::now();
        let start_instant = Instant::now();

        let output = command.output().map_err(|e| {
            error!(
                invocation_id = %invocation.id,
                program = %invocation.program,
                error = %e,
                "Process launch failed"
            );
            launch_error(&invocation.program, e)
        })?;

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        let exit_code = exit_code_of(&output.status);

        info!(
            invocation_id = %invocation.id,
            exit_code,
            duration_ms,
            "Process exited"
        );

        Ok(ProcessResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            started_at,
            duration_ms,
        })
    }
}
