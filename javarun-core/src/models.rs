use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

/// Captured outcome of a finished child process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Two-line summary: exit code, then trimmed stdout
    pub fn report(&self) -> Report<'_> {
        Report(self)
    }
}

/// Display adapter printing `Exit code: <n>` and `STDOUT: <text>`
pub struct Report<'a>(&'a ProcessResult);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Exit code: {}", self.0.exit_code)?;
        write!(f, "STDOUT: {}", self.0.stdout.trim())
    }
}

/// Where the JVM finds the code to run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JavaTarget {
    Classpath { dir: PathBuf, main_class: String },
    Jar { path: PathBuf },
}

impl JavaTarget {
    pub fn classpath<P: AsRef<Path>>(dir: P, main_class: impl Into<String>) -> Self {
        JavaTarget::Classpath {
            dir: dir.as_ref().to_path_buf(),
            main_class: main_class.into(),
        }
    }

    pub fn jar<P: AsRef<Path>>(path: P) -> Self {
        JavaTarget::Jar {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Leading JVM arguments selecting this target
    pub fn to_args(&self) -> Vec<String> {
        match self {
            JavaTarget::Classpath { dir, main_class } => vec![
                "-cp".to_string(),
                dir.display().to_string(),
                main_class.clone(),
            ],
            JavaTarget::Jar { path } => vec!["-jar".to_string(), path.display().to_string()],
        }
    }
}

/// A fully built command, ready to launch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    pub id: Uuid,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_target(self, target: &JavaTarget) -> Self {
        self.args(target.to_args())
    }

    pub fn with_working_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering for log lines
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
