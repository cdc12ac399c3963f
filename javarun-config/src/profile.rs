use javarun_core::{Invocation, JavaTarget, JavarunError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

const DEFAULT_PROGRAM: &str = "java";
const FIXED_MAIN_CLASS: &str = "helloworlds.HelloWorld";
const FIXED_LABEL: &str = "Kadu Coin II";

/// Resolved description of what to launch
#[derive(Debug, Clone, PartialEq)]
pub struct InvokerProfile {
    pub program: String,
    pub target: Option<JavaTarget>,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

/// On-disk shape of a profile, before path resolution
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    program: Option<String>,
    classpath: Option<PathBuf>,
    main_class: Option<String>,
    jar: Option<PathBuf>,
    #[serde(default)]
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

impl InvokerProfile {
    /// The built-in action: run `helloworlds.HelloWorld` from `<base_dir>/../java`.
    ///
    /// The classpath is normalised lexically, so `/srv/app/cli` yields `/srv/app/java`.
    /// The binary passes its crate directory as recorded at build time; symlinks are
    /// not resolved.
    pub fn fixed<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            target: Some(JavaTarget::classpath(
                normalize(&base_dir.as_ref().join("..").join("java")),
                FIXED_MAIN_CLASS,
            )),
            args: vec![FIXED_LABEL.to_string()],
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn to_invocation(&self) -> Invocation {
        let mut invocation = Invocation::new(self.program.clone());
        if let Some(ref target) = self.target {
            invocation = invocation.with_target(target);
        }
        invocation = invocation.args(self.args.iter().cloned());
        if let Some(ref dir) = self.working_dir {
            invocation = invocation.with_working_dir(dir);
        }
        for (key, value) in &self.env {
            invocation = invocation.with_env(key.clone(), value.clone());
        }
        invocation
    }
}

/// Parse a TOML profile; relative paths resolve against `base_dir`
pub fn parse_config<P: AsRef<Path>>(input: &str, base_dir: P) -> Result<InvokerProfile> {
    let raw: RawProfile = toml::from_str(input)
        .map_err(|e| JavarunError::InvalidConfiguration(e.to_string()))?;
    let base_dir = base_dir.as_ref();

    let target = match (raw.jar, raw.classpath, raw.main_class) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(JavarunError::InvalidConfiguration(
                "`jar` cannot be combined with `classpath` or `main_class`".to_string(),
            ));
        }
        (Some(jar), None, None) => Some(JavaTarget::jar(resolve(base_dir, &jar))),
        (None, Some(dir), Some(main_class)) => {
            Some(JavaTarget::classpath(resolve(base_dir, &dir), main_class))
        }
        (None, Some(_), None) => {
            return Err(JavarunError::InvalidConfiguration(
                "`classpath` requires `main_class`".to_string(),
            ));
        }
        (None, None, Some(_)) => {
            return Err(JavarunError::InvalidConfiguration(
                "`main_class` requires `classpath`".to_string(),
            ));
        }
        (None, None, None) => None,
    };

    let program = match raw.program {
        Some(program) if program.trim().is_empty() => {
            return Err(JavarunError::InvalidConfiguration(
                "`program` must not be empty".to_string(),
            ));
        }
        Some(program) => program,
        None => DEFAULT_PROGRAM.to_string(),
    };

    Ok(InvokerProfile {
        program,
        target,
        args: raw.args,
        working_dir: raw.working_dir.map(|dir| resolve(base_dir, &dir)),
        env: raw.env.into_iter().collect(),
    })
}

/// Load a profile from disk, resolving paths against the file's directory
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<InvokerProfile> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&content, base_dir)
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base_dir.join(path))
    }
}

/// Fold `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}
