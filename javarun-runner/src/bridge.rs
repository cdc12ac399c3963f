use crate::executor::Invoker;
use crate::process::{exit_code_of, launch_error, ProcessConfig};
use javarun_core::{Invocation, JavaTarget, JavarunError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Calls functions exposed by a `<Class>.jar` proxy: `java -jar <jar> <function> <json>`
#[derive(Debug, Clone)]
pub struct JavaBridge {
    java: String,
    class_name: String,
    jar_file: PathBuf,
    config: ProcessConfig,
    invoker: Invoker,
}

impl JavaBridge {
    /// `proxy_dir` is resolved against `base_dir` when relative
    pub fn new<B, P>(base_dir: B, proxy_dir: P, class_name: impl Into<String>) -> Self
    where
        B: AsRef<Path>,
        P: AsRef<Path>,
    {
        let proxy_dir = proxy_dir.as_ref();
        let proxy_dir = if proxy_dir.is_absolute() {
            proxy_dir.to_path_buf()
        } else {
            base_dir.as_ref().join(proxy_dir)
        };
        let class_name = class_name.into();
        let jar_file = proxy_dir.join(format!("{}.jar", class_name));

        Self {
            java: "java".to_string(),
            class_name,
            jar_file,
            config: ProcessConfig::default(),
            invoker: Invoker::new(),
        }
    }

    /// Use a specific JVM launcher instead of `java` from `PATH`
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    pub fn with_config(mut self, config: ProcessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn jar_file(&self) -> &Path {
        &self.jar_file
    }

    pub fn invocation(&self, function_name: &str, json_arg: &Value) -> Invocation {
        let invocation = Invocation::new(self.java.clone())
            .with_target(&JavaTarget::jar(&self.jar_file))
            .arg(function_name)
            .arg(json_arg.to_string());
        self.config.apply(invocation)
    }

    /// Run one function call and return its full stdout
    pub fn execute(&self, function_name: &str, json_arg: &Value) -> Result<String> {
        let invocation = self.invocation(function_name, json_arg);
        let result = self.invoker.run(&invocation)?;

        if !result.success() {
            warn!(
                invocation_id = %invocation.id,
                class_name = %self.class_name,
                function = %function_name,
                exit_code = result.exit_code,
                "Bridge call failed"
            );
            return Err(JavarunError::NonZeroExit {
                code: result.exit_code,
                stderr: result.stderr,
            });
        }

        Ok(result.stdout)
    }

    /// Run one function call, handing each non-empty stdout line to `on_line` as it arrives
    pub async fn execute_streaming<F>(
        &self,
        function_name: &str,
        json_arg: &Value,
        mut on_line: F,
    ) -> Result<Vec<String>>
    where
        F: FnMut(&str),
    {
        let invocation = self.invocation(function_name, json_arg);
        let mut command = Command::from(self.invoker.prepare(&invocation)?);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            invocation_id = %invocation.id,
            command = %invocation.command_line(),
            "Launching streaming process"
        );

        let mut child = command
            .spawn()
            .map_err(|e| launch_error(&invocation.program, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            JavarunError::ExecutionFailure("Child stdout was not captured".to_string())
        })?;
        let invocation_id = invocation.id;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    warn!(
                        invocation_id = %invocation_id,
                        error = %e,
                        "Failed to read child stderr"
                    );
                }
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        let collect = async {
            let mut segments = BufReader::new(stdout).split(b'\n');
            let mut results = Vec::new();
            while let Some(mut segment) = segments.next_segment().await? {
                if segment.last() == Some(&b'\r') {
                    segment.pop();
                }
                if segment.is_empty() {
                    continue;
                }
                let line = String::from_utf8_lossy(&segment).to_string();
                debug!(invocation_id = %invocation.id, line = %line, "Received line");
                on_line(&line);
                results.push(line);
            }
            let status = child.wait().await?;
            Ok::<_, JavarunError>((status, results))
        };

        let (status, results) = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, collect).await {
                Ok(outcome) => outcome?,
                Err(_) => {
                    warn!(
                        invocation_id = %invocation.id,
                        timeout = ?limit,
                        "Streaming process timed out, killing it"
                    );
                    child.kill().await?;
                    return Err(JavarunError::Timeout(limit));
                }
            },
            None => collect.await?,
        };

        let stderr = join_stderr(stderr_task, invocation.id).await;
        let exit_code = exit_code_of(&status);

        info!(
            invocation_id = %invocation.id,
            exit_code,
            lines = results.len(),
            "Streaming process exited"
        );

        if exit_code != 0 {
            return Err(JavarunError::NonZeroExit {
                code: exit_code,
                stderr,
            });
        }

        Ok(results)
    }
}

/// Wait for the stderr reader; a failed task yields empty text plus a warning
async fn join_stderr(task: Option<JoinHandle<String>>, invocation_id: Uuid) -> String {
    match task {
        Some(task) => task.await.unwrap_or_else(|e| {
            warn!(
                invocation_id = %invocation_id,
                error = %e,
                "Stderr reader task failed"
            );
            String::new()
        }),
        None => String::new(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    /// Writes an executable shell script standing in for the JVM launcher
    fn fake_java(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("javarun-bridge-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("java");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn bridge(java: &Path) -> JavaBridge {
        JavaBridge::new("/opt/app", "proxies", "CalypsoProxy").with_java(java.display().to_string())
    }

    #[test]
    fn test_jar_path_resolution() {
        let relative = JavaBridge::new("/opt/app", "proxies", "CalypsoProxy");
        assert_eq!(relative.jar_file(), Path::new("/opt/app/proxies/CalypsoProxy.jar"));
        assert_eq!(relative.class_name(), "CalypsoProxy");

        let absolute = JavaBridge::new("/opt/app", "/srv/jars", "CalypsoProxy");
        assert_eq!(absolute.jar_file(), Path::new("/srv/jars/CalypsoProxy.jar"));
    }

    #[test]
    fn test_invocation_arguments() {
        let bridge = JavaBridge::new("/opt/app", "proxies", "CalypsoProxy");
        let invocation = bridge.invocation("getPrice", &json!({"asset": "ETH"}));
        assert_eq!(invocation.program, "java");
        assert_eq!(
            invocation.args,
            vec![
                "-jar",
                "/opt/app/proxies/CalypsoProxy.jar",
                "getPrice",
                r#"{"asset":"ETH"}"#,
            ]
        );
    }

    #[test]
    fn test_execute_returns_stdout() {
        let java = fake_java("execute", r#"printf '%s %s\n' "$3" "$4""#);
        let output = bridge(&java).execute("getPrice", &json!({"asset": "ETH"})).unwrap();
        assert_eq!(output, "getPrice {\"asset\":\"ETH\"}\n");
        fs::remove_dir_all(java.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_execute_non_zero_exit() {
        let java = fake_java("execute-fail", "echo boom 1>&2\nexit 3");
        let err = bridge(&java).execute("getPrice", &json!(null)).unwrap_err();
        match err {
            JavarunError::NonZeroExit { code, stderr } => {
                assert_eq!(code, 3);
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        fs::remove_dir_all(java.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_execute_missing_java() {
        let bridge = JavaBridge::new("/opt/app", "proxies", "CalypsoProxy")
            .with_java("javarun-definitely-missing-java");
        let err = bridge.execute("getPrice", &json!({})).unwrap_err();
        assert!(matches!(err, JavarunError::ExecutableNotFound(_)));
    }

    #[tokio::test]
    async fn test_streaming_collects_non_empty_lines() {
        let java = fake_java("stream", "echo first\necho\necho second");
        let mut seen = Vec::new();
        let lines = bridge(&java)
            .execute_streaming("subscribe", &json!({}), |line| seen.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(lines, vec!["first", "second"]);
        assert_eq!(seen, lines);
        fs::remove_dir_all(java.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_streaming_decodes_invalid_utf8_lossily() {
        let java = fake_java("stream-lossy", r"printf 'ok\r\n\377bad\nafter\n'");
        let lines = bridge(&java)
            .execute_streaming("subscribe", &json!({}), |_| {})
            .await
            .unwrap();

        assert_eq!(lines, vec!["ok", "\u{FFFD}bad", "after"]);
        fs::remove_dir_all(java.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_streaming_non_zero_exit() {
        let java = fake_java("stream-fail", "echo partial\necho broken 1>&2\nexit 4");
        let err = bridge(&java)
            .execute_streaming("subscribe", &json!({}), |_| {})
            .await
            .unwrap_err();

        match err {
            JavarunError::NonZeroExit { code, stderr } => {
                assert_eq!(code, 4);
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        fs::remove_dir_all(java.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_join_stderr_survives_failed_reader() {
        let id = Invocation::new("java").id;
        let failed: JoinHandle<String> = tokio::spawn(async { panic!("reader crashed") });
        assert_eq!(join_stderr(Some(failed), id).await, "");

        let ok = tokio::spawn(async { "boom\n".to_string() });
        assert_eq!(join_stderr(Some(ok), id).await, "boom\n");
        assert_eq!(join_stderr(None, id).await, "");
    }

    #[tokio::test]
    async fn test_streaming_timeout() {
        let java = fake_java("stream-timeout", "sleep 5");
        let config = ProcessConfig::default().with_timeout(Duration::from_millis(200));
        let err = bridge(&java)
            .with_config(config)
            .execute_streaming("subscribe", &json!({}), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, JavarunError::Timeout(_)));
        fs::remove_dir_all(java.parent().unwrap()).unwrap();
    }
}
