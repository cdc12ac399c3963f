use anyhow::Context;
use clap::{Parser, Subcommand};
use javarun_config::{load_config, InvokerProfile};
use javarun_core::ProcessResult;
use javarun_runner::{Invoker, JavaBridge, ProcessConfig};
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "javarun")]
#[command(about = "Run an external JVM program and report its exit code and output", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML profile describing what to launch (defaults to the built-in HelloWorld call)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full result as JSON instead of the two-line report
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a function exposed by a `<Class>.jar` proxy
    Call {
        /// Directory holding the proxy jar
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Proxy class name; the jar is `<dir>/<class>.jar`
        #[arg(short, long)]
        class: String,

        /// Function name passed to the proxy
        function: String,

        /// JSON argument passed to the proxy
        #[arg(default_value = "{}")]
        json_arg: String,

        /// Print stdout lines as they arrive
        #[arg(long)]
        stream: bool,

        /// Kill a streaming call after this many seconds
        #[arg(long, requires = "stream")]
        timeout: Option<u64>,

        /// JVM launcher to use
        #[arg(long, default_value = "java")]
        java: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            let profile = select_profile(cli.config.as_deref(), Path::new(env!("CARGO_MANIFEST_DIR")))?;
            run_profile(&profile, cli.json, &mut io::stdout().lock())?;
        }
        Some(Commands::Call {
            dir,
            class,
            function,
            json_arg,
            stream,
            timeout,
            java,
        }) => {
            let json_arg: serde_json::Value = serde_json::from_str(&json_arg)
                .with_context(|| format!("Invalid JSON argument: {}", json_arg))?;

            let mut config = ProcessConfig::default();
            if let Some(secs) = timeout {
                config = config.with_timeout(Duration::from_secs(secs));
            }

            let bridge = JavaBridge::new(env::current_dir()?, dir, class)
                .with_java(java)
                .with_config(config);

            info!(jar = %bridge.jar_file().display(), function = %function, "Calling proxy");

            if stream {
                bridge
                    .execute_streaming(&function, &json_arg, |line| println!("{}", line))
                    .await?;
            } else {
                print!("{}", bridge.execute(&function, &json_arg)?);
            }
        }
    }

    Ok(())
}

/// Load the profile named on the command line, or fall back to the built-in one
fn select_profile(config: Option<&Path>, base_dir: &Path) -> anyhow::Result<InvokerProfile> {
    match config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load profile at {}", path.display())),
        None => Ok(InvokerProfile::fixed(base_dir)),
    }
}

/// Launch the profile and write its report; nothing is written if the launch fails
fn run_profile<W: Write>(profile: &InvokerProfile, json: bool, out: &mut W) -> anyhow::Result<()> {
    let result = Invoker::new().run(&profile.to_invocation())?;
    writeln!(out, "{}", render(&result, json)?)?;
    Ok(())
}

fn render(result: &ProcessResult, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(result)?)
    } else {
        Ok(result.report().to_string())
    }
}
