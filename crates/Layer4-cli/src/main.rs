//! Anvil CLI - Main entry point

mod cli;
mod commands;
mod confirm;
mod repl;

use anvil_agent::Orchestrator;
use anvil_foundation::{AgentConfig, CapabilityKind, Error};
use anvil_provider::OpenAiCompatClient;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 설정 오류 종료 코드
const EXIT_CONFIG: i32 = 2;

/// Anvil - a command agent that extends itself when a capability is missing
#[derive(Parser, Debug)]
#[command(name = "anvil")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Run a single request and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// API key for the LLM endpoint
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long)]
    api_host: Option<String>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Working directory (commands run here)
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Session state file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Config file (default: ./anvil.toml, then the global config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered capabilities
    Capabilities {
        /// Only show one kind (builtin, command, plugin, template, environment-def)
        #[arg(long)]
        kind: Option<CapabilityKind>,
    },
    /// Print the policy verdict for a command without running it
    Check {
        /// Command to check
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => exit_config(&e),
    };

    match &args.command {
        Some(Command::Capabilities { kind }) => {
            commands::capabilities(&config, *kind)?;
            return Ok(());
        }
        Some(Command::Check { command }) => {
            commands::check(&config, &command.join(" "))?;
            return Ok(());
        }
        None => {}
    }

    if let Err(e) = config.validate() {
        exit_config(&e);
    }

    let llm = OpenAiCompatClient::from_settings(&config.llm)
        .map_err(|e| anyhow::anyhow!("failed to create LLM client: {}", e))?;
    let mut agent = Orchestrator::from_config(&config, Arc::new(llm))?;
    if let Err(e) = agent.load() {
        eprintln!("warning: could not load session state: {}", e);
    }

    match args.prompt {
        Some(prompt) => cli::run_once(agent, &prompt).await,
        None => repl::run(agent).await,
    }
}

/// RUST_LOG가 있으면 그대로, 없으면 --verbose/--quiet
fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// 기본값 → 설정 파일 → 환경 변수 → CLI 플래그
fn load_config(args: &Args) -> anvil_foundation::Result<AgentConfig> {
    let working_dir = match &args.working_dir {
        Some(dir) => std::fs::canonicalize(dir).map_err(|e| {
            Error::Config(format!("working directory {}: {}", dir.display(), e))
        })?,
        None => std::env::current_dir()?,
    };

    let mut config = AgentConfig::load(args.config.as_deref(), &working_dir)?;
    config.paths.working_dir = working_dir;
    apply_flags(&mut config, args);
    Ok(config)
}

fn apply_flags(config: &mut AgentConfig, args: &Args) {
    if let Some(key) = &args.api_key {
        config.llm.api_key = Some(key.clone());
    }
    if let Some(host) = &args.api_host {
        config.llm.api_host = host.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(path) = &args.state_file {
        config.paths.state_file = path.clone();
    }
    if let Some(secs) = args.timeout {
        config.executor.timeout_secs = secs;
    }
}

fn exit_config(error: &Error) -> ! {
    eprintln!("configuration error: {}", error.reason());
    std::process::exit(EXIT_CONFIG)
}

/// 표시용 경로 (작업 디렉토리 기준 상대 경로)
pub(crate) fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}
