//! CLI binary for jarvis.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use jarvis::session::{self, Session};
use jarvis::{Assistant, AssistantConfig};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long blocking work may delay exit once the session has ended.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// J.A.R.V.I.S.: a text and voice command assistant.
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Start an interactive session.
    Chat,

    /// Process a single input and print the reply.
    Ask {
        /// The input, as it would be typed at the prompt.
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the prompt.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jarvis=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AssistantConfig::default_config_path);

    let explicit = cli.config.is_some();
    let command = cli.command.unwrap_or(Command::Chat);
    if let Command::InitConfig { force } = command {
        return init_config(&config_path, force);
    }
    let config = load_config(&config_path, explicit)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        match command {
            Command::Ask { text } => run_ask(config, &text.join(" ")).await,
            _ => run_chat(config).await,
        }
    });
    // A handler still blocked after an interrupt must not keep the process alive.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config(path: &Path, explicit: bool) -> anyhow::Result<AssistantConfig> {
    if explicit || path.exists() {
        info!(path = %path.display(), "loading config");
        AssistantConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        Ok(AssistantConfig::default())
    }
}

async fn run_chat(config: AssistantConfig) -> anyhow::Result<()> {
    let display_name = config.assistant.display_name.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let assistant = Assistant::from_config(&config, tx.clone());

    let mut session = Session::new(
        assistant.dispatcher().clone(),
        display_name,
        std::io::stdout(),
    )
    .with_voice(assistant.voice().clone());
    session.print_banner()?;

    session::forward_interrupts(session.interrupt_token());
    session::spawn_line_reader(BufReader::new(std::io::stdin()), tx)?;

    let end = session.run(&mut rx).await?;
    info!(?end, "session ended");
    assistant.shutdown();
    Ok(())
}

async fn run_ask(config: AssistantConfig, text: &str) -> anyhow::Result<()> {
    let display_name = config.assistant.display_name.clone();
    let (tx, _rx) = mpsc::unbounded_channel();
    let assistant = Assistant::from_config(&config, tx);
    let reply = assistant.dispatcher().process(text).await;
    println!("{display_name}: {reply}");
    assistant.shutdown();
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    AssistantConfig::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
