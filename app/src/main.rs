use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use meetrag_core::config::{CompletionProvider, RagConfig};
use meetrag_core::error::AppError;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "meetrag", version, about = "Ask questions about recorded meetings")]
struct Cli {
    /// JSON config file; missing file means defaults.
    #[arg(long, env = "MEETRAG_CONFIG", default_value = "meetrag.json")]
    config: PathBuf,

    /// Directory holding meeting analysis artifacts (overrides the config file).
    #[arg(long, env = "MEETRAG_ARTIFACTS")]
    artifacts: Option<PathBuf>,

    /// Completion provider (overrides the config file).
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List meetings found in the artifact directory
    Meetings,
    /// Ask one question about a meeting
    Ask { meeting: String, question: String },
    /// Interactive session; `/clear` resets the conversation, EOF ends it
    Chat { meeting: String },
    /// Check that the local Ollama server answers
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Ollama,
    OpenaiCompat,
}

impl From<ProviderArg> for CompletionProvider {
    fn from(p: ProviderArg) -> Self {
        match p {
            ProviderArg::Ollama => CompletionProvider::Ollama,
            ProviderArg::OpenaiCompat => CompletionProvider::OpenaiCompat,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("warning: logging not initialised: {e}");
    }
}

fn load_config(cli: &Cli) -> Result<RagConfig, AppError> {
    let mut config = RagConfig::load(&cli.config)?;
    if let Some(dir) = &cli.artifacts {
        config.artifacts_dir = dir.clone();
    }
    if let Some(p) = cli.provider {
        config.completion.provider = p.into();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    if let Command::Health = cli.command {
        let status = commands::ai_health_check(&config).await?;
        return commands::print(&status, cli.json, |s| s.message.clone());
    }

    let qa = commands::build_service(config)?;
    let result = match &cli.command {
        Command::Meetings => commands::list_meetings(&qa, cli.json).await,
        Command::Ask { meeting, question } => commands::ask(&qa, meeting, question, cli.json).await,
        Command::Chat { meeting } => commands::chat(&qa, meeting, cli.json).await,
        Command::Health => Ok(()),
    };
    qa.shutdown();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(d) = &e.details {
                eprintln!("  details: {d}");
            }
            if e.retryable {
                eprintln!("  (retryable)");
            }
            ExitCode::FAILURE
        }
    }
}
