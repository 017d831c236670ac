//! koboldbot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use koboldbot::agent::BotSession;
use koboldbot::config::Config;
use koboldbot::llm::KoboldClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "koboldbot")]
#[command(about = "Relays Discord chat to a local KoboldCpp inference server")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write logs to a daily rolling file in this directory instead of stdout
    #[arg(long)]
    log_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(&cli);

    tracing::info!("Starting koboldbot...");

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        Config::load().with_context(|| "failed to load configuration")?
    };

    let token = config
        .discord_token()
        .with_context(|| "DISCORD_TOKEN must be set")?
        .to_string();

    tracing::info!(
        bot = %config.bot.name,
        endpoint = %config.inference.endpoint,
        guild = config.bot.guild.as_deref().unwrap_or("<any>"),
        "configuration loaded"
    );

    let backend = KoboldClient::new(&config.inference)
        .with_context(|| "failed to initialize inference client")?;

    koboldbot::startup::verify_upstream(&backend, backend.endpoint())
        .await
        .with_context(|| "inference server health check failed")?;

    let session = Arc::new(BotSession::new(&config, backend));

    koboldbot::messaging::discord::run(&token, session, config.bot.guild.clone())
        .await
        .with_context(|| "discord client failed")?;

    tracing::info!("koboldbot stopped");
    Ok(())
}

fn init_logging(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    match &cli.log_dir {
        Some(log_dir) => {
            let appender = tracing_appender::rolling::daily(log_dir, "koboldbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
