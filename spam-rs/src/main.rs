//! spam-rs: Ensemble spam detection server and CLI

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use spam_rs::api::PredictResponse;
use spam_rs::config::{LogFormat, LoggingConfig};
use spam_rs::text::MboxReader;
use spam_rs::{ApiServer, Config, PredictionPipeline};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "spam-rs")]
#[command(version, about = "Ensemble spam detection service", long_about = None)]
struct Cli {
    /// Configuration file (TOML); development defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Classify one email file and print the verdict
    Check {
        /// Raw email or plain text file
        file: PathBuf,
    },
    /// Classify every message of an mbox file, one JSON line per message
    Mbox {
        /// Mbox file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    init_tracing(&config.logging);
    info!("Starting spam-rs v{}", env!("CARGO_PKG_VERSION"));
    match &cli.config {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file specified, using development defaults"),
    }

    let pipeline = Arc::new(PredictionPipeline::from_config(&config)?);

    match cli.command {
        Commands::Serve => {
            let server = ApiServer::new(pipeline, &config.server);
            server.run().await?;
        }
        Commands::Check { file } => check_file(&pipeline, &file).await?,
        Commands::Mbox { file } => check_mbox(&pipeline, &file).await?,
    }

    Ok(())
}

/// Logs go to stderr so CLI output on stdout stays machine-readable
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("spam_rs={0},tower_http={0}", config.level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn check_file(pipeline: &PredictionPipeline, path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);

    let verdict = pipeline.predict(&content).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&PredictResponse::from(verdict))?
    );
    Ok(())
}

async fn check_mbox(pipeline: &PredictionPipeline, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = MboxReader::new(file);

    let mut total = 0usize;
    let mut spam = 0usize;

    for message in reader {
        let message = message?;
        total += 1;

        let mut line = json!({
            "from": message.from,
            "date": message.date,
            "recipients": message.recipients,
            "subject": message.subject,
            "category": message.category,
            "direction": message.direction,
        });

        match pipeline.predict(&message.content()).await {
            Ok(verdict) => {
                if verdict.is_spam {
                    spam += 1;
                }
                line["verdict"] = json!(PredictResponse::from(verdict));
            }
            Err(e) => {
                warn!("Message from {} not classified: {}", message.from, e);
                line["error"] = json!({ "code": e.code(), "message": e.to_string() });
            }
        }
        println!("{}", line);
    }

    info!("Classified {} messages, {} spam", total, spam);
    Ok(())
}
