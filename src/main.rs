use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use feed_digest::config::{CredentialsConfig, DigestConfig};
use feed_digest::fetcher::{FetchConfig, HttpFeedSource};
use feed_digest::notify::{GmailNotifier, Notifier, SmtpNotifier};
use feed_digest::pipeline::{DigestPipeline, RunOutcome, SkipReason};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmailService {
    /// Quiet mode: render the digest but deliver nothing.
    None,
    Smtp,
    Google,
}

#[derive(Debug, Parser)]
#[command(name = "feed-digest", version, about = "Feed-to-HTML digest mailer")]
struct Cli {
    /// Feed URL
    #[arg(short, long)]
    url: String,

    /// YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Email service name (none if quiet mode)
    #[arg(short = 's', long = "email-service", value_enum, default_value_t = EmailService::None)]
    email_service: EmailService,

    /// Log file path
    #[arg(short = 'l', long = "log")]
    log: Option<PathBuf>,

    /// Force feed processing even if the feed was already processed
    #[arg(short = 'i', long = "ignore-tracker")]
    ignore_tracker: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    match &cli.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .init();
        }
    }
    Ok(())
}

fn build_notifier(
    service: EmailService,
    credentials: &CredentialsConfig,
) -> anyhow::Result<Option<Box<dyn Notifier>>> {
    match service {
        EmailService::None => Ok(None),
        EmailService::Smtp => {
            let (Some(host), Some(port), Some(login), Some(password)) = (
                credentials.host.as_deref(),
                credentials.port,
                credentials.login.clone(),
                credentials.password.clone(),
            ) else {
                bail!("SMTP backend requires credentials.host, port, login and password");
            };
            let notifier = SmtpNotifier::new(host, port, login, password)
                .context("cannot configure SMTP transport")?;
            Ok(Some(Box::new(notifier)))
        }
        EmailService::Google => {
            let Some(file) = credentials.file.as_deref() else {
                bail!("google backend requires credentials.file");
            };
            let notifier =
                GmailNotifier::new(file).context("cannot configure mail API client")?;
            Ok(Some(Box::new(notifier)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    info!("Program started");

    // Configuration and backend problems are fatal; pipeline failures below
    // are advisory and never change the exit code.
    let config = DigestConfig::load(&cli.config)?;
    let notifier = build_notifier(cli.email_service, &config.credentials)?;
    let source = HttpFeedSource::new(&FetchConfig::default())
        .context("cannot build HTTP client")?;

    let pipeline = DigestPipeline::new(config, Box::new(source), notifier);
    match pipeline.run(&cli.url, cli.ignore_tracker).await {
        Ok(RunOutcome::Completed {
            digest_path,
            notified,
        }) => {
            info!(
                "Digest written to {} (notified: {})",
                digest_path.display(),
                notified
            );
        }
        Ok(RunOutcome::Skipped(SkipReason::NoEntries)) => info!("Nothing to do: feed was empty"),
        Ok(RunOutcome::Skipped(SkipReason::AlreadyProcessed)) => {
            info!("Nothing to do: feed already processed")
        }
        Err(e) => error!("Pipeline run failed: {}", e),
    }

    info!("Program terminated successfully");
    Ok(())
}
