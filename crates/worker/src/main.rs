//! relwatch worker: one cron-invoked command per batch job.

mod config;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use relwatch_core::batch::BatchReport;
use relwatch_core::schedule::DigestFrequency;
use relwatch_db::DbPool;
use relwatch_events::{
    DigestScheduler, EmailConfig, EmailDelivery, NoTrackingReminderScheduler, QueueSender,
    SuppressionEngine,
};
use relwatch_pipeline::{RateLimiter, Scanner, VersionAuditor, VersionChecker};
use relwatch_scraper::{
    AnthropicProvider, BrowserClient, ContentAcquirer, ExtractionEngine, StaticFetcher,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{ConfigError, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "relwatch-worker", about = "Release watch batch jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Scan today's slice of the catalog for new versions.
    CheckVersions {
        /// Rotation day, defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Re-scan stored versions and report disagreements.
    AuditVersions {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Queue digests for every user of one frequency.
    ScheduleDigests {
        #[arg(long, value_parser = parse_frequency)]
        frequency: DigestFrequency,
    },
    /// Queue the monthly reminder for users tracking nothing.
    ScheduleReminders,
    /// Send queued emails that are due.
    SendQueue,
    /// Feed provider webhook events to the suppression engine.
    IngestEvents {
        /// Read from a file instead of stdin. A JSON object or an array of them.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Hex HMAC-SHA256 of the raw input, checked against EMAIL_WEBHOOK_SECRET.
        #[arg(long)]
        signature: Option<String>,
    },
}

fn parse_frequency(raw: &str) -> Result<DigestFrequency, String> {
    DigestFrequency::parse(raw).ok_or_else(|| {
        let valid: Vec<&str> = DigestFrequency::ALL.iter().map(|f| f.as_str()).collect();
        format!("expected one of: {}", valid.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env()?;

    let pool = relwatch_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    relwatch_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    match cli.command {
        Command::Migrate => {
            relwatch_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
        }
        Command::CheckVersions { date } => {
            let checker = VersionChecker::new(pool, build_scanner(&config)?, config.check);
            let report = checker.run_once(date.unwrap_or_else(today)).await?;
            print_json(&report)?;
        }
        Command::AuditVersions { date } => {
            let auditor = VersionAuditor::new(pool, build_scanner(&config)?, config.check.batch_size);
            let report = auditor.run_once(date.unwrap_or_else(today)).await?;
            print_json(&report)?;
        }
        Command::ScheduleDigests { frequency } => {
            let report = DigestScheduler::new(pool)
                .run_once(frequency, Utc::now())
                .await?;
            print_json(&report)?;
        }
        Command::ScheduleReminders => {
            let report = NoTrackingReminderScheduler::new(pool)
                .run_once(Utc::now())
                .await?;
            print_json(&report)?;
        }
        Command::SendQueue => {
            let email_config = EmailConfig::from_env().ok_or(ConfigError::Missing("SMTP_HOST"))?;
            let delivery = EmailDelivery::new(email_config)?;
            let report = QueueSender::new(pool, Arc::new(delivery))
                .with_batch_size(config.send_batch_size)
                .with_rate(config.emails_per_second)
                .run_once(Utc::now())
                .await?;
            print_json(&report)?;
        }
        Command::IngestEvents { file, signature } => {
            let report = ingest_events(pool, &config, file, signature).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relwatch_worker=info,relwatch_events=info,relwatch_pipeline=info,relwatch_scraper=info"
                    .into()
            }),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_scanner(config: &WorkerConfig) -> anyhow::Result<Arc<Scanner>> {
    let browser = config
        .browser
        .clone()
        .map(BrowserClient::new)
        .transpose()?;
    if browser.is_none() {
        tracing::warn!("BROWSER_ENDPOINT not set, using static fetch only");
    }
    let acquirer = ContentAcquirer::new(browser, StaticFetcher::new(config.fetch_timeout())?);
    let provider = AnthropicProvider::new(config.anthropic()?)?;

    Ok(Arc::new(Scanner::new(
        acquirer,
        ExtractionEngine::new(Arc::new(provider)),
        Arc::new(RateLimiter::per_minute(config.browser_requests_per_minute)),
        Arc::new(RateLimiter::per_minute(config.llm_requests_per_minute)),
    )))
}

async fn ingest_events(
    pool: DbPool,
    config: &WorkerConfig,
    file: Option<PathBuf>,
    signature: Option<String>,
) -> anyhow::Result<BatchReport> {
    let raw = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let mut engine = SuppressionEngine::new(pool);
    if let Some(secret) = &config.webhook_secret {
        engine = engine.with_webhook_secret(secret.clone());
    }
    if let Some(signature) = &signature {
        engine.verify(raw.as_bytes(), signature)?;
    }

    let parsed = serde_json::from_str::<serde_json::Value>(&raw).context("Input is not valid JSON")?;
    let events = match parsed {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };

    let now = Utc::now();
    let mut report = BatchReport::new();
    for (index, event) in events.iter().enumerate() {
        let id = index as i64;
        match engine.handle_payload(&event.to_string(), None, now).await {
            Ok(outcome) => report.succeeded(id, Some(format!("{outcome:?}"))),
            Err(e) => {
                tracing::warn!(index, error = %e, "Delivery event rejected");
                report.failed(id, e);
            }
        }
    }
    Ok(report)
}
