use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use brevo_mailer::{
    brevo::BrevoClient,
    config::{notification_email, BrevoConfig, Sender, Workspace},
    loader::subscribers::DEFAULT_SUBSCRIBER_LIMIT,
    mailer::{self, DailyEmailOptions},
    sink::{EmailReport, JsonSnapshot, Sinks, SummaryLog},
    telemetry,
};
use chrono::Utc;
use clap::Parser;

const LOG_PREFIX: &str = "email";

/// Fetch subscribers from Brevo and send them an email template.
#[derive(Debug, Parser)]
struct Args {
    /// Template to send. Defaults to the newest html file in
    /// email-templates/ready-to-send/, then email-templates/
    template: Option<PathBuf>,
    /// Root folder holding email-templates/ and email-logs/
    #[arg(long, default_value = ".")]
    root: PathBuf,
    #[arg(long, default_value = mailer::DEFAULT_SUBJECT)]
    subject: String,
    /// Maximum number of subscribers to email
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_LIMIT)]
    limit: usize,
    /// Send to a saved subscribers.json instead of fetching contacts
    #[arg(long)]
    subscribers_file: Option<PathBuf>,
    /// Pause between two sends, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
    /// Leave the template in place after sending
    #[arg(long)]
    keep_template: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let workspace = Workspace::from_env(&args.root);
    let today = Utc::now().date_naive();
    telemetry::init(Some(&workspace.log_file(LOG_PREFIX, today)))?;

    tracing::info!("Starting daily email process...");
    if let Err(err) = run(args, &workspace).await {
        tracing::error!(message = "daily email process failed", error = ?err);
        return Err(err);
    }
    tracing::info!("Daily email process completed successfully");
    Ok(())
}

async fn run(args: Args, workspace: &Workspace) -> Result<()> {
    let config = BrevoConfig::from_env()?;
    let sender = Sender::from_env()?;
    let client = BrevoClient::new(&config)?;
    let today = Utc::now().date_naive();

    let mut sinks = Sinks::new()
        .with(SummaryLog)
        .with(JsonSnapshot::new(workspace.results_file(LOG_PREFIX, today)));
    if let Some(to) = notification_email() {
        sinks = sinks.with(EmailReport::try_init(client.clone(), sender.clone(), to)?);
    }

    let options = DailyEmailOptions {
        template: args.template,
        subject: args.subject,
        limit: Some(args.limit),
        subscribers_file: args.subscribers_file,
        delay: Duration::from_millis(args.delay_ms),
        archive_template: !args.keep_template,
    };
    mailer::send_daily_email(client, &sender, workspace, &options, &sinks).await?;
    Ok(())
}
