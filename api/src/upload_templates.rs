use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use brevo_mailer::{
    brevo::BrevoClient,
    config::{notification_email, BrevoConfig, Sender, Workspace},
    sink::{EmailReport, JsonSnapshot, Sinks, SummaryLog},
    telemetry,
    uploader::{self, UploadOptions},
};
use chrono::Utc;
use clap::Parser;

const LOG_PREFIX: &str = "template-upload";

/// Upload every html file in email-templates/ as a Brevo template.
#[derive(Debug, Parser)]
struct Args {
    /// Root folder holding email-templates/ and email-logs/
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Text appended to every generated subject line
    #[arg(long, default_value = "Newsletter")]
    subject_suffix: String,
    /// Pause between two uploads, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
    /// Leave uploaded files in place instead of moving them to sent/
    #[arg(long)]
    keep_files: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let workspace = Workspace::from_env(&args.root);
    let today = Utc::now().date_naive();
    telemetry::init(Some(&workspace.log_file(LOG_PREFIX, today)))?;

    tracing::info!("Starting Brevo template upload process...");
    if let Err(err) = run(&args, &workspace).await {
        tracing::error!(message = "template upload failed", error = ?err);
        tracing::info!("NOTIFICATION: {} Failed - {}", uploader::TITLE, err);
        return Err(err);
    }
    tracing::info!("Template upload process completed successfully");
    Ok(())
}

async fn run(args: &Args, workspace: &Workspace) -> Result<()> {
    let config = BrevoConfig::from_env()?;
    let sender = Sender::from_env()?;
    let client = BrevoClient::new(&config)?;
    let today = Utc::now().date_naive();

    let mut sinks = Sinks::new()
        .with(SummaryLog)
        .with(JsonSnapshot::new(workspace.results_file(LOG_PREFIX, today)));
    match notification_email() {
        Some(to) => sinks = sinks.with(EmailReport::try_init(client.clone(), sender.clone(), to)?),
        None => tracing::info!(
            "Notification email not configured. \
             Set NOTIFICATION_EMAIL environment variable to enable."
        ),
    }

    let options = UploadOptions {
        subject_suffix: args.subject_suffix.clone(),
        delay: Duration::from_millis(args.delay_ms),
        move_sent: !args.keep_files,
    };
    uploader::upload_templates(client, &sender, workspace, &options, &sinks).await?;
    Ok(())
}
