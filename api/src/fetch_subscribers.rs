use std::path::PathBuf;

use anyhow::Result;
use brevo_mailer::{
    brevo::BrevoClient,
    config::{BrevoConfig, Workspace},
    loader::subscribers::{fetch_subscribers, save_subscribers, DEFAULT_SUBSCRIBER_LIMIT},
    telemetry,
};
use clap::Parser;

/// Fetch subscribers from Brevo and save them as JSON.
#[derive(Debug, Parser)]
struct Args {
    /// Output file. Defaults to subscribers.json under the root folder
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Maximum number of subscribers to fetch
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init(None)?;
    let args = Args::parse();

    let workspace = Workspace::from_env(&args.root);
    let client = BrevoClient::new(&BrevoConfig::from_env()?)?;

    let subscribers = fetch_subscribers(&client, Some(args.limit)).await?;
    tracing::info!("Found {} subscribers", subscribers.len());

    let output = args
        .output
        .unwrap_or_else(|| workspace.subscribers_file());
    save_subscribers(&output, &subscribers).await?;
    Ok(())
}
