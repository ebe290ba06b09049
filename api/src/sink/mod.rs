pub mod report_template;

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::{
    batch::{BatchSummary, OutcomeRecord},
    brevo::{EmailProvider, EmailRequest, Recipient},
    config::Sender,
};

use self::report_template::{ReportEngine, TeraReportEngine};

/// A finished batch run, as handed to result sinks.
#[derive(Debug)]
pub struct RunReport<'a> {
    pub title: &'a str,
    pub records: &'a [OutcomeRecord],
    pub summary: BatchSummary<'a>,
}

impl<'a> RunReport<'a> {
    pub fn new(title: &'a str, records: &'a [OutcomeRecord]) -> Self {
        Self {
            title,
            records,
            summary: BatchSummary::from_records(records),
        }
    }

    pub fn headline(&self) -> String {
        format!(
            "{}/{} successful",
            self.summary.success_count(),
            self.summary.total()
        )
    }
}

#[async_trait]
pub trait ResultSink {
    async fn publish(&self, report: &RunReport<'_>) -> Result<()>;
}

/// Fans a report out to every configured sink. A failing sink is logged and
/// skipped; it never changes the outcome of the run.
#[derive(Default)]
pub struct Sinks(Vec<Box<dyn ResultSink + Send + Sync>>);

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<S>(mut self, sink: S) -> Self
    where
        S: ResultSink + Send + Sync + 'static,
    {
        self.0.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub async fn publish(&self, report: &RunReport<'_>) -> usize {
        let mut failed = 0;
        for sink in &self.0 {
            if let Err(err) = sink.publish(report).await {
                failed += 1;
                tracing::warn!(message = "result sink failed", title = report.title, error = ?err);
            }
        }
        failed
    }
}

/// Writes the run summary to the log.
pub struct SummaryLog;

#[async_trait]
impl ResultSink for SummaryLog {
    async fn publish(&self, report: &RunReport<'_>) -> Result<()> {
        let summary = &report.summary;
        let rule = "=".repeat(50);

        tracing::info!("{}", rule);
        tracing::info!("{} SUMMARY", report.title.to_uppercase());
        tracing::info!("{}", rule);
        tracing::info!("Total: {}", summary.total());
        tracing::info!("Successful: {}", summary.success_count());
        tracing::info!("Failed: {}", summary.failure_count());

        if summary.success_count() > 0 {
            tracing::info!("Succeeded:");
            for record in summary.successes() {
                tracing::info!(
                    "- {} ({})",
                    record.source_item.identifier(),
                    record.identifier
                );
            }
        }
        if summary.failure_count() > 0 {
            tracing::info!("Failed:");
            for record in summary.failures() {
                tracing::info!(
                    "- {}: {}",
                    record.identifier,
                    record.error_message().unwrap_or_default()
                );
            }
        }

        tracing::info!(
            "NOTIFICATION: {} Complete - {}",
            report.title,
            report.headline()
        );
        Ok(())
    }
}

/// Saves the outcome records as pretty-printed JSON.
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultSink for JsonSnapshot {
    async fn publish(&self, report: &RunReport<'_>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(report.records)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("unable to write results to {}", self.path.display()))?;
        tracing::info!(message = "results saved", path = %self.path.display());
        Ok(())
    }
}

/// Emails an html report of the run through the provider.
pub struct EmailReport<P> {
    provider: P,
    sender: Sender,
    to: String,
    engine: TeraReportEngine,
}

impl<P> EmailReport<P>
where
    P: EmailProvider,
{
    pub fn try_init(provider: P, sender: Sender, to: String) -> Result<Self> {
        Ok(Self {
            provider,
            sender,
            to,
            engine: TeraReportEngine::try_init()?,
        })
    }
}

#[async_trait]
impl<P> ResultSink for EmailReport<P>
where
    P: EmailProvider + Send + Sync,
{
    #[tracing::instrument(level = "debug", skip(self, report))]
    async fn publish(&self, report: &RunReport<'_>) -> Result<()> {
        let html_content = self.engine.render_report(report)?;
        let email = EmailRequest {
            sender: self.sender.clone(),
            to: vec![Recipient {
                email: self.to.clone(),
                name: self.to.clone(),
            }],
            subject: format!("{} Report - {}", report.title, report.headline()),
            html_content,
            params: Default::default(),
        };
        let sent = self.provider.send_email(&email).await?;
        tracing::info!(message = "report email sent", to = %self.to, message_id = %sent.message_id);
        Ok(())
    }
}
