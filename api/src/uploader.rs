use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    batch::{
        BatchProcessor, ItemHandler, OutcomeRecord, ProviderResult, WorkItem, DEFAULT_ITEM_DELAY,
    },
    brevo::{EmailProvider, TemplateRequest},
    config::{Sender, Workspace},
    error::HandlerError,
    loader::templates::{find_html_files, template_jobs},
    sent_folder::archive_successes,
    sink::{RunReport, Sinks},
};

pub const TITLE: &str = "Template Upload";

/// Creates one provider template per [`WorkItem::Template`].
pub struct TemplateUploader<P> {
    provider: P,
}

impl<P> TemplateUploader<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> ItemHandler for TemplateUploader<P>
where
    P: EmailProvider + Send + Sync,
{
    type Error = HandlerError<P::Error>;

    #[tracing::instrument(
        level = "debug",
        skip(self, item),
        fields(identifier = item.identifier())
    )]
    async fn handle(&mut self, item: &WorkItem) -> Result<ProviderResult, Self::Error> {
        let job = match item {
            WorkItem::Template(job) => job,
            other => {
                return Err(HandlerError::Unsupported {
                    handler: "template uploader",
                    identifier: other.identifier().to_string(),
                })
            }
        };

        let html_content = job
            .html
            .load()
            .await
            .map_err(|source| HandlerError::ReadTemplate {
                path: job.source_file().map(Path::to_path_buf).unwrap_or_default(),
                source,
            })?;

        let created = self
            .provider
            .create_template(&TemplateRequest {
                template_name: job.name.clone(),
                subject: job.subject.clone(),
                sender: job.sender.clone(),
                html_content,
                is_active: true,
                tag: job.tag.clone(),
            })
            .await
            .map_err(HandlerError::Provider)?;

        Ok(ProviderResult {
            identifier: created.id.to_string(),
            payload: json!({ "id": created.id }),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub subject_suffix: String,
    pub delay: Duration,
    /// Archive successfully uploaded files into the sent folder.
    pub move_sent: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            subject_suffix: String::new(),
            delay: DEFAULT_ITEM_DELAY,
            move_sent: true,
        }
    }
}

/// Uploads every html file in the templates folder. An empty folder is not an
/// error; the run just reports nothing.
#[tracing::instrument(level = "debug", skip(provider, sender, sinks))]
pub async fn upload_templates<P>(
    provider: P,
    sender: &Sender,
    workspace: &Workspace,
    options: &UploadOptions,
    sinks: &Sinks,
) -> Result<Vec<OutcomeRecord>>
where
    P: EmailProvider + Send + Sync,
{
    let templates_dir = workspace.templates_dir();
    let files = find_html_files(&templates_dir)
        .with_context(|| format!("unable to list templates in {}", templates_dir.display()))?;

    if files.is_empty() {
        tracing::info!(message = "no html files found", dir = %templates_dir.display());
        return Ok(vec![]);
    }
    tracing::info!(message = "uploading templates", count = files.len());

    let items = template_jobs(files, sender, &options.subject_suffix);
    let mut processor =
        BatchProcessor::new(TemplateUploader::new(provider)).with_delay(options.delay);
    let records = processor.run(items).await;

    if options.move_sent {
        let archived = archive_successes(&records, &workspace.sent_dir()).await;
        tracing::info!(message = "archived uploaded templates", count = archived.len());
    }

    let report = RunReport::new(TITLE, &records);
    sinks.publish(&report).await;

    Ok(records)
}
