use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::config::Sender;

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    Template(TemplateJob),
    Send(SendJob),
}

impl WorkItem {
    /// Identifier recorded when the item fails: the template name or the recipient email.
    pub fn identifier(&self) -> &str {
        match self {
            WorkItem::Template(job) => &job.name,
            WorkItem::Send(job) => &job.recipient_email,
        }
    }

    pub fn source_file(&self) -> Option<&Path> {
        match self {
            WorkItem::Template(job) => job.source_file(),
            WorkItem::Send(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateJob {
    pub name: String,
    pub subject: String,
    pub html: HtmlSource,
    pub sender: Sender,
    pub tag: String,
}

impl TemplateJob {
    pub fn source_file(&self) -> Option<&Path> {
        match &self.html {
            HtmlSource::File(path) => Some(path),
            HtmlSource::Inline(_) => None,
        }
    }
}

/// Where a template's html content comes from. File sources are read by the
/// handler when the item is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtmlSource {
    Inline(String),
    File(PathBuf),
}

impl HtmlSource {
    pub async fn load(&self) -> std::io::Result<String> {
        match self {
            HtmlSource::Inline(content) => Ok(content.clone()),
            HtmlSource::File(path) => tokio::fs::read_to_string(path).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendJob {
    pub recipient_email: String,
    pub recipient_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}
