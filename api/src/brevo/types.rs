use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Sender;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub template_name: String,
    pub subject: String,
    pub sender: Sender,
    pub html_content: String,
    pub is_active: bool,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreatedTemplate {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub sender: Sender,
    pub to: Vec<Recipient>,
    pub subject: String,
    pub html_content: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEmail {
    pub message_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactsPage {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Total number of contacts on the account, not just this page.
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}
