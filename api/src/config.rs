use std::{
    env,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.brevo.com/v3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

#[derive(Debug, Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub base_url: String,
}

impl BrevoConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = required("BREVO_API_KEY")?;
        let base_url = env::var("BREVO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self { api_key, base_url })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

impl Sender {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            name: required("SENDER_NAME")?,
            email: required("SENDER_EMAIL")?,
        })
    }
}

/// Address that receives the run report, when configured.
pub fn notification_email() -> Option<String> {
    env::var("NOTIFICATION_EMAIL")
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

/// Directory layout the flows read from and write to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Inside GitHub Actions the checkout lives at `GITHUB_WORKSPACE`, which
    /// wins over `default_root`.
    pub fn from_env<P: Into<PathBuf>>(default_root: P) -> Self {
        let in_actions = env::var("GITHUB_ACTIONS").is_ok();
        match env::var("GITHUB_WORKSPACE") {
            Ok(root) if in_actions => Self::new(root),
            _ => Self::new(default_root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("email-templates")
    }

    pub fn sent_dir(&self) -> PathBuf {
        self.templates_dir().join("sent")
    }

    pub fn ready_to_send_dir(&self) -> PathBuf {
        self.templates_dir().join("ready-to-send")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("email-logs")
    }

    pub fn subscribers_file(&self) -> PathBuf {
        self.root.join("subscribers.json")
    }

    pub fn template_list_file(&self) -> PathBuf {
        self.root.join("email-templates-list.json")
    }

    pub fn log_file(&self, prefix: &str, date: NaiveDate) -> PathBuf {
        self.logs_dir()
            .join(format!("{}-log-{}.log", prefix, date.format("%Y-%m-%d")))
    }

    pub fn results_file(&self, prefix: &str, date: NaiveDate) -> PathBuf {
        self.logs_dir()
            .join(format!("{}-results-{}.json", prefix, date.format("%Y-%m-%d")))
    }
}
