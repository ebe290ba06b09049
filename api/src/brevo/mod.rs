mod types;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT};
use thiserror::Error;

use crate::config::BrevoConfig;

pub use self::types::{
    Contact, ContactsPage, CreatedTemplate, EmailRequest, Recipient, SentEmail, TemplateRequest,
};

#[derive(Debug, Error)]
pub enum BrevoError {
    #[error("request to Brevo failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Brevo responded with {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid API key header value")]
    InvalidApiKey(#[from] InvalidHeaderValue),
}

#[async_trait]
pub trait EmailProvider {
    type Error: std::error::Error + Sync + Send + 'static;

    async fn create_template(
        &self,
        template: &TemplateRequest,
    ) -> Result<CreatedTemplate, Self::Error>;

    async fn send_email(&self, email: &EmailRequest) -> Result<SentEmail, Self::Error>;

    async fn list_contacts(&self, limit: u32, offset: u32) -> Result<ContactsPage, Self::Error>;
}

#[derive(Debug, Clone)]
pub struct BrevoClient {
    client: reqwest::Client,
    base_url: String,
}

impl BrevoClient {
    pub fn new(config: &BrevoConfig) -> Result<Self, BrevoError> {
        let headers = {
            let mut headers = HeaderMap::new();
            let mut api_key = HeaderValue::from_str(&config.api_key)?;
            api_key.set_sensitive(true);
            headers.insert("api-key", api_key);
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            headers
        };
        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BrevoError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(BrevoError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl EmailProvider for BrevoClient {
    type Error = BrevoError;

    #[tracing::instrument(
        level = "debug",
        skip(self, template),
        fields(template_name = %template.template_name)
    )]
    async fn create_template(
        &self,
        template: &TemplateRequest,
    ) -> Result<CreatedTemplate, Self::Error> {
        let resp = self
            .client
            .post(self.url("smtp/templates"))
            .json(template)
            .send()
            .await?;
        Ok(Self::check_status(resp).await?.json().await?)
    }

    #[tracing::instrument(level = "debug", skip(self, email), fields(recipients = email.to.len()))]
    async fn send_email(&self, email: &EmailRequest) -> Result<SentEmail, Self::Error> {
        let resp = self
            .client
            .post(self.url("smtp/email"))
            .json(email)
            .send()
            .await?;
        Ok(Self::check_status(resp).await?.json().await?)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_contacts(&self, limit: u32, offset: u32) -> Result<ContactsPage, Self::Error> {
        let resp = self
            .client
            .get(self.url("contacts"))
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("sort", "desc".to_string()),
            ])
            .send()
            .await?;
        Ok(Self::check_status(resp).await?.json().await?)
    }
}
