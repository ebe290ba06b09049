use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::{
    batch::{
        BatchProcessor, ItemHandler, OutcomeRecord, ProviderResult, WorkItem, DEFAULT_ITEM_DELAY,
    },
    brevo::{EmailProvider, EmailRequest, Recipient},
    config::{Sender, Workspace},
    error::HandlerError,
    loader::{
        subscribers::{
            fetch_subscribers, load_subscribers, save_subscribers, send_jobs, Subscriber,
            DEFAULT_SUBSCRIBER_LIMIT,
        },
        templates::find_newest_html_file,
    },
    sent_folder::move_to_sent,
    sink::{RunReport, Sinks},
};

pub const TITLE: &str = "Welcome Email";
pub const DEFAULT_SUBJECT: &str = "Welcome - Thanks for Subscribing!";

#[derive(Debug, Clone)]
pub struct WelcomeEmail {
    pub sender: Sender,
    pub subject: String,
    pub html_content: String,
}

/// Sends the welcome email to the recipient of each [`WorkItem::Send`].
pub struct SubscriberMailer<P> {
    provider: P,
    email: WelcomeEmail,
}

impl<P> SubscriberMailer<P> {
    pub fn new(provider: P, email: WelcomeEmail) -> Self {
        Self { provider, email }
    }
}

/// Merge tags the provider fills in itself, overridable by subscriber attributes.
fn email_params(attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("unsubscribe".to_string(), "{{ unsubscribe }}".to_string());
    params.insert("update_profile".to_string(), "{{ update_profile }}".to_string());
    params.extend(attributes.iter().map(|(key, val)| (key.clone(), val.clone())));
    params
}

#[async_trait]
impl<P> ItemHandler for SubscriberMailer<P>
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
            WorkItem::Send(job) => job,
            other => {
                return Err(HandlerError::Unsupported {
                    handler: "subscriber mailer",
                    identifier: other.identifier().to_string(),
                })
            }
        };

        let sent = self
            .provider
            .send_email(&EmailRequest {
                sender: self.email.sender.clone(),
                to: vec![Recipient {
                    email: job.recipient_email.clone(),
                    name: job.recipient_name.clone(),
                }],
                subject: self.email.subject.clone(),
                html_content: self.email.html_content.clone(),
                params: email_params(&job.attributes),
            })
            .await
            .map_err(HandlerError::Provider)?;

        Ok(ProviderResult {
            identifier: job.recipient_email.clone(),
            payload: json!({ "messageId": sent.message_id }),
        })
    }
}

/// Picks the template to send: an explicit path wins, then the newest html
/// file in `ready-to-send/`, then the newest one in the templates folder.
pub fn resolve_template(workspace: &Workspace, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(anyhow!("email template {} does not exist", path.display()));
        }
        return Ok(path.to_path_buf());
    }

    let newest = match find_newest_html_file(&workspace.ready_to_send_dir())? {
        Some(path) => Some(path),
        None => find_newest_html_file(&workspace.templates_dir())?,
    };
    let path = newest.ok_or_else(|| {
        anyhow!(
            "no html templates found in {}",
            workspace.templates_dir().display()
        )
    })?;
    tracing::info!(message = "automatically selected template", path = %path.display());
    Ok(path)
}

#[derive(Debug, Clone)]
pub struct DailyEmailOptions {
    pub template: Option<PathBuf>,
    pub subject: String,
    pub limit: Option<usize>,
    /// Send to a saved subscriber file instead of fetching contacts.
    pub subscribers_file: Option<PathBuf>,
    pub delay: Duration,
    /// Archive the template into the sent folder once at least one email went out.
    pub archive_template: bool,
}

impl Default for DailyEmailOptions {
    fn default() -> Self {
        Self {
            template: None,
            subject: DEFAULT_SUBJECT.to_string(),
            limit: Some(DEFAULT_SUBSCRIBER_LIMIT),
            subscribers_file: None,
            delay: DEFAULT_ITEM_DELAY,
            archive_template: true,
        }
    }
}

async fn saved_subscribers(path: &Path, limit: Option<usize>) -> Result<Vec<Subscriber>> {
    let mut subscribers = load_subscribers(path).await?;
    if let Some(limit) = limit {
        subscribers.truncate(limit);
    }
    tracing::info!(
        message = "loaded saved subscribers",
        count = subscribers.len(),
        path = %path.display()
    );
    Ok(subscribers)
}

#[tracing::instrument(level = "debug", skip(provider, sender, sinks))]
pub async fn send_daily_email<P>(
    provider: P,
    sender: &Sender,
    workspace: &Workspace,
    options: &DailyEmailOptions,
    sinks: &Sinks,
) -> Result<Vec<OutcomeRecord>>
where
    P: EmailProvider + Send + Sync,
{
    let template_path = resolve_template(workspace, options.template.as_deref())?;
    let html_content = tokio::fs::read_to_string(&template_path)
        .await
        .with_context(|| format!("unable to read email template {}", template_path.display()))?;

    let subscribers = match &options.subscribers_file {
        Some(path) => saved_subscribers(path, options.limit).await?,
        None => {
            let subscribers = fetch_subscribers(&provider, options.limit).await?;
            save_subscribers(&workspace.subscribers_file(), &subscribers).await?;
            subscribers
        }
    };

    let mailer = SubscriberMailer::new(
        provider,
        WelcomeEmail {
            sender: sender.clone(),
            subject: options.subject.clone(),
            html_content,
        },
    );
    let mut processor = BatchProcessor::new(mailer).with_delay(options.delay);
    let records = processor.run(send_jobs(subscribers)).await;

    let report = RunReport::new(TITLE, &records);
    sinks.publish(&report).await;

    if options.archive_template && report.summary.success_count() > 0 {
        if let Err(err) = move_to_sent(&template_path, &workspace.sent_dir(), Utc::now()).await {
            tracing::warn!(message = "could not move email template to sent folder", error = %err);
        }
    }

    Ok(records)
}

#[cfg(test)]
mod test {
    use std::{
        collections::BTreeMap,
        fs,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    use super::{
        resolve_template, send_daily_email, DailyEmailOptions, SubscriberMailer, WelcomeEmail,
    };
    use crate::{
        batch::{ItemHandler, SendJob, WorkItem},
        brevo::{
            Contact, ContactsPage, CreatedTemplate, EmailProvider, EmailRequest, SentEmail,
            TemplateRequest,
        },
        config::{Sender, Workspace},
        loader::subscribers::{load_subscribers, save_subscribers, Subscriber},
        sink::Sinks,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("recipient {0} is blocklisted")]
    struct MockError(String);

    #[derive(Clone, Default)]
    struct MockProvider {
        contacts: Vec<String>,
        blocked: Vec<String>,
        sent: Arc<Mutex<Vec<EmailRequest>>>,
        requested: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl EmailProvider for MockProvider {
        type Error = MockError;

        async fn create_template(
            &self,
            _template: &TemplateRequest,
        ) -> Result<CreatedTemplate, Self::Error> {
            unimplemented!()
        }

        async fn send_email(&self, email: &EmailRequest) -> Result<SentEmail, Self::Error> {
            let recipient = email.to[0].email.clone();
            if self.blocked.contains(&recipient) {
                return Err(MockError(recipient));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(email.clone());
            Ok(SentEmail {
                message_id: format!("<{}@relay>", sent.len()),
            })
        }

        async fn list_contacts(
            &self,
            limit: u32,
            offset: u32,
        ) -> Result<ContactsPage, Self::Error> {
            self.requested.lock().unwrap().push(limit);
            let contacts = self
                .contacts
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(|email| {
                    let mut attributes = Map::new();
                    attributes.insert("FIRSTNAME".to_string(), json!("Dummy"));
                    Contact {
                        email: Some(email.clone()),
                        attributes,
                    }
                })
                .collect();
            Ok(ContactsPage {
                contacts,
                count: Some(self.contacts.len() as u64),
            })
        }
    }

    fn sender() -> Sender {
        Sender {
            name: "Dummy Sender".to_string(),
            email: "sender@email.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_handler_merges_attributes_into_params() {
        let provider = MockProvider::default();
        let mut mailer = SubscriberMailer::new(
            provider.clone(),
            WelcomeEmail {
                sender: sender(),
                subject: "Welcome!".to_string(),
                html_content: "<p>hi {{ params.FIRSTNAME }}</p>".to_string(),
            },
        );
        let mut attributes = BTreeMap::new();
        attributes.insert("FIRSTNAME".to_string(), "Dummy".to_string());

        let result = mailer
            .handle(&WorkItem::Send(SendJob {
                recipient_email: "dummy-1@email.com".to_string(),
                recipient_name: "Dummy".to_string(),
                attributes,
            }))
            .await
            .unwrap();

        assert_eq!(result.identifier, "dummy-1@email.com");
        assert_eq!(result.payload, json!({ "messageId": "<1@relay>" }));

        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent[0].to[0].name, "Dummy");
        assert_eq!(sent[0].params["FIRSTNAME"], "Dummy");
        assert_eq!(sent[0].params["unsubscribe"], "{{ unsubscribe }}");
        assert_eq!(sent[0].params["update_profile"], "{{ update_profile }}");
    }

    #[test]
    fn test_resolve_template_prefers_ready_to_send() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        fs::create_dir_all(workspace.ready_to_send_dir()).unwrap();

        assert!(resolve_template(&workspace, None).is_err());

        fs::write(workspace.templates_dir().join("main.html"), "main").unwrap();
        assert_eq!(
            resolve_template(&workspace, None).unwrap(),
            workspace.templates_dir().join("main.html")
        );

        fs::write(workspace.ready_to_send_dir().join("queued.html"), "queued").unwrap();
        assert_eq!(
            resolve_template(&workspace, None).unwrap(),
            workspace.ready_to_send_dir().join("queued.html")
        );

        let explicit = workspace.templates_dir().join("main.html");
        assert_eq!(
            resolve_template(&workspace, Some(explicit.as_path())).unwrap(),
            explicit
        );
        let missing = dir.path().join("missing.html");
        assert!(resolve_template(&workspace, Some(missing.as_path())).is_err());
    }

    #[tokio::test]
    async fn test_send_daily_email() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        fs::create_dir_all(workspace.templates_dir()).unwrap();
        let template = workspace.templates_dir().join("weekly_digest.html");
        fs::write(&template, "<p>digest</p>").unwrap();

        let provider = MockProvider {
            contacts: vec![
                "dummy-1@email.com".to_string(),
                "dummy-2@email.com".to_string(),
                "dummy-3@email.com".to_string(),
            ],
            blocked: vec!["dummy-2@email.com".to_string()],
            ..Default::default()
        };
        let options = DailyEmailOptions {
            delay: Duration::ZERO,
            ..Default::default()
        };

        let records =
            send_daily_email(provider.clone(), &sender(), &workspace, &options, &Sinks::new())
                .await
                .unwrap();

        assert_eq!(
            records.iter().map(|record| record.is_success()).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(
            records[1].error_message(),
            Some("recipient dummy-2@email.com is blocklisted")
        );
        assert_eq!(provider.sent.lock().unwrap().len(), 2);

        let saved = load_subscribers(&workspace.subscribers_file()).await.unwrap();
        assert_eq!(saved.len(), 3);

        assert!(!template.exists());
        assert_eq!(fs::read_dir(workspace.sent_dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_template_kept_when_nothing_was_sent() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        fs::create_dir_all(workspace.templates_dir()).unwrap();
        let template = workspace.templates_dir().join("weekly_digest.html");
        fs::write(&template, "<p>digest</p>").unwrap();

        let provider = MockProvider {
            contacts: vec!["dummy-1@email.com".to_string()],
            blocked: vec!["dummy-1@email.com".to_string()],
            ..Default::default()
        };
        let options = DailyEmailOptions {
            delay: Duration::ZERO,
            ..Default::default()
        };

        let records = send_daily_email(provider, &sender(), &workspace, &options, &Sinks::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(!records[0].is_success());
        assert!(template.exists());
    }

    fn workspace_with_template(dir: &TempDir) -> Workspace {
        let workspace = Workspace::new(dir.path());
        fs::create_dir_all(workspace.templates_dir()).unwrap();
        fs::write(
            workspace.templates_dir().join("weekly_digest.html"),
            "<p>digest</p>",
        )
        .unwrap();
        workspace
    }

    #[tokio::test]
    async fn test_default_run_emails_at_most_fifty_contacts() {
        let dir = TempDir::new().unwrap();
        let workspace = workspace_with_template(&dir);
        let provider = MockProvider {
            contacts: (1..=120)
                .map(|idx| format!("dummy-{}@email.com", idx))
                .collect(),
            ..Default::default()
        };
        let options = DailyEmailOptions {
            delay: Duration::ZERO,
            ..Default::default()
        };

        let records =
            send_daily_email(provider.clone(), &sender(), &workspace, &options, &Sinks::new())
                .await
                .unwrap();

        assert_eq!(records.len(), 50);
        assert_eq!(provider.sent.lock().unwrap().len(), 50);
        assert_eq!(provider.requested.lock().unwrap().iter().sum::<u32>(), 50);
    }

    #[tokio::test]
    async fn test_send_to_saved_subscribers_skips_fetch() {
        let dir = TempDir::new().unwrap();
        let workspace = workspace_with_template(&dir);
        let saved = dir.path().join("saved.json");
        let subscriber = |email: &str| Subscriber {
            email: email.to_string(),
            name: "Dummy".to_string(),
            attributes: Default::default(),
        };
        save_subscribers(
            &saved,
            &[
                subscriber("dummy-1@email.com"),
                subscriber("not-an-email"),
                subscriber("dummy-2@email.com"),
            ],
        )
        .await
        .unwrap();

        let provider = MockProvider {
            contacts: vec!["dummy-9@email.com".to_string()],
            ..Default::default()
        };
        let options = DailyEmailOptions {
            subscribers_file: Some(saved),
            delay: Duration::ZERO,
            ..Default::default()
        };

        let records =
            send_daily_email(provider.clone(), &sender(), &workspace, &options, &Sinks::new())
                .await
                .unwrap();

        assert_eq!(
            records.iter().map(|record| record.identifier.as_str()).collect::<Vec<_>>(),
            vec!["dummy-1@email.com", "dummy-2@email.com"]
        );
        assert!(provider.requested.lock().unwrap().is_empty());
        assert!(!workspace.subscribers_file().exists());
    }
}
