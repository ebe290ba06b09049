use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    batch::{SendJob, WorkItem},
    brevo::{Contact, EmailProvider},
};

pub const PAGE_SIZE: u32 = 50;
/// Subscribers fetched per run unless a caller asks for another limit.
pub const DEFAULT_SUBSCRIBER_LIMIT: usize = 50;
const DEFAULT_NAME: &str = "Subscriber";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Subscriber {
    #[validate(email)]
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Subscriber {
    /// Contacts without an email address (SMS-only) yield `None`.
    pub fn from_contact(contact: Contact) -> Option<Self> {
        let Contact { email, attributes } = contact;
        let email = email.filter(|email| !email.is_empty())?;
        let attributes = attributes
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(value) => Some((key, value)),
                other => Some((key, other.to_string())),
            })
            .collect::<BTreeMap<String, String>>();
        let name = attributes
            .get("FIRSTNAME")
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        Some(Self {
            email,
            name,
            attributes,
        })
    }
}

/// Pages through the provider's contact list, newest first, until `limit`
/// subscribers are collected or the list is exhausted.
#[tracing::instrument(level = "debug", skip(provider))]
pub async fn fetch_subscribers<P>(
    provider: &P,
    limit: Option<usize>,
) -> Result<Vec<Subscriber>, P::Error>
where
    P: EmailProvider + Sync,
{
    let mut subscribers = Vec::new();
    let mut offset: u32 = 0;

    loop {
        let page_size = match limit {
            Some(limit) => {
                let remaining = limit.saturating_sub(subscribers.len());
                if remaining == 0 {
                    break;
                }
                PAGE_SIZE.min(u32::try_from(remaining).unwrap_or(u32::MAX))
            }
            None => PAGE_SIZE,
        };
        if page_size == 0 {
            break;
        }

        let page = provider.list_contacts(page_size, offset).await?;
        let received = page.contacts.len() as u32;
        subscribers.extend(page.contacts.into_iter().filter_map(Subscriber::from_contact));
        offset += received;

        let exhausted = received < page_size
            || page
                .count
                .map(|count| u64::from(offset) >= count)
                .unwrap_or(false);
        if exhausted {
            break;
        }
    }

    if let Some(limit) = limit {
        subscribers.truncate(limit);
    }
    tracing::info!(message = "fetched subscribers", count = subscribers.len());
    Ok(subscribers)
}

pub async fn save_subscribers(path: &Path, subscribers: &[Subscriber]) -> Result<()> {
    let json = serde_json::to_string_pretty(subscribers)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("unable to write subscribers to {}", path.display()))?;
    tracing::info!(message = "subscribers saved", path = %path.display());
    Ok(())
}

/// Reads a subscriber file written by [`save_subscribers`]. Entries with an
/// invalid email address are dropped.
pub async fn load_subscribers(path: &Path) -> Result<Vec<Subscriber>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("unable to read subscribers from {}", path.display()))?;
    let subscribers: Vec<Subscriber> = serde_json::from_str(&content)
        .with_context(|| format!("unable to parse subscribers in {}", path.display()))?;

    Ok(subscribers
        .into_iter()
        .filter(|subscriber| match subscriber.validate() {
            Ok(()) => true,
            Err(errors) => {
                tracing::warn!(
                    message = "skipping invalid subscriber",
                    email = %subscriber.email,
                    ?errors
                );
                false
            }
        })
        .collect())
}

pub fn send_jobs(subscribers: Vec<Subscriber>) -> Vec<WorkItem> {
    subscribers
        .into_iter()
        .map(|subscriber| {
            let Subscriber {
                email,
                name,
                attributes,
            } = subscriber;
            WorkItem::Send(SendJob {
                recipient_email: email,
                recipient_name: name,
                attributes,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::{
        convert::Infallible,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tempfile::TempDir;

    use super::{fetch_subscribers, load_subscribers, save_subscribers, send_jobs, Subscriber};
    use crate::{
        batch::WorkItem,
        brevo::{
            Contact, ContactsPage, CreatedTemplate, EmailProvider, EmailRequest, SentEmail,
            TemplateRequest,
        },
    };

    fn contact(email: &str, attributes: Value) -> Contact {
        Contact {
            email: Some(email.to_string()),
            attributes: match attributes {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    struct MockContacts {
        contacts: Vec<Contact>,
        requests: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    #[async_trait]
    impl EmailProvider for MockContacts {
        type Error = Infallible;

        async fn create_template(
            &self,
            _template: &TemplateRequest,
        ) -> Result<CreatedTemplate, Self::Error> {
            unimplemented!()
        }

        async fn send_email(&self, _email: &EmailRequest) -> Result<SentEmail, Self::Error> {
            unimplemented!()
        }

        async fn list_contacts(
            &self,
            limit: u32,
            offset: u32,
        ) -> Result<ContactsPage, Self::Error> {
            self.requests.lock().unwrap().push((limit, offset));
            let contacts = self
                .contacts
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(ContactsPage {
                contacts,
                count: Some(self.contacts.len() as u64),
            })
        }
    }

    fn mock_contacts(count: usize) -> MockContacts {
        MockContacts {
            contacts: (1..=count)
                .map(|idx| contact(&format!("dummy-{}@email.com", idx), json!({})))
                .collect(),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    #[test]
    fn test_subscriber_from_contact() {
        let subscriber = Subscriber::from_contact(contact(
            "dummy-1@email.com",
            json!({ "FIRSTNAME": "Dummy", "AGE": 31, "OPT_IN": true, "LASTNAME": null }),
        ))
        .unwrap();

        assert_eq!(subscriber.name, "Dummy");
        assert_eq!(subscriber.attributes["AGE"], "31");
        assert_eq!(subscriber.attributes["OPT_IN"], "true");
        assert!(!subscriber.attributes.contains_key("LASTNAME"));

        let subscriber =
            Subscriber::from_contact(contact("dummy-2@email.com", json!({}))).unwrap();
        assert_eq!(subscriber.name, "Subscriber");

        assert_eq!(Subscriber::from_contact(Contact::default()), None);
    }

    #[tokio::test]
    async fn test_fetch_subscribers_pages_until_exhausted() {
        let provider = mock_contacts(120);

        let subscribers = fetch_subscribers(&provider, None).await.unwrap();

        assert_eq!(subscribers.len(), 120);
        assert_eq!(subscribers[119].email, "dummy-120@email.com");
        assert_eq!(
            *provider.requests.lock().unwrap(),
            vec![(50, 0), (50, 50), (50, 100)]
        );
    }

    #[tokio::test]
    async fn test_fetch_subscribers_respects_limit() {
        let provider = mock_contacts(120);

        let subscribers = fetch_subscribers(&provider, Some(60)).await.unwrap();

        assert_eq!(subscribers.len(), 60);
        assert_eq!(*provider.requests.lock().unwrap(), vec![(50, 0), (10, 50)]);
    }

    #[tokio::test]
    async fn test_fetch_subscribers_with_huge_limit_stops_at_end_of_list() {
        let provider = mock_contacts(3);
        let limit = (u32::MAX as usize).saturating_add(1);

        let subscribers = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            fetch_subscribers(&provider, Some(limit)),
        )
        .await
        .expect("paging never finished")
        .unwrap();

        assert_eq!(subscribers.len(), 3);
        assert_eq!(*provider.requests.lock().unwrap(), vec![(50, 0)]);
    }

    #[tokio::test]
    async fn test_save_and_load_drops_invalid_emails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subscribers.json");
        let subscribers = vec![
            Subscriber {
                email: "dummy-1@email.com".to_string(),
                name: "Dummy".to_string(),
                attributes: Default::default(),
            },
            Subscriber {
                email: "not-an-email".to_string(),
                name: "Broken".to_string(),
                attributes: Default::default(),
            },
        ];

        save_subscribers(&path, &subscribers).await.unwrap();
        let loaded = load_subscribers(&path).await.unwrap();

        assert_eq!(loaded, subscribers[..1].to_vec());

        let jobs = send_jobs(loaded);
        match &jobs[..] {
            [WorkItem::Send(job)] => {
                assert_eq!(job.recipient_email, "dummy-1@email.com");
                assert_eq!(job.recipient_name, "Dummy");
            }
            other => panic!("unexpected jobs {:?}", other),
        }
    }
}
