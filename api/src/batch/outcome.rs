use serde::{ser::SerializeStruct, Serialize, Serializer};
use serde_json::Value;

use super::work_item::WorkItem;

/// What a handler returns for an item the provider accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    pub identifier: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

/// The result of processing one [`WorkItem`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub identifier: String,
    pub outcome: Outcome,
    pub source_item: WorkItem,
}

impl OutcomeRecord {
    pub fn success(result: ProviderResult, source_item: WorkItem) -> Self {
        let ProviderResult {
            identifier,
            payload,
        } = result;
        Self {
            identifier,
            outcome: Outcome::Success(payload),
            source_item,
        }
    }

    pub fn failure(error_message: String, source_item: WorkItem) -> Self {
        Self {
            identifier: source_item.identifier().to_string(),
            outcome: Outcome::Failure(error_message),
            source_item,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn provider_result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(payload) => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(message) => Some(message),
        }
    }
}

impl Serialize for OutcomeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OutcomeRecord", 4)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("identifier", &self.identifier)?;
        match &self.outcome {
            Outcome::Success(payload) => state.serialize_field("providerResult", payload)?,
            Outcome::Failure(message) => state.serialize_field("error", message)?,
        }
        state.serialize_field("sourceItem", &self.source_item)?;
        state.end()
    }
}
