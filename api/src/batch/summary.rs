use serde::Serialize;

use super::outcome::OutcomeRecord;

/// Counts and order-preserving partitions of a batch run.
#[derive(Debug, Serialize)]
pub struct BatchSummary<'a> {
    successes: Vec<&'a OutcomeRecord>,
    failures: Vec<&'a OutcomeRecord>,
}

impl<'a> BatchSummary<'a> {
    pub fn from_records(records: &'a [OutcomeRecord]) -> Self {
        let (successes, failures): (Vec<_>, Vec<_>) =
            records.iter().partition(|record| record.is_success());
        Self {
            successes,
            failures,
        }
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.success_count() + self.failure_count()
    }

    pub fn successes(&self) -> &[&'a OutcomeRecord] {
        &self.successes
    }

    pub fn failures(&self) -> &[&'a OutcomeRecord] {
        &self.failures
    }
}
