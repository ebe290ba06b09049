pub mod outcome;
pub mod summary;
pub mod work_item;

use std::time::Duration;

use async_trait::async_trait;

pub use self::{
    outcome::{Outcome, OutcomeRecord, ProviderResult},
    summary::BatchSummary,
    work_item::{HtmlSource, SendJob, TemplateJob, WorkItem},
};

/// Pause between two provider calls. The provider throttles bursts, so every
/// item is followed by this delay whether it succeeded or not.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(1000);

#[async_trait]
pub trait ItemHandler {
    type Error: std::error::Error + Sync + Send + 'static;

    async fn handle(&mut self, item: &WorkItem) -> Result<ProviderResult, Self::Error>;
}

pub struct BatchProcessor<H>
where
    H: ItemHandler,
{
    handler: H,
    delay: Duration,
}

impl<H> BatchProcessor<H>
where
    H: ItemHandler + Send,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            delay: DEFAULT_ITEM_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Processes `items` one at a time, in order. A failing item is recorded
    /// and the loop moves on; the returned records line up with `items`.
    #[tracing::instrument(level = "debug", skip(self, items), fields(items = items.len()))]
    pub async fn run(&mut self, items: Vec<WorkItem>) -> Vec<OutcomeRecord> {
        let mut records = Vec::with_capacity(items.len());

        for item in items {
            let record = match self.handler.handle(&item).await {
                Ok(result) => {
                    tracing::info!(message = "item processed", identifier = %result.identifier);
                    OutcomeRecord::success(result, item)
                }
                Err(err) => {
                    tracing::error!(
                        message = "item failed",
                        identifier = %item.identifier(),
                        error = %err
                    );
                    OutcomeRecord::failure(err.to_string(), item)
                }
            };
            records.push(record);

            tokio::time::sleep(self.delay).await;
        }

        records
    }
}
