use chrono::{DateTime, Utc};

use crate::formats::{PipelineRunRecord, RunStatus};
use crate::store::DigestStore;

/// Writes one `scraper_runs` row per pipeline run.
pub struct RunLogger<'a> {
    store: &'a dyn DigestStore,
}

impl<'a> RunLogger<'a> {
    pub fn new(store: &'a dyn DigestStore) -> Self {
        Self { store }
    }

    /// Never fails: a write error is logged and the run's outcome stands.
    pub async fn record(
        &self,
        status: RunStatus,
        posts_processed: usize,
        error_message: Option<String>,
        ran_at: DateTime<Utc>,
    ) -> PipelineRunRecord {
        let record = PipelineRunRecord {
            status,
            posts_processed,
            error_message,
            ran_at,
        };
        match self.store.insert_run(&record.to_row()).await {
            Ok(()) => tracing::info!(?status, posts = posts_processed, "run recorded"),
            Err(err) => tracing::warn!(
                ?status,
                error = %format!("{err:#}"),
                "failed to record run"
            ),
        }
        record
    }
}
