use crate::errors::FeedError;
use crate::fetch::source::RaceSource;
use crate::fetch::validate::{validate_response, ValidatedBatch};
use std::time::Duration;
use tracing::{debug, warn};

/// RaceClient fetches race batches from a source and normalizes them into races.
#[derive(Debug, Clone)]
pub struct RaceClient<S> {
    source: S,
}

impl<S: RaceSource> RaceClient<S> {
    pub fn new(source: S) -> RaceClient<S> {
        RaceClient { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// fetch requests count races and validates the response. Fails with `Network` if the
    /// transport fails, `MalformedResponse` if the response lacks race_summaries or next_to_go_ids
    /// and `NoValidData` if not a single race passes validation.
    pub async fn fetch(&self, count: u32) -> Result<ValidatedBatch, FeedError> {
        let body = self.source.fetch_body(count).await?;
        let batch = validate_response(&body)?;

        debug!(
            requested = count,
            accepted = batch.races.len(),
            "race batch fetched"
        );
        Ok(batch)
    }

    /// retry_fetch calls fetch up to max_attempts times (at least once). Before attempt n + 1 it
    /// waits base_delay * 2^(n - 1). If all attempts fail, the error of the last one is returned.
    pub async fn retry_fetch(
        &self,
        count: u32,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Result<ValidatedBatch, FeedError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match self.fetch(count).await {
                Ok(batch) => return Ok(batch),
                Err(e) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %e, "giving up on race fetch");
                    return Err(e);
                }
                Err(e) => {
                    let backoff = base_delay.saturating_mul(2u32.saturating_pow(attempt - 1));
                    debug!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "race fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
