//! Ingestion job dispatch
//!
//! Uploads are acknowledged immediately; the ingestion work itself runs
//! out of band. This implementation only spawns and logs the job, the
//! actual document pipeline lives in the ingestion worker.

use async_trait::async_trait;

use weeklog_core::{IngestionDispatcher, Result};

/// Dispatcher that hands the job to a background task
pub struct SpawnedIngestionDispatcher;

#[async_trait]
impl IngestionDispatcher for SpawnedIngestionDispatcher {
    async fn dispatch(&self, file_paths: Vec<String>, user_id: &str, week_start: &str) -> Result<()> {
        let user_id = user_id.to_string();
        let week_start = week_start.to_string();

        tokio::spawn(async move {
            tracing::info!(
                user_id,
                week_start,
                files = file_paths.len(),
                "ingestion job dispatched"
            );
            for path in &file_paths {
                tracing::debug!(user_id, path, "queued document for ingestion");
            }
        });

        Ok(())
    }
}
