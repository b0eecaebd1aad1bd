use crate::domain::model::{Batch, DestinationPath, UploadResult};
use crate::domain::ports::DocumentStore;
use crate::utils::error::Result;

/// Ties parsed batches to a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct UploadOrchestrator<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> UploadOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes `batch` to `destination`, replacing whatever is there.
    ///
    /// Store failures come back as [`UploadResult::Failure`] carrying the
    /// store's own message. There is no retry.
    pub async fn upload(&self, batch: &Batch, destination: &DestinationPath) -> UploadResult {
        tracing::info!("Uploading {} records to '{}'", batch.len(), destination);

        let outcome = match batch.to_document() {
            Ok(document) => self.store.replace(destination, &document).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                tracing::info!("Uploaded {} records to '{}'", batch.len(), destination);
                UploadResult::Success { count: batch.len() }
            }
            Err(e) => {
                tracing::error!("Upload to '{}' failed: {}", destination, e);
                UploadResult::Failure {
                    message: e.underlying_message(),
                }
            }
        }
    }

    /// Validates a raw destination string first; an invalid one is rejected
    /// before the store is contacted.
    pub async fn upload_to(&self, batch: &Batch, destination: &str) -> Result<UploadResult> {
        let destination = DestinationPath::parse(destination)?;
        Ok(self.upload(batch, &destination).await)
    }
}
