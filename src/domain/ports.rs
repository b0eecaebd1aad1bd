use crate::domain::model::DestinationPath;
use crate::utils::error::Result;

/// Remote hierarchical JSON store.
pub trait DocumentStore: Send + Sync {
    /// Overwrites everything at `path` with `document`. Never merges.
    fn replace(
        &self,
        path: &DestinationPath,
        document: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
