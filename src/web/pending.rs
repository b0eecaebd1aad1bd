use crate::domain::model::{Batch, DatasetInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A parsed file waiting for the user to press upload.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub batch: Arc<Batch>,
    pub file_name: String,
    pub info: DatasetInfo,
    created: Instant,
}

impl PendingBatch {
    pub fn new(batch: Batch, file_name: String, size_bytes: usize) -> Self {
        let info = DatasetInfo::new(&batch, size_bytes);
        Self {
            batch: Arc::new(batch),
            file_name,
            info,
            created: Instant::now(),
        }
    }
}

/// Previewed batches keyed by an id embedded in the preview page. A slot
/// lives until the same page previews another file or the TTL passes.
#[derive(Debug)]
pub struct PendingBatches {
    ttl: Duration,
    slots: Mutex<HashMap<Uuid, PendingBatch>>,
}

impl PendingBatches {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, pending: PendingBatch, replaces: Option<Uuid>) -> Uuid {
        let mut slots = self.slots.lock().await;

        let ttl = self.ttl;
        let before = slots.len();
        slots.retain(|_, slot| slot.created.elapsed() < ttl);
        if let Some(old) = replaces {
            slots.remove(&old);
        }
        let dropped = before - slots.len();
        if dropped > 0 {
            tracing::debug!("Discarded {} pending batches", dropped);
        }

        let id = Uuid::new_v4();
        slots.insert(id, pending);
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<PendingBatch> {
        let slots = self.slots.lock().await;
        slots
            .get(id)
            .filter(|slot| slot.created.elapsed() < self.ttl)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_csv;

    fn pending() -> PendingBatch {
        PendingBatch::new(parse_csv(b"a\n1\n").unwrap(), "a.csv".to_string(), 4)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let slots = PendingBatches::new(Duration::from_secs(60));
        let id = slots.insert(pending(), None).await;

        let found = slots.get(&id).await.unwrap();
        assert_eq!(found.file_name, "a.csv");
        assert_eq!(found.info.rows, 1);
        assert!(slots.get(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_new_preview_replaces_old_slot() {
        let slots = PendingBatches::new(Duration::from_secs(60));
        let first = slots.insert(pending(), None).await;
        let second = slots.insert(pending(), Some(first)).await;

        assert!(slots.get(&first).await.is_none());
        assert!(slots.get(&second).await.is_some());
        assert_eq!(slots.slots.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_slots_are_dropped() {
        let slots = PendingBatches::new(Duration::ZERO);
        let id = slots.insert(pending(), None).await;
        assert!(slots.get(&id).await.is_none());

        slots.insert(pending(), None).await;
        assert_eq!(slots.slots.lock().await.len(), 1);
    }
}
