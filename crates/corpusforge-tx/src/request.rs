//! Build-request transform: turns one embedding into an upsert-by-id
//! header/body pair for the bulk-index writer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use corpusforge_core::error::Error;
use corpusforge_core::stage::Transform;
use corpusforge_core::types::{Embedding, IndexAction, IndexBody, IndexHeader, IndexRequestPair};

/// Assigns ids from a shared monotonic counter, so every embedding across
/// every worker gets a unique `_id` regardless of which worker processed
/// it.
pub struct BuildRequestTransform {
    target_index_name: String,
    next_id: Arc<AtomicU64>,
}

impl BuildRequestTransform {
    pub fn new(target_index_name: impl Into<String>, next_id: Arc<AtomicU64>) -> Self {
        Self {
            target_index_name: target_index_name.into(),
            next_id,
        }
    }
}

#[async_trait]
impl Transform<Embedding, IndexRequestPair> for BuildRequestTransform {
    async fn apply(&self, input: Embedding) -> Result<Vec<IndexRequestPair>, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(vec![IndexRequestPair {
            header: IndexHeader {
                index: IndexAction {
                    index: self.target_index_name.clone(),
                    id,
                },
            },
            body: IndexBody {
                text_embedding: input,
            },
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assigns_increasing_ids_across_calls() {
        let counter = Arc::new(AtomicU64::new(0));
        let tx = BuildRequestTransform::new("wikipedia", counter);
        let first = tx.apply(vec![0.1, 0.2]).await.unwrap();
        let second = tx.apply(vec![0.3, 0.4]).await.unwrap();
        assert_eq!(first[0].header.index.id, 0);
        assert_eq!(second[0].header.index.id, 1);
        assert_eq!(first[0].header.index.index, "wikipedia");
    }
}
