//! Bulk-index writer: accumulates header/body request pairs and submits
//! them to the remote search engine's `_bulk` endpoint, retrying transient
//! failures with the buffer held (never cleared) and failing fast on
//! permanent errors.

use std::time::Duration;

use async_trait::async_trait;
use corpusforge_core::config::KnnIndexSettings;
use corpusforge_core::error::Error;
use corpusforge_core::queue::{QueueItem, QueueRx};
use corpusforge_core::stage::Writer;
use corpusforge_core::summary::StageSummary;
use corpusforge_core::types::IndexRequestPair;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Thin client over a remote KNN-capable search engine's index lifecycle
/// and bulk endpoints.
pub struct BulkClient {
    endpoint: String,
    client: Client,
}

impl BulkClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }

    /// Deletes the index if it exists, then creates it with a KNN mapping
    /// sized to `settings`.
    pub async fn initialize_index(
        &self,
        index_name: &str,
        settings: &KnnIndexSettings,
    ) -> Result<(), Error> {
        let delete_url = format!("{}/{}", self.endpoint, index_name);
        let _ = self.client.delete(&delete_url).send().await;

        let body = json!({
            "settings": {
                "number_of_shards": settings.number_of_shards,
                "index": {
                    "knn": "true",
                    "knn.algo_param.ef_search": settings.ef_search,
                }
            },
            "mappings": {
                "properties": {
                    "text_embedding": {
                        "type": "knn_vector",
                        "dimension": settings.dimension,
                        "method": {
                            "name": "hnsw",
                            "space_type": "l2",
                            "engine": "lucene",
                            "parameters": {
                                "ef_construction": settings.ef_construction,
                                "m": settings.m,
                            }
                        }
                    }
                }
            }
        });

        let create_url = format!("{}/{}", self.endpoint, index_name);
        let resp = self
            .client
            .put(&create_url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::RemotePermanent { status, body });
        }
        Ok(())
    }

    /// Submits a batch of ndjson header/body lines to `_bulk`.
    async fn bulk(&self, ndjson: &str) -> Result<(), Error> {
        let url = format!("{}/_bulk", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(ndjson.to_string())
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::RemotePermanent { status, body });
        }
        Ok(())
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::RemoteTransient(e.to_string())
    } else {
        Error::Other(e.into())
    }
}

pub struct BulkIndexWriter {
    client: BulkClient,
    bulk_batch_size: usize,
    data_source_name: String,
}

impl BulkIndexWriter {
    pub fn new(
        client: BulkClient,
        bulk_batch_size: usize,
        data_source_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bulk_batch_size,
            data_source_name: data_source_name.into(),
        }
    }

    /// Submits `pending`, sleeping and retrying on transient failure
    /// without clearing the buffer, and propagating any permanent failure.
    async fn flush(&self, pending: &[IndexRequestPair]) -> Result<(), Error> {
        if pending.is_empty() {
            return Ok(());
        }
        let mut ndjson = String::new();
        for pair in pending {
            ndjson.push_str(&serde_json::to_string(&pair.header).map_err(Error::MalformedJson)?);
            ndjson.push('\n');
            ndjson.push_str(&serde_json::to_string(&pair.body).map_err(Error::MalformedJson)?);
            ndjson.push('\n');
        }

        loop {
            match self.client.bulk(&ndjson).await {
                Ok(()) => return Ok(()),
                Err(Error::RemoteTransient(msg)) => {
                    warn!(error = %msg, "transient bulk index error, retrying held buffer");
                    tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[async_trait]
impl Writer<IndexRequestPair> for BulkIndexWriter {
    async fn run(
        &mut self,
        mut rx: QueueRx<IndexRequestPair>,
        n_producers: usize,
        cancel: CancellationToken,
    ) -> Result<StageSummary, Error> {
        let mut summary = StageSummary::new(self.data_source_name.clone());

        let mut pending: Vec<IndexRequestPair> = Vec::with_capacity(self.bulk_batch_size);
        let mut sentinels_seen = 0usize;
        let mut indexed_records = 0u64;
        let mut indexed_batches = 0u64;

        while let Some(item) = rx.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            match item {
                QueueItem::Sentinel => {
                    sentinels_seen += 1;
                    if sentinels_seen == n_producers {
                        break;
                    }
                }
                QueueItem::Payload(pair) => {
                    pending.push(pair);
                    if pending.len() >= self.bulk_batch_size {
                        self.flush(&pending).await?;
                        indexed_records += pending.len() as u64;
                        indexed_batches += 1;
                        pending.clear();
                    }
                }
            }
        }

        if !pending.is_empty() {
            let flushed = pending.len() as u64;
            self.flush(&pending).await?;
            indexed_records += flushed;
            indexed_batches += 1;
        }

        summary.output_records = indexed_records;
        summary.output_batches = indexed_batches;
        // Timing, input stats, and throughput are finalized by `Stage::run`
        // once the reader's count is known too.
        info!(indexed_records, indexed_batches, "bulk index writer finished");
        Ok(summary)
    }
}
