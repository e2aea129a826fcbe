//! Archive writer: aggregates transformed records into fixed-size batches
//! and flushes them to a framed archive file, closing it once every
//! upstream worker has reported its sentinel.

use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use corpusforge_archive::ArchiveWriter as RawArchiveWriter;
use corpusforge_core::error::Error;
use corpusforge_core::queue::{QueueItem, QueueRx};
use corpusforge_core::stage::Writer;
use corpusforge_core::summary::StageSummary;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ArchiveWriter<T> {
    path: PathBuf,
    output_batch_size: usize,
    data_source_name: String,
    _marker: PhantomData<T>,
}

impl<T> ArchiveWriter<T> {
    pub fn new(
        path: impl Into<PathBuf>,
        output_batch_size: usize,
        data_source_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            output_batch_size,
            data_source_name: data_source_name.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Writer<T> for ArchiveWriter<T>
where
    T: Serialize + Send + 'static,
{
    async fn run(
        &mut self,
        mut rx: QueueRx<T>,
        n_producers: usize,
        cancel: CancellationToken,
    ) -> Result<StageSummary, Error> {
        let mut summary = StageSummary::new(self.data_source_name.clone());

        let mut archive = RawArchiveWriter::create(&self.path).map_err(|e| Error::Other(e.into()))?;
        let mut pending: Vec<Vec<u8>> = Vec::with_capacity(self.output_batch_size);
        let mut sentinels_seen = 0usize;
        let mut output_records = 0u64;
        let mut output_batches = 0u64;

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
                QueueItem::Payload(record) => {
                    let bytes = serde_json::to_vec(&record).map_err(Error::MalformedJson)?;
                    pending.push(bytes);
                    if pending.len() >= self.output_batch_size {
                        if archive
                            .append_batch(&pending)
                            .map_err(|e| Error::Other(e.into()))?
                            .is_some()
                        {
                            output_batches += 1;
                        }
                        output_records += pending.len() as u64;
                        pending.clear();
                    }
                }
            }
        }

        if archive
            .append_batch(&pending)
            .map_err(|e| Error::Other(e.into()))?
            .is_some()
        {
            output_batches += 1;
        }
        output_records += pending.len() as u64;

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "data_source".into(),
            serde_json::Value::String(self.data_source_name.clone()),
        );
        archive.set_metadata(metadata);
        archive.close().map_err(|e| Error::Other(e.into()))?;

        summary.output_records = output_records;
        summary.output_batches = output_batches;
        // Timing, input stats, and throughput are finalized by `Stage::run`
        // once the reader's count is known too.
        info!(output_records, output_batches, "archive writer finished");
        Ok(summary)
    }
}
