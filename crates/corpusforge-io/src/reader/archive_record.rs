//! Archive record reader: replays a previously-written framed archive as
//! input to the next stage, in ascending batch-id order.

use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use corpusforge_archive::ArchiveReader as RawArchiveReader;
use corpusforge_core::error::Error;
use corpusforge_core::queue::{send_sentinels, QueueItem, QueueTx};
use corpusforge_core::stage::Reader;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ArchiveRecordReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> ArchiveRecordReader<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Reader<T> for ArchiveRecordReader<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(
        &mut self,
        tx: QueueTx<T>,
        n_workers: usize,
        cancel: CancellationToken,
    ) -> Result<u64, Error> {
        let path = self.path.clone();
        let tx2 = tx.clone();
        let cancel2 = cancel.clone();
        let records_read = tokio::task::spawn_blocking(move || -> Result<u64, Error> {
            let mut archive =
                RawArchiveReader::open(&path).map_err(|e| Error::ArchiveUnreadable(e.to_string()))?;
            let mut records_read = 0u64;
            for batch in archive.iter_batches() {
                if cancel2.is_cancelled() {
                    break;
                }
                let batch = batch.map_err(|e| Error::ArchiveUnreadable(e.to_string()))?;
                for raw in batch {
                    let record: T = serde_json::from_slice(&raw).map_err(Error::MalformedJson)?;
                    if tx2.blocking_send(QueueItem::Payload(record)).is_err() {
                        return Ok(records_read);
                    }
                    records_read += 1;
                }
            }
            Ok(records_read)
        })
        .await
        .map_err(|e| Error::Other(e.into()))??;

        info!(records_read, "archive record reader finished");
        send_sentinels(&tx, n_workers).await;
        Ok(records_read)
    }
}
