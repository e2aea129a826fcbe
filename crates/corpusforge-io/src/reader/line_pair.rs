//! Line-pair reader: gzip-compressed dump of alternating header/body lines,
//! one record per odd line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use async_trait::async_trait;
use corpusforge_core::error::Error;
use corpusforge_core::queue::{send_sentinels, QueueItem, QueueTx};
use corpusforge_core::stage::Reader;
use corpusforge_core::types::RawRecord;
use flate2::read::GzDecoder;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct LinePairReader {
    path: PathBuf,
    /// `None` means read every record in the dump.
    records_target: Option<usize>,
}

impl LinePairReader {
    pub fn new(path: impl Into<PathBuf>, records_target: Option<usize>) -> Self {
        Self {
            path: path.into(),
            records_target,
        }
    }
}

#[async_trait]
impl Reader<RawRecord> for LinePairReader {
    async fn run(
        &mut self,
        tx: QueueTx<RawRecord>,
        n_workers: usize,
        cancel: CancellationToken,
    ) -> Result<u64, Error> {
        let path = self.path.clone();
        let records_target = self.records_target;
        let tx2 = tx.clone();
        let cancel2 = cancel.clone();
        let records_read = tokio::task::spawn_blocking(move || -> Result<u64, Error> {
            let file = File::open(&path).map_err(|e| Error::Other(e.into()))?;
            let decoder = GzDecoder::new(file);
            let reader = BufReader::new(decoder);

            let mut records_read = 0u64;
            for (line_num, line) in reader.lines().enumerate() {
                if cancel2.is_cancelled() {
                    break;
                }
                let line = line.map_err(|e| Error::Other(e.into()))?;
                // Header/body lines alternate; only odd lines carry the body.
                if line_num % 2 != 0 {
                    if tx2
                        .blocking_send(QueueItem::Payload(RawRecord::CirrusSearchLine(line)))
                        .is_err()
                    {
                        break;
                    }
                    records_read += 1;
                    if let Some(target) = records_target {
                        if records_read as usize >= target {
                            break;
                        }
                    }
                }
            }
            Ok(records_read)
        })
        .await
        .map_err(|e| Error::Other(e.into()))??;

        info!(records_read, "line-pair reader finished");
        send_sentinels(&tx, n_workers).await;
        Ok(records_read)
    }
}
