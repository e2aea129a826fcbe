//! Stage orchestration: Reader, Transform, and Writer traits, plus the
//! `Stage` runner that wires a reader, a pool of transform workers, and a
//! writer together over two bounded queues.
//!
//! This is the generalization of the reader process / worker pool / writer
//! process topology: one reader produces raw records, `n_workers` transform
//! tasks consume them off a shared queue and each forwards exactly one
//! sentinel downstream when it personally observes one, and a single
//! writer batches transformed output and returns a [`StageSummary`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::queue::{bounded, QueueItem, QueueRx, QueueTx};
use crate::summary::StageSummary;

/// Produces raw records onto a queue, sending one sentinel per downstream
/// worker once the source is exhausted.
#[async_trait]
pub trait Reader<T>: Send + Sync {
    async fn run(
        &mut self,
        tx: QueueTx<T>,
        n_workers: usize,
        cancel: CancellationToken,
    ) -> Result<u64, Error>;
}

/// Consumes one item, producing zero or more output items. Called once per
/// payload by a worker task; never sees the sentinel directly.
#[async_trait]
pub trait Transform<In, Out>: Send + Sync {
    async fn apply(&self, input: In) -> Result<Vec<Out>, Error>;
}

/// Consumes transformed output until it has observed `n_producers`
/// sentinels, then returns a populated [`StageSummary`].
#[async_trait]
pub trait Writer<T>: Send + Sync {
    async fn run(
        &mut self,
        rx: QueueRx<T>,
        n_producers: usize,
        cancel: CancellationToken,
    ) -> Result<StageSummary, Error>;
}

/// Runs a reader, a pool of transform workers, and a writer as three
/// concurrent task groups connected by bounded queues, and returns the
/// writer's summary.
pub struct Stage;

impl Stage {
    #[allow(clippy::too_many_arguments)]
    pub async fn run<In, Mid>(
        mut reader: impl Reader<In> + 'static,
        transform: Arc<dyn Transform<In, Mid>>,
        mut writer: impl Writer<Mid> + 'static,
        n_workers: usize,
        queue_capacity: usize,
        cancel: CancellationToken,
        known_total_records: Option<u64>,
    ) -> Result<StageSummary, Error>
    where
        In: Send + 'static,
        Mid: Send + 'static,
    {
        let stage_started = std::time::Instant::now();
        let (reader_tx, reader_rx) = bounded::<In>(queue_capacity);
        let (writer_tx, writer_rx) = bounded::<Mid>(queue_capacity);
        let reader_rx = Arc::new(Mutex::new(reader_rx));

        let reader_cancel = cancel.clone();
        let reader_task = tokio::spawn(async move { reader.run(reader_tx, n_workers, reader_cancel).await });

        let mut worker_tasks = Vec::with_capacity(n_workers);
        for _ in 0..n_workers {
            let reader_rx = Arc::clone(&reader_rx);
            let writer_tx = writer_tx.clone();
            let transform = Arc::clone(&transform);
            let worker_cancel = cancel.clone();
            worker_tasks.push(tokio::spawn(async move {
                run_worker(reader_rx, writer_tx, transform, worker_cancel).await
            }));
        }
        drop(writer_tx);

        let writer_cancel = cancel.clone();
        let writer_task =
            tokio::spawn(async move { writer.run(writer_rx, n_workers, writer_cancel).await });

        let records_read = reader_task.await.map_err(|e| Error::Other(e.into()))??;
        for task in worker_tasks {
            task.await.map_err(|e| Error::Other(e.into()))??;
        }
        let mut summary = writer_task.await.map_err(|e| Error::Other(e.into()))??;

        // The reader and writer run concurrently, so the reader's final
        // count is only known once both have joined here. This is the
        // stage join point where input and output stats are merged into
        // one summary and throughput/ETA are derived.
        summary.input_records = records_read;
        summary.finish(stage_started.elapsed(), known_total_records);
        Ok(summary)
    }
}

async fn run_worker<In, Mid>(
    reader_rx: Arc<Mutex<QueueRx<In>>>,
    writer_tx: QueueTx<Mid>,
    transform: Arc<dyn Transform<In, Mid>>,
    cancel: CancellationToken,
) -> Result<(), Error>
where
    In: Send + 'static,
    Mid: Send + 'static,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let item = {
            let mut rx = reader_rx.lock().await;
            rx.recv().await
        };
        let item = match item {
            Some(item) => item,
            None => return Ok(()),
        };
        match item {
            QueueItem::Sentinel => {
                let _ = writer_tx.send(QueueItem::Sentinel).await;
                return Ok(());
            }
            QueueItem::Payload(input) => {
                for out in transform.apply(input).await? {
                    if writer_tx.send(QueueItem::Payload(out)).await.is_err() {
                        return Err(Error::QueueClosed("writer queue"));
                    }
                }
            }
        }
    }
}
