//! Reader/writer progress counters and the background status monitor task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Running state reported by a reader or writer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Done,
}

/// A single progress counter shared between an I/O task and the monitor.
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    pub state: RunState,
    pub records: u64,
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self {
            state: RunState::Running,
            records: 0,
        }
    }
}

/// Sender/receiver pair for a progress counter, backed by a `watch` channel
/// so the monitor always sees the latest value without buffering history.
pub fn progress_channel() -> (watch::Sender<ProgressCounter>, watch::Receiver<ProgressCounter>) {
    watch::channel(ProgressCounter::default())
}

/// Periodically logs reader and writer progress until both report
/// [`RunState::Done`] or cancellation is requested.
pub struct StatusMonitor {
    reader: watch::Receiver<ProgressCounter>,
    writer: watch::Receiver<ProgressCounter>,
    interval: Duration,
    label: Arc<str>,
}

impl StatusMonitor {
    pub fn new(
        label: impl Into<Arc<str>>,
        reader: watch::Receiver<ProgressCounter>,
        writer: watch::Receiver<ProgressCounter>,
    ) -> Self {
        Self {
            reader,
            writer,
            interval: Duration::from_secs(1),
            label: label.into(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let r = self.reader.borrow().clone();
                    let w = self.writer.borrow().clone();
                    info!(
                        stage = %self.label,
                        reader_records = r.records,
                        writer_records = w.records,
                        "stage progress"
                    );
                    if r.state == RunState::Done && w.state == RunState::Done {
                        break;
                    }
                }
            }
        }
    }
}
