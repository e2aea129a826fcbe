//! Pipeline-wide error type.
//!
//! Mirrors the error classes named for this pipeline: malformed records are
//! skipped inline by the extractor and never become an `Error`; everything
//! else propagates here and, if not transient, fails the owning stage.

/// Errors raised anywhere in the corpusforge pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A queue channel closed while a reader, worker, or writer still
    /// expected to send or receive on it.
    #[error("queue closed unexpectedly: {0}")]
    QueueClosed(&'static str),

    /// A raw input line was not valid JSON.
    #[error("malformed json record: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The archive file could not be opened or its footer was missing or
    /// corrupt, meaning a prior write was interrupted.
    #[error("archive unreadable: {0}")]
    ArchiveUnreadable(String),

    /// A transient failure talking to the remote search engine: connection
    /// timeout or transport error. Callers should retry with the buffer
    /// held, not cleared.
    #[error("transient remote error: {0}")]
    RemoteTransient(String),

    /// A permanent failure talking to the remote search engine: any
    /// non-2xx response that is not classified as transient.
    #[error("remote error ({status}): {body}")]
    RemotePermanent { status: u16, body: String },

    /// A data-source descriptor failed validation before a stage started.
    #[error("invalid data source descriptor: {0}")]
    InvalidDescriptor(String),

    /// Wraps any other error, preserving its context.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
