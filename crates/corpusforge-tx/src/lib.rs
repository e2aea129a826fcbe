//! # corpusforge-tx
//!
//! Transform operators for the corpusforge pipeline: extraction (by
//! registry, per data source), text normalization and chunking, embedding,
//! and bulk-index request construction.

#![allow(unused)]

/// Raw-record extraction: CirrusSearch and XML-page extractors.
pub mod extract;

/// Text normalization rewrite table and tokenizer-bounded chunking.
pub mod parse;

/// Parse/chunk transform wiring `parse` into the worker-facing interface.
pub mod chunk;

/// Embedding transform: tokenize + transformer encoder + CLS pooling.
pub mod embed;

/// Build-request transform: embedding -> upsert-by-id header/body pair.
pub mod request;

/// Extractor registry, resolved once at process start.
pub mod registry;

pub use chunk::ParseChunkTransform;
pub use embed::EmbedTransform;
pub use registry::{build_extractor_registry, ExtractorRegistry};
pub use request::BuildRequestTransform;
