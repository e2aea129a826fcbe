//! # corpusforge-io
//!
//! Concrete reader and writer implementations for the corpusforge pipeline.
//!
//! ## Readers
//! - [`reader::LinePairReader`]: gzip CirrusSearch-style line-pair dump
//! - [`reader::XmlDumpReader`]: bz2 MediaWiki XML dump, SAX-style tag
//!   state machine
//!
//! ## Writers
//! - [`writer::ArchiveWriter`]: batches records into a framed archive file
//! - [`writer::BulkIndexWriter`]: batches upsert requests to a remote KNN
//!   search engine, with index lifecycle management via [`writer::BulkClient`]

#![allow(unused)]

/// Dump readers.
pub mod reader;

/// Archive and remote-index writers.
pub mod writer;

pub use reader::{ArchiveRecordReader, LinePairReader, XmlDumpReader};
pub use writer::{ArchiveWriter, BulkClient, BulkIndexWriter};
