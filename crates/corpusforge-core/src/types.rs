//! Domain record types shared between readers, transforms, and writers.

use serde::{Deserialize, Serialize};

/// A raw record as produced by one of the two readers, before extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawRecord {
    /// One line-pair record from a gzip CirrusSearch dump: the body line,
    /// still JSON-encoded.
    CirrusSearchLine(String),
    /// One `<page>` element from a bz2 MediaWiki XML dump, already
    /// extracted by the SAX reader's tag state machine.
    XmlPage { title: String, text: String },
}

/// One chunk of cleaned, tokenizer-bounded text ready for embedding.
pub type Chunk = String;

/// A dense embedding vector produced by the embed transform.
pub type Embedding = Vec<f32>;

/// One half of a bulk-index request pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHeader {
    pub index: IndexAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexAction {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBody {
    pub text_embedding: Embedding,
}

/// A complete header/body pair, emitted by the build-request transform and
/// consumed two-at-a-time by the bulk-index writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequestPair {
    pub header: IndexHeader,
    pub body: IndexBody,
}
