//! Parse/chunk transform: wires the text-normalization pipeline and the
//! tokenizer-bounded chunker into a single worker-facing transform.

use async_trait::async_trait;
use corpusforge_core::error::Error;
use corpusforge_core::stage::Transform;
use corpusforge_core::types::Chunk;

use crate::parse::{clean_text, split_into_chunks};

pub struct ParseChunkTransform {
    pub max_tokens: usize,
}

impl ParseChunkTransform {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }
}

#[async_trait]
impl Transform<String, Chunk> for ParseChunkTransform {
    async fn apply(&self, input: String) -> Result<Vec<Chunk>, Error> {
        let cleaned = clean_text(&input);
        split_into_chunks(&cleaned, self.max_tokens)
    }
}
