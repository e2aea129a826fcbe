//! Data-source descriptor: the JSON configuration document that drives one
//! run of the pipeline over one dump.
//!
//! Loaded from `{config_dir}/{name}.json`, validated before any stage is
//! allowed to start. Field names match the keys the original configuration
//! used for the same data, so a descriptor authored against that system
//! ports over unchanged.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Which extractor a data source uses. Selects an entry in the extractor
/// registry built at process start (`corpusforge_tx::registry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// CirrusSearch-style gzip JSON-lines dump: header/body line pairs.
    CirrusSearch,
    /// Plain MediaWiki XML dump, bz2-compressed.
    XmlPage,
}

/// KNN index settings, mirroring the original loader's HNSW configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnIndexSettings {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_ef_search")]
    pub ef_search: u32,
    #[serde(default = "default_ef_construction")]
    pub ef_construction: u32,
    #[serde(default = "default_m")]
    pub m: u32,
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,
}

impl Default for KnnIndexSettings {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            ef_search: default_ef_search(),
            ef_construction: default_ef_construction(),
            m: default_m(),
            number_of_shards: default_shards(),
        }
    }
}

fn default_dimension() -> usize {
    768
}
fn default_ef_search() -> u32 {
    100
}
fn default_ef_construction() -> u32 {
    128
}
fn default_m() -> u32 {
    24
}
fn default_shards() -> u32 {
    3
}

/// One data source: everything a pipeline run needs to know about the dump
/// it is ingesting and the destination it loads into.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataSourceDescriptor {
    /// Logical name, used as the persisted-state directory name.
    #[validate(length(min = 1))]
    pub name: String,

    /// Which extractor to run.
    pub extractor: ExtractorKind,

    /// Path, relative to the raw-data root, of the compressed dump file.
    #[validate(length(min = 1))]
    pub raw_data_file: String,

    /// Name of the target search-engine index.
    #[validate(length(min = 1))]
    pub target_index_name: String,

    /// Number of records per reader workunit.
    #[serde(default = "default_workunit_size")]
    pub extractor_workunit_size: usize,

    /// Number of records per archive batch written by the extract/parse
    /// stage writers.
    #[serde(default = "default_output_batch_size")]
    pub output_batch_size: usize,

    /// How many records to extract: `None` means all.
    #[serde(default)]
    pub extracted_records_target: Option<usize>,

    /// Maximum tokens per chunk under the configured tokenizer.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Hugging Face tokenizer repository id.
    #[validate(length(min = 1))]
    pub tokenizer_name: String,

    /// Hugging Face embedding model repository id.
    #[validate(length(min = 1))]
    pub embedding_model: String,

    /// Number of records per bulk-index request to the remote engine.
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,

    /// Base URL of the remote search engine, e.g. `http://localhost:9200`.
    #[validate(url)]
    pub search_endpoint: String,

    /// KNN index settings for the load stage.
    #[serde(default)]
    pub knn_index: KnnIndexSettings,
}

fn default_workunit_size() -> usize {
    1000
}
fn default_output_batch_size() -> usize {
    1000
}
fn default_max_tokens() -> usize {
    512
}
fn default_bulk_batch_size() -> usize {
    128
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn sample() -> DataSourceDescriptor {
        DataSourceDescriptor {
            name: "wikipedia".into(),
            extractor: ExtractorKind::CirrusSearch,
            raw_data_file: "wikipedia-cirrussearch.json.gz".into(),
            target_index_name: "wikipedia".into(),
            extractor_workunit_size: default_workunit_size(),
            output_batch_size: default_output_batch_size(),
            extracted_records_target: None,
            max_tokens: default_max_tokens(),
            tokenizer_name: "bert-base-uncased".into(),
            embedding_model: "bert-base-uncased".into(),
            bulk_batch_size: default_bulk_batch_size(),
            search_endpoint: "http://localhost:9200".into(),
            knn_index: KnnIndexSettings::default(),
        }
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_raw_data_file_fails() {
        let mut d = sample();
        d.raw_data_file = String::new();
        assert!(d.validate().is_err());
    }

    #[test]
    fn non_url_endpoint_fails() {
        let mut d = sample();
        d.search_endpoint = "not-a-url".into();
        assert!(d.validate().is_err());
    }
}
