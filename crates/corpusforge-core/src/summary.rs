//! Stage run summary: the record written to disk on stage completion, and
//! the witness a later pipeline invocation checks to skip an already-done
//! stage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the four fixed stages a summary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ExtractText,
    ParseText,
    EmbedText,
    LoadText,
}

impl StageName {
    /// Fixed dependency order, matching the original task chain.
    pub const ORDER: [StageName; 4] = [
        StageName::ExtractText,
        StageName::ParseText,
        StageName::EmbedText,
        StageName::LoadText,
    ];

    pub fn summary_file_name(&self) -> &'static str {
        match self {
            StageName::ExtractText => "extract_text_summary.json",
            StageName::ParseText => "parse_text_summary.json",
            StageName::EmbedText => "embed_text_summary.json",
            StageName::LoadText => "load_text_summary.json",
        }
    }
}

/// The persisted result of one stage run: input/output record and batch
/// counts, timing, and throughput projections, plus a flattened echo of the
/// data source descriptor it ran against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSummary {
    pub data_source_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub run_time_seconds: f64,

    pub input_records: u64,
    pub input_batches: u64,
    pub output_records: u64,
    pub output_batches: u64,

    pub observed_rate_records_per_second: f64,
    pub estimated_total_time_seconds: Option<f64>,

    /// Extra stage-specific fields (e.g. worker count, batch size) that do
    /// not warrant their own column.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl StageSummary {
    pub fn new(data_source_name: impl Into<String>) -> Self {
        Self {
            data_source_name: data_source_name.into(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Finalizes timing and throughput fields from a wall-clock duration.
    pub fn finish(&mut self, elapsed: std::time::Duration, estimated_total_records: Option<u64>) {
        self.finished_at = Some(Utc::now());
        self.run_time_seconds = elapsed.as_secs_f64();
        if self.run_time_seconds > 0.0 {
            self.observed_rate_records_per_second =
                self.input_records as f64 / self.run_time_seconds;
        }
        if let Some(total) = estimated_total_records {
            if self.observed_rate_records_per_second > 0.0 {
                self.estimated_total_time_seconds =
                    Some(total as f64 / self.observed_rate_records_per_second);
            }
        }
    }
}
