//! # corpusforge-pipeline
//!
//! Four-stage pipeline driver: extract-text, parse-text, embed-text,
//! load-text. Each stage is idempotent — if its summary file already
//! exists, the stage is skipped — and `--force_from` clears a stage and
//! every stage after it before running.
//!
//! ## Usage
//!
//! ```bash
//! corpusforge-pipeline --data-source wikipedia
//! corpusforge-pipeline --data-source wikipedia --force-from parse-text
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use corpusforge_core::config::DataSourceDescriptor;
use corpusforge_core::stage::{Stage, Transform};
use corpusforge_core::summary::{StageName, StageSummary};
use corpusforge_core::types::{Chunk, Embedding, IndexRequestPair};
use corpusforge_io::reader::{ArchiveRecordReader, LinePairReader, XmlDumpReader};
use corpusforge_io::writer::{ArchiveWriter, BulkClient, BulkIndexWriter};
use corpusforge_tx::registry::build_extractor_registry;
use corpusforge_tx::{BuildRequestTransform, EmbedTransform, ParseChunkTransform};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[derive(Parser, Debug)]
#[command(name = "corpusforge-pipeline")]
#[command(about = "Runs the extract/parse/embed/load pipeline over one data source")]
struct Args {
    /// Name of the data source descriptor to run, e.g. "wikipedia".
    #[arg(long, default_value = "wikipedia")]
    data_source: String,

    /// Directory containing `{data_source}.json` descriptors.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Root directory for raw dump files.
    #[arg(long, default_value = "data/raw")]
    raw_data_root: PathBuf,

    /// Root directory for persisted pipeline state (archives and summaries).
    #[arg(long, default_value = "data")]
    data_root: PathBuf,

    /// Re-run from this stage onward, deleting its summary and output
    /// artifacts (and those of every following stage) first.
    #[arg(long, value_enum, default_value = "none")]
    force_from: ForceFrom,

    /// Number of transform workers per stage. Defaults to available
    /// parallelism minus a reservation for the reader and writer tasks.
    #[arg(long)]
    workers: Option<usize>,

    /// Bounded queue capacity between reader, workers, and writer.
    #[arg(long, default_value_t = 100)]
    queue_capacity: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ForceFrom {
    None,
    ExtractText,
    ParseText,
    EmbedText,
    LoadText,
}

impl ForceFrom {
    fn as_stage(self) -> Option<StageName> {
        match self {
            ForceFrom::None => None,
            ForceFrom::ExtractText => Some(StageName::ExtractText),
            ForceFrom::ParseText => Some(StageName::ParseText),
            ForceFrom::EmbedText => Some(StageName::EmbedText),
            ForceFrom::LoadText => Some(StageName::LoadText),
        }
    }
}

fn archive_path(state_dir: &Path, stage: StageName) -> PathBuf {
    let file = match stage {
        StageName::ExtractText => "extracted_text.cfa",
        StageName::ParseText => "parsed_chunks.cfa",
        StageName::EmbedText => "embeddings.cfa",
        StageName::LoadText => "loaded.marker",
    };
    state_dir.join(file)
}

fn summary_path(state_dir: &Path, stage: StageName) -> PathBuf {
    state_dir.join(stage.summary_file_name())
}

fn write_summary(path: &Path, summary: &StageSummary) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(summary)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// A stage's known corpus size is the previous stage's output record count,
/// already persisted in its summary once that stage has run.
fn known_total_from_previous_stage(state_dir: &Path, previous: StageName) -> Option<u64> {
    let bytes = std::fs::read(summary_path(state_dir, previous)).ok()?;
    let summary: StageSummary = serde_json::from_slice(&bytes).ok()?;
    Some(summary.output_records)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let descriptor_path = args.config_dir.join(format!("{}.json", args.data_source));
    let descriptor: DataSourceDescriptor = serde_json::from_slice(
        &std::fs::read(&descriptor_path)
            .with_context(|| format!("reading {}", descriptor_path.display()))?,
    )?;
    descriptor
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid data source descriptor: {e}"))?;

    let state_dir = args.data_root.join(&descriptor.target_index_name);
    std::fs::create_dir_all(&state_dir)?;

    let n_workers = args
        .workers
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).saturating_sub(2).max(1));

    if let Some(from) = args.force_from.as_stage() {
        let from_index = StageName::ORDER.iter().position(|s| *s == from).unwrap();
        for stage in &StageName::ORDER[from_index..] {
            let _ = std::fs::remove_file(summary_path(&state_dir, *stage));
            let _ = std::fs::remove_file(archive_path(&state_dir, *stage));
            info!(?stage, "cleared stage for --force-from");
        }
    }

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let driver = async move {
        run_pipeline(&descriptor, &state_dir, &args.raw_data_root, n_workers, args.queue_capacity, run_cancel).await
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::warn!("received ctrl-c, shutting down");
            cancel.cancel();
            Ok(())
        }
        result = driver => result,
    }
}

async fn run_pipeline(
    descriptor: &DataSourceDescriptor,
    state_dir: &Path,
    raw_data_root: &Path,
    n_workers: usize,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> Result<()> {
    for stage in StageName::ORDER {
        let summary_file = summary_path(state_dir, stage);
        if summary_file.exists() {
            info!(?stage, "summary already present, skipping");
            continue;
        }
        info!(?stage, "starting stage");
        let summary = match stage {
            StageName::ExtractText => {
                run_extract_text(descriptor, state_dir, raw_data_root, n_workers, queue_capacity, cancel.clone()).await?
            }
            StageName::ParseText => {
                run_parse_text(descriptor, state_dir, n_workers, queue_capacity, cancel.clone()).await?
            }
            StageName::EmbedText => {
                run_embed_text(descriptor, state_dir, n_workers, queue_capacity, cancel.clone()).await?
            }
            StageName::LoadText => {
                run_load_text(descriptor, state_dir, n_workers, queue_capacity, cancel.clone()).await?
            }
        };
        write_summary(&summary_file, &summary)?;
        info!(?stage, "stage complete");
    }
    Ok(())
}

async fn run_extract_text(
    descriptor: &DataSourceDescriptor,
    state_dir: &Path,
    raw_data_root: &Path,
    n_workers: usize,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> Result<StageSummary> {
    let registry = build_extractor_registry();
    let extractor = registry
        .get(&descriptor.extractor)
        .expect("registry covers every ExtractorKind")
        .clone();

    let raw_path = raw_data_root.join(&descriptor.raw_data_file);
    let output_path = archive_path(state_dir, StageName::ExtractText);
    let writer = ArchiveWriter::<String>::new(
        &output_path,
        descriptor.output_batch_size,
        descriptor.name.clone(),
    );
    let known_total = descriptor.extracted_records_target.map(|v| v as u64);

    let summary = match descriptor.extractor {
        corpusforge_core::config::ExtractorKind::CirrusSearch => {
            let reader = LinePairReader::new(raw_path, descriptor.extracted_records_target);
            Stage::run(reader, extractor, writer, n_workers, queue_capacity, cancel, known_total).await?
        }
        corpusforge_core::config::ExtractorKind::XmlPage => {
            let reader = XmlDumpReader::new(raw_path);
            Stage::run(reader, extractor, writer, n_workers, queue_capacity, cancel, known_total).await?
        }
    };
    Ok(summary)
}

async fn run_parse_text(
    descriptor: &DataSourceDescriptor,
    state_dir: &Path,
    n_workers: usize,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> Result<StageSummary> {
    let input_path = archive_path(state_dir, StageName::ExtractText);
    let output_path = archive_path(state_dir, StageName::ParseText);

    let reader = ArchiveRecordReader::<String>::new(input_path);
    let transform: Arc<dyn Transform<String, Chunk>> =
        Arc::new(ParseChunkTransform::new(descriptor.max_tokens));
    let writer = ArchiveWriter::<Chunk>::new(
        &output_path,
        descriptor.output_batch_size,
        descriptor.name.clone(),
    );
    let known_total = known_total_from_previous_stage(state_dir, StageName::ExtractText);

    Stage::run(reader, transform, writer, n_workers, queue_capacity, cancel, known_total).await
}

async fn run_embed_text(
    descriptor: &DataSourceDescriptor,
    state_dir: &Path,
    n_workers: usize,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> Result<StageSummary> {
    let input_path = archive_path(state_dir, StageName::ParseText);
    let output_path = archive_path(state_dir, StageName::EmbedText);

    let reader = ArchiveRecordReader::<Chunk>::new(input_path);
    let embedder = EmbedTransform::load(&descriptor.embedding_model, candle_core::Device::Cpu)
        .await
        .context("loading embedding model")?;
    let transform: Arc<dyn Transform<Chunk, Embedding>> = Arc::new(embedder);
    let writer = ArchiveWriter::<Embedding>::new(
        &output_path,
        descriptor.output_batch_size,
        descriptor.name.clone(),
    );
    let known_total = known_total_from_previous_stage(state_dir, StageName::ParseText);

    // The embedding model is CPU/GPU bound per call; one worker per
    // configured slot is still correct since `EmbedTransform::apply`
    // itself does not block the async runtime beyond tensor ops.
    Stage::run(reader, transform, writer, n_workers, queue_capacity, cancel, known_total).await
}

async fn run_load_text(
    descriptor: &DataSourceDescriptor,
    state_dir: &Path,
    n_workers: usize,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> Result<StageSummary> {
    let input_path = archive_path(state_dir, StageName::EmbedText);

    let client = BulkClient::new(descriptor.search_endpoint.clone());
    client
        .initialize_index(&descriptor.target_index_name, &descriptor.knn_index)
        .await
        .context("initializing remote index")?;

    let reader = ArchiveRecordReader::<Embedding>::new(input_path);
    let next_id = Arc::new(AtomicU64::new(0));
    let transform: Arc<dyn Transform<Embedding, IndexRequestPair>> = Arc::new(
        BuildRequestTransform::new(descriptor.target_index_name.clone(), next_id),
    );
    let writer = BulkIndexWriter::new(client, descriptor.bulk_batch_size, descriptor.name.clone());
    let known_total = known_total_from_previous_stage(state_dir, StageName::EmbedText);

    let summary =
        Stage::run(reader, transform, writer, n_workers, queue_capacity, cancel, known_total).await?;

    // LoadText has no archive output; drop a zero-byte marker so
    // `--force-from` has a consistent artifact to remove.
    std::fs::write(archive_path(state_dir, StageName::LoadText), b"")?;
    Ok(summary)
}
