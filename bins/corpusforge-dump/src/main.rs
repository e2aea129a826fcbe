//! # corpusforge-dump
//!
//! Standalone dump utilities that sit outside the idempotent four-stage
//! pipeline: processing a single dump file directly to an archive,
//! generating small synthetic sample dumps for local testing, and two
//! interactive REPLs for querying a populated remote index.

use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use corpusforge_core::config::ExtractorKind;
use corpusforge_core::stage::Stage;
use corpusforge_io::reader::{LinePairReader, XmlDumpReader};
use corpusforge_io::writer::ArchiveWriter;
use corpusforge_tx::registry::build_extractor_registry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "corpusforge-dump")]
#[command(about = "Dump processing, sample data, and search utilities for corpusforge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DumpKind {
    Xml,
    CirrusSearch,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extracts a single dump file straight to an archive, bypassing the
    /// idempotent pipeline driver's summary bookkeeping.
    ProcessDump {
        #[arg(long, value_enum)]
        kind: DumpKind,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 1000)]
        output_batch_size: usize,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long)]
        records_target: Option<usize>,
    },
    /// Writes a small synthetic gzip line-pair dump for local testing.
    MakeSampleData {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 50)]
        record_count: usize,
    },
    /// Interactive keyword-search REPL against a populated text index.
    TestKeywordSearch {
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        index: String,
    },
    /// Interactive semantic-search REPL against a populated KNN index.
    TestSemanticSearch {
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        index: String,
        #[arg(long, default_value_t = 768)]
        dimension: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::ProcessDump {
            kind,
            input,
            output,
            output_batch_size,
            workers,
            records_target,
        } => process_dump(kind, input, output, output_batch_size, workers, records_target).await,
        Command::MakeSampleData {
            output,
            record_count,
        } => make_sample_data(output, record_count),
        Command::TestKeywordSearch { endpoint, index } => {
            test_keyword_search(endpoint, index).await
        }
        Command::TestSemanticSearch {
            endpoint,
            index,
            dimension,
        } => test_semantic_search(endpoint, index, dimension).await,
    }
}

async fn process_dump(
    kind: DumpKind,
    input: PathBuf,
    output: PathBuf,
    output_batch_size: usize,
    workers: usize,
    records_target: Option<usize>,
) -> Result<()> {
    let registry = build_extractor_registry();
    let cancel = CancellationToken::new();
    let writer = ArchiveWriter::<String>::new(&output, output_batch_size, "ad-hoc");
    let known_total = records_target.map(|v| v as u64);

    let summary = match kind {
        DumpKind::CirrusSearch => {
            let extractor = registry.get(&ExtractorKind::CirrusSearch).unwrap().clone();
            let reader = LinePairReader::new(input, records_target);
            Stage::run(reader, extractor, writer, workers, 100, cancel, known_total).await?
        }
        DumpKind::Xml => {
            let extractor = registry.get(&ExtractorKind::XmlPage).unwrap().clone();
            let reader = XmlDumpReader::new(input);
            Stage::run(reader, extractor, writer, workers, 100, cancel, known_total).await?
        }
    };

    tracing::info!(
        output_records = summary.output_records,
        output_batches = summary.output_batches,
        "dump processed"
    );
    Ok(())
}

fn make_sample_data(output: PathBuf, record_count: usize) -> Result<()> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let file = std::fs::File::create(&output)
        .with_context(|| format!("creating {}", output.display()))?;
    let mut encoder = GzEncoder::new(file, Compression::default());

    for i in 0..record_count {
        let header = serde_json::json!({"title": format!("Sample Article {i}")});
        let body = serde_json::json!({
            "namespace": 0,
            "category": [],
            "source_text": format!(
                "Sample Article {i} is a short synthetic paragraph used for local testing. \
                 It repeats nothing important and exists only to exercise the pipeline."
            ),
        });
        writeln!(encoder, "{}", header)?;
        writeln!(encoder, "{}", body)?;
    }
    encoder.finish()?;
    tracing::info!(record_count, path = %output.display(), "wrote sample dump");
    Ok(())
}

async fn test_keyword_search(endpoint: String, index: String) -> Result<()> {
    let client = reqwest::Client::new();
    println!("keyword search against {endpoint}/{index}; empty line to quit");
    repl(|query| {
        let client = client.clone();
        let endpoint = endpoint.clone();
        let index = index.clone();
        async move {
            let body = serde_json::json!({
                "query": { "match": { "text_embedding": query } }
            });
            let url = format!("{endpoint}/{index}/_search");
            let resp = client.post(&url).json(&body).send().await?;
            println!("{}", resp.text().await?);
            Ok(())
        }
    })
    .await
}

async fn test_semantic_search(endpoint: String, index: String, dimension: usize) -> Result<()> {
    let client = reqwest::Client::new();
    println!("semantic search against {endpoint}/{index} (dimension {dimension}); empty line to quit");
    println!("enter a comma-separated vector of {dimension} floats, or a raw query string to embed elsewhere first");
    repl(|query| {
        let client = client.clone();
        let endpoint = endpoint.clone();
        let index = index.clone();
        async move {
            let vector: Vec<f32> = query
                .split(',')
                .filter_map(|v| v.trim().parse::<f32>().ok())
                .collect();
            if vector.is_empty() {
                println!("expected a comma-separated vector; got free text");
                return Ok(());
            }
            let body = serde_json::json!({
                "size": 10,
                "query": {
                    "knn": {
                        "text_embedding": { "vector": vector, "k": 10 }
                    }
                }
            });
            let url = format!("{endpoint}/{index}/_search");
            let resp = client.post(&url).json(&body).send().await?;
            println!("{}", resp.text().await?);
            Ok(())
        }
    })
    .await
}

async fn repl<F, Fut>(mut handle: F) -> Result<()>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim().to_string();
        if line.is_empty() {
            break;
        }
        if let Err(e) = handle(line).await {
            eprintln!("query failed: {e}");
        }
    }
    Ok(())
}
