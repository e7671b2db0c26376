//! CLI entry point: sink newline-delimited JSON into Neo4j.
//!
//! Acts as a minimal host engine: opens the sink, invokes it once per input
//! line in order, and closes it.

use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use graphsink::settings::{load_sink_settings, SinkSettings};
use graphsink::{
    DeserializationMappingStrategy, JsonFieldConverter, Sink, StreamSink, ValidationMode,
};
use graphsink_core::config::load_connection_map;
use graphsink_core::QueryTemplate;

#[derive(Parser)]
#[command(name = "graphsink")]
#[command(about = "Persist newline-delimited JSON records into a graph database")]
struct Cli {
    /// Query template, e.g. "CREATE (n:Person {name: $name})".
    #[arg(short, long)]
    template: Option<String>,

    /// Input file (default: stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Field that must be present in every record (repeatable).
    #[arg(long = "required")]
    required_fields: Vec<String>,

    /// Field bound only when present (repeatable).
    #[arg(long = "optional")]
    optional_fields: Vec<String>,

    /// Elements per transaction.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Reject records that leave a template placeholder unbound.
    #[arg(long)]
    strict: bool,

    /// Config file prefix (default: graphsink).
    #[arg(short, long, default_value = "graphsink")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let settings = merge_settings(&cli, load_sink_settings(&cli.config)?);

    let template = settings
        .template
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--template is required (or set sink.template in config)"))?;
    let template = match &settings.template_id {
        Some(id) => QueryTemplate::new(template).with_id(id.clone()),
        None => QueryTemplate::new(template),
    };

    let strategy = DeserializationMappingStrategy::new(template, build_converter(&settings))
        .with_validation(settings.validation);
    let mut sink = Sink::new(strategy).with_batch_size(settings.batch_size);

    let connection = load_connection_map(&cli.config)?;
    sink.open(&connection).await?;

    let result = pump(&mut sink, open_input(cli.input.as_ref()).await?).await;
    if result.is_ok() {
        if let Err(e) = sink.flush().await {
            sink.close().await;
            return Err(e.into());
        }
    }
    sink.close().await;

    let count = result?;
    tracing::info!(records = count, "Input exhausted");
    Ok(())
}

/// Feed every non-empty line to the sink, stopping at the first failure.
async fn pump(
    sink: &mut Sink<Value>,
    input: Box<dyn AsyncRead + Unpin + Send>,
) -> anyhow::Result<u64> {
    let mut lines = BufReader::new(input).lines();
    let mut line_no = 0u64;
    let mut count = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let element: Value = serde_json::from_str(&line)
            .map_err(|e| anyhow::anyhow!("line {line_no}: invalid JSON: {e}"))?;
        sink.invoke(element)
            .await
            .map_err(|e| anyhow::anyhow!("line {line_no}: {e}"))?;
        count += 1;
    }

    Ok(count)
}

async fn open_input(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
    Ok(match path {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    })
}

fn merge_settings(cli: &Cli, mut settings: SinkSettings) -> SinkSettings {
    if let Some(template) = &cli.template {
        settings.template = Some(template.clone());
    }
    if !cli.required_fields.is_empty() {
        settings.required_fields = cli.required_fields.clone();
    }
    if !cli.optional_fields.is_empty() {
        settings.optional_fields = cli.optional_fields.clone();
    }
    if let Some(batch_size) = cli.batch_size {
        settings.batch_size = batch_size;
    }
    if cli.strict {
        settings.validation = ValidationMode::Strict;
    }
    settings
}

/// With no declared fields every top-level field is bound.
fn build_converter(settings: &SinkSettings) -> JsonFieldConverter {
    if settings.required_fields.is_empty() && settings.optional_fields.is_empty() {
        return JsonFieldConverter::all_fields();
    }
    let converter = settings
        .required_fields
        .iter()
        .fold(JsonFieldConverter::new(), |c, f| c.required(f.clone()));
    settings
        .optional_fields
        .iter()
        .fold(converter, |c, f| c.optional(f.clone()))
}
