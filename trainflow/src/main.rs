//! trainflow CLI entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use trainflow::config::{latest_model_path, load_settings, PipelineSettings, SchemaDeclaration};
use trainflow::data::{read_csv, CollectionSource, DocumentStore};
use trainflow::events::LoggingEventSink;
use trainflow::ml::ModelBundle;
use trainflow::pipeline::TrainingPipeline;

/// Train and serve a tabular classifier from a document store.
#[derive(Parser, Debug)]
#[command(name = "trainflow")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Schema declaration (overrides `schema_path`)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Document store location (overrides TRAINFLOW_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run ingestion, validation, transformation and training
    Run,

    /// Predict labels for a CSV file with a trained model bundle
    Predict {
        /// Raw table to predict
        #[arg(short, long)]
        input: PathBuf,

        /// Model bundle; defaults to the newest run under the artifact root
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Load a CSV file into a collection of the document store
    Import {
        /// CSV file with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Target collection; defaults to `ingestion.collection_name`
        #[arg(long)]
        collection: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };
    tracing_subscriber::registry().with(layer).init();
}

fn settings(cli: &Cli) -> Result<PipelineSettings> {
    let mut settings = load_settings(cli.config.as_deref()).context("loading settings")?;
    if let Some(url) = &cli.database_url {
        settings.database_url = Some(url.clone());
    }
    if let Some(schema) = &cli.schema {
        settings.schema_path.clone_from(schema);
    }
    Ok(settings)
}

fn open_store(settings: &PipelineSettings) -> Result<Arc<DocumentStore>> {
    let url = settings.require_database_url()?;
    let store = DocumentStore::connect(url).with_context(|| format!("opening document store {url}"))?;
    tracing::info!(location = store.location(), "Opened document store");
    Ok(Arc::new(store))
}

async fn run(settings: PipelineSettings) -> Result<()> {
    let schema = SchemaDeclaration::load(&settings.schema_path)?;
    let store = open_store(&settings)?;
    let pipeline = TrainingPipeline::new(settings, schema, Arc::new(CollectionSource::new(store)))
        .with_event_sink(Arc::new(LoggingEventSink::default()));

    let outcome = pipeline.run_with_report().await;
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    let artifact = outcome.result?;
    tracing::info!(
        model = %artifact.model_path().display(),
        accuracy = artifact.metrics().accuracy,
        "Model trained"
    );
    Ok(())
}

fn predict(settings: &PipelineSettings, input: &Path, model: Option<PathBuf>) -> Result<()> {
    let model = match model {
        Some(path) => path,
        None => latest_model_path(&settings.artifact_root)
            .with_context(|| format!("scanning {}", settings.artifact_root.display()))?
            .with_context(|| {
                format!("no trained model under {}", settings.artifact_root.display())
            })?,
    };
    let bundle = ModelBundle::load(&model)?;
    let table = read_csv(input)?;
    for label in bundle.predict(&table)?.iter() {
        println!("{label}");
    }
    Ok(())
}

fn import(settings: &PipelineSettings, input: &Path, collection: Option<String>) -> Result<()> {
    let collection = collection.unwrap_or_else(|| settings.ingestion.collection_name.clone());
    let table = read_csv(input)?;
    let store = open_store(settings)?;
    let inserted = store.insert_table(&collection, &table)?;
    tracing::info!(collection = %collection, inserted, total = store.count(&collection)?, "Imported records");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    let settings = settings(&cli)?;

    match cli.command {
        Commands::Run => run(settings).await,
        Commands::Predict { input, model } => predict(&settings, &input, model),
        Commands::Import { input, collection } => import(&settings, &input, collection),
    }
}
