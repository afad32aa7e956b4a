//! MADS Prediction - Command Line Entry Point
//!
//! Imports pipeline artifacts into the model store and runs predictions on
//! descriptor values or SMILES tables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mads_predict::{
    chem::GraphCanonicalizer,
    config::AppConfig,
    models::{ArtifactFormat, InferenceEngine, InputValues},
    render::ContributionRenderer,
    types::{ModelMetadata, PredictionOutput, ResultTable, SMILES_KEY},
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "mads-predict", author, version, about)]
struct Args {
    /// Path to config toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a pipeline artifact with its metadata
    Import {
        /// Artifact file (.onnx or .json)
        #[arg(long)]
        file: PathBuf,

        /// Metadata json (input_type, input_spec, outports)
        #[arg(long)]
        metadata: PathBuf,

        /// Display name, defaults to the file stem
        #[arg(long)]
        name: Option<String>,

        /// Replace the model with this id
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// Run a stored model
    Predict {
        #[arg(long)]
        model: Uuid,

        /// SMILES table, one record per line
        #[arg(long)]
        input: Option<PathBuf>,

        /// Named input value, repeatable (NAME=VALUE)
        #[arg(long = "value", value_parser = parse_value)]
        values: Vec<(String, String)>,

        /// Render per-atom contributions
        #[arg(long)]
        color_atoms: bool,

        /// Write the result table to this CSV file instead of stdout
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Delete a stored model
    Remove {
        #[arg(long)]
        model: Uuid,
    },

    /// List stored models
    List,

    /// Replace structure cells of a CSV table with SVG depictions
    Depict {
        /// CSV table with a header row
        #[arg(long)]
        input: PathBuf,

        /// Column holding SMILES, repeatable
        #[arg(long = "column", default_value = SMILES_KEY)]
        columns: Vec<String>,

        /// Write the table to this CSV file instead of stdout
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn parse_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.logging.directives())
            .context("Invalid logging.level")?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
    Ok(())
}

fn write_table(table: &ResultTable, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(file)
        }
        None => table.write_csv(io::stdout().lock()),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_path(path),
        None if Path::new("config/config.toml").exists() => AppConfig::load(),
        None => Ok(AppConfig::default()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    init_tracing(&config)?;
    info!(store = %config.models.store_dir, "Configuration loaded successfully");

    let engine = || InferenceEngine::new(&config);

    match args.command {
        Command::Import {
            file,
            metadata,
            name,
            id,
        } => {
            let format = ArtifactFormat::from_path(&file)?;
            let artifact =
                fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let metadata: ModelMetadata = serde_json::from_slice(
                &fs::read(&metadata)
                    .with_context(|| format!("Failed to read {}", metadata.display()))?,
            )
            .context("Invalid model metadata")?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "model".to_string()),
            };

            let stored = engine()?.import(
                id.unwrap_or_else(Uuid::new_v4),
                &name,
                format,
                &artifact,
                metadata,
            )?;
            println!("{}", stored.id);
        }

        Command::Predict {
            model,
            input,
            values,
            color_atoms,
            csv,
        } => {
            let mut inputs: InputValues = values.into_iter().collect();
            if let Some(path) = input {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                inputs.insert(SMILES_KEY, &text);
            }
            if inputs.is_empty() {
                bail!("no input given; use --input or --value");
            }

            let engine = engine()?;
            match engine.predict(model, &inputs, color_atoms)? {
                PredictionOutput::Scalar(value) => println!("{value}"),
                PredictionOutput::Table(table) => {
                    let stats = table.stats();
                    info!(
                        lines = stats.lines,
                        resolved = stats.resolved,
                        dropped = stats.dropped,
                        "Batch resolved"
                    );
                    write_table(&table, csv.as_deref())?;
                }
            }
            engine.metrics().print_summary();
        }

        Command::Remove { model } => {
            let removed = engine()?.remove(model)?;
            info!(id = %removed.id, name = %removed.name, "Model removed");
        }

        Command::List => {
            for model in engine()?.store().list()? {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    model.id,
                    model.name,
                    model.metadata.input_type,
                    model.updated_at.to_rfc3339()
                );
            }
        }

        Command::Depict {
            input,
            columns,
            csv,
        } => {
            let file = fs::File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let mut table = ResultTable::read_csv(file)?;
            let renderer = ContributionRenderer::new(config.rendering.clone());
            renderer.depict_columns(&mut table, &columns, &GraphCanonicalizer);
            info!(rows = table.len(), columns = ?columns, "Table depicted");
            write_table(&table, csv.as_deref())?;
        }
    }

    Ok(())
}
