//! CLI entry point for inspecting formatting models and tuning their base model.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use style_format::{FeatureExtractor, FormatModel, PersistentModel, rule_to_comment};
use style_optimizer::{CsrMatrix, Optimizer, OptimizerConfig};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect learned code-formatting rules and tune their base model",
    long_about = "Inspect learned code-formatting rules and tune their base model.\n\n\
                  EXAMPLES:\n  \
                  # Summary of a trained model\n  \
                  style-format dump --model model.json\n\n  \
                  # Review comments for every javascript rule\n  \
                  style-format describe --model model.json --extractor fe.json --language javascript\n\n  \
                  # Search base model parameters on a feature table\n  \
                  style-format optimize --input features.csv --label y --n-iter 30 --json"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the metadata and per-language rule summary of a model
    Dump {
        /// Path to the saved model
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Print one review comment per rule
    Describe {
        /// Path to the saved model
        #[arg(short, long)]
        model: PathBuf,

        /// Path to the fitted feature extractor (JSON)
        #[arg(short, long)]
        extractor: PathBuf,

        /// Only describe the rules of this language (default: all, sorted)
        #[arg(long)]
        language: Option<String>,
    },

    /// Search the best base model parameters on a labelled feature table
    Optimize {
        /// CSV file with one row per sample
        #[arg(short, long)]
        input: PathBuf,

        /// Name of the label column; every other numeric column is a feature
        #[arg(long)]
        label: String,

        /// Number of stratified cross-validation folds
        #[arg(long, default_value = "3")]
        cv: usize,

        /// Number of objective evaluations (at least 10 are made)
        #[arg(long, default_value = "50")]
        n_iter: usize,

        /// Worker threads (default: all cores)
        #[arg(long)]
        n_jobs: Option<usize>,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output JSON to stdout instead of a human-readable summary
        ///
        /// Disables all logs so the output can be piped: `... --json | jq .score`
        #[arg(long)]
        json: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so that stdout carries
/// only JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json_output = matches!(args.command, Command::Optimize { json: true, .. });
    init_logging(&args.log_level, args.quiet, json_output);

    match args.command {
        Command::Dump { model } => run_dump(&model),
        Command::Describe {
            model,
            extractor,
            language,
        } => run_describe(&model, &extractor, language.as_deref()),
        Command::Optimize {
            input,
            label,
            cv,
            n_iter,
            n_jobs,
            seed,
            json,
        } => {
            let mut builder = OptimizerConfig::builder()
                .cv_folds(cv)
                .n_iter(n_iter)
                .random_state(seed);
            if let Some(jobs) = n_jobs {
                builder = builder.n_jobs(jobs);
            }
            run_optimize(&input, &label, builder.build()?, json)
        }
    }
}

fn run_dump(model_path: &Path) -> Result<()> {
    let model = FormatModel::load(model_path)?;
    println!("{}", model.dump());
    Ok(())
}

fn run_describe(model_path: &Path, extractor_path: &Path, language: Option<&str>) -> Result<()> {
    let model = FormatModel::load(model_path)?;
    let extractor = load_extractor(extractor_path)?;

    let languages: Vec<&str> = match language {
        Some(lang) => vec![lang],
        None => model.languages(),
    };
    if languages.is_empty() {
        warn!("{} contains no rules", model_path.display());
    }

    for lang in languages {
        let rules = model.rules(lang)?;
        info!("{}: {}", lang, rules);
        println!("# {}", lang);
        for (i, rule) in rules.iter().enumerate() {
            println!("{}\n", rule_to_comment(rule, &extractor, Some(i + 1))?);
        }
    }
    Ok(())
}

fn load_extractor(path: &Path) -> Result<FeatureExtractor> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open feature extractor {}", path.display()))?;
    let extractor: FeatureExtractor = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse feature extractor {}", path.display()))?;
    if !extractor.is_fitted() {
        warn!("Feature extractor {} is not fitted", path.display());
    }
    Ok(extractor)
}

fn run_optimize(input: &Path, label: &str, config: OptimizerConfig, json: bool) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("Input file not found: {}", input.display()));
    }

    info!("Loading training data from: {}", input.display());
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(input.to_path_buf()))?
        .finish()?;
    info!("Dataset loaded successfully: {:?}", df.shape());

    let (x, y, classes) = training_data(&df, label)?;
    info!(
        "{} samples, {} features, {} classes",
        y.len(),
        x.shape().1,
        classes.len()
    );

    let (score, params) = Optimizer::new(config).optimize(&x, &y)?;

    if json {
        let report = serde_json::json!({
            "score": score,
            "params": params,
            "classes": classes,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Best cross-validated accuracy: {:.4}", score);
        for (name, value) in &params {
            println!("  {:<20} {}", name, value);
        }
    }
    Ok(())
}

fn is_feature_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Split a table into a sparse feature matrix and label ids.
///
/// Labels are mapped to ids in sorted order of their text; the returned
/// class names are indexed by id. Missing feature values count as zero.
fn training_data(df: &DataFrame, label: &str) -> Result<(CsrMatrix, Vec<usize>, Vec<String>)> {
    let label_column = df
        .column(label)
        .with_context(|| format!("Label column '{}' not found", label))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let label_values: Vec<String> = label_column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Row {} has no label", row))
        })
        .collect::<Result<_>>()?;

    let mut ids: BTreeMap<&str, usize> = label_values.iter().map(|v| (v.as_str(), 0)).collect();
    for (id, value) in ids.values_mut().enumerate() {
        *value = id;
    }
    let y: Vec<usize> = label_values.iter().map(|v| ids[v.as_str()]).collect();
    let classes: Vec<String> = ids.keys().map(|v| v.to_string()).collect();

    let mut triplets = Vec::new();
    let mut n_features = 0;
    for column in df.get_columns() {
        if column.name().as_str() == label {
            continue;
        }
        if !is_feature_dtype(column.dtype()) {
            debug!("Skipping non-numeric column '{}'", column.name());
            continue;
        }
        let values = column
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        for (row, value) in values.f64()?.into_iter().enumerate() {
            if let Some(value) = value.filter(|v| *v != 0.0) {
                triplets.push((row, n_features, value as f32));
            }
        }
        n_features += 1;
    }
    if n_features == 0 {
        bail!("No numeric feature columns besides '{}'", label);
    }

    let x = CsrMatrix::from_triplets(df.height(), n_features, &triplets)?;
    Ok((x, y, classes))
}
