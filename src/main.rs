mod config;
mod frameworks;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use amlb_data::{DataType, Dataset, DatasetType, FileDataset, RawRetention, TaskName};
use amlb_rf::Metric;

use crate::config::{TaskConfig, default_metric, parse_param};
use crate::frameworks::RunSummary;

#[derive(Parser)]
#[command(name = "amlb")]
#[command(about = "Benchmark random-forest frameworks on ARFF/CSV train/test splits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Task type accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskType {
    Binary,
    Multiclass,
    Regression,
}

impl From<TaskType> for DatasetType {
    fn from(value: TaskType) -> Self {
        match value {
            TaskType::Binary => DatasetType::Binary,
            TaskType::Multiclass => DatasetType::Multiclass,
            TaskType::Regression => DatasetType::Regression,
        }
    }
}

/// The train/test pair and its target.
#[derive(Args, Debug, Clone)]
struct DatasetArgs {
    /// Training split (.arff or .csv)
    #[arg(long)]
    train: PathBuf,

    /// Test split, same format as the training split
    #[arg(long)]
    test: PathBuf,

    /// Name of the target feature
    #[arg(long)]
    target: String,

    /// Task type (inferred from the target when not set)
    #[arg(long = "type", value_enum)]
    task_type: Option<TaskType>,

    /// Keep raw split data cached after encoding
    #[arg(long, default_value_t = false)]
    keep_raw: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train a framework on the training split and write test predictions
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Framework to run: "RandomForest" or "TunedRandomForest"
        #[arg(long, default_value = "RandomForest")]
        framework: String,

        /// Task name for output files (must match [a-zA-Z0-9_.-]+)
        #[arg(long)]
        name: String,

        /// Metric to optimise: acc, logloss, auc, rmse, mae or r2 (defaults by task type)
        #[arg(long)]
        metric: Option<Metric>,

        /// Time budget for the run
        #[arg(long, default_value_t = 3600)]
        max_runtime_seconds: u64,

        /// Cores available to the framework (defaults to --threads, then all cores)
        #[arg(long)]
        cores: Option<usize>,

        /// Output directory for the predictions file
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Framework parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Print the features and task type of a train/test pair
    Inspect {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct RunOutput {
    task: String,
    framework: String,
    dataset_type: DatasetType,
    metric: String,
    predictions_file: PathBuf,
    #[serde(flatten)]
    summary: RunSummary,
}

#[derive(Serialize)]
struct FeatureOutput {
    index: usize,
    name: String,
    data_type: Option<DataType>,
    n_values: Option<usize>,
    has_missing_values: bool,
    is_target: bool,
}

#[derive(Serialize)]
struct InspectOutput {
    format: String,
    dataset_type: DatasetType,
    target: String,
    n_train: usize,
    n_test: usize,
    features: Vec<FeatureOutput>,
}

fn open_dataset(args: &DatasetArgs) -> Result<FileDataset> {
    let mut dataset = FileDataset::open(&args.train, &args.test, &args.target)
        .with_context(|| format!("failed to open dataset {}", describe(&args.train, &args.test)))?;
    if let Some(task_type) = args.task_type {
        dataset = dataset.with_type(task_type.into())?;
    }
    if args.keep_raw {
        dataset = dataset.with_raw_retention(RawRetention::Keep);
    }
    info!(
        format = %dataset.format(),
        dataset_type = %dataset.dataset_type(),
        n_features = dataset.features().len(),
        "dataset opened"
    );
    Ok(dataset)
}

fn describe(train: &Path, test: &Path) -> String {
    format!("{} / {}", train.display(), test.display())
}

fn default_cores(threads: Option<usize>) -> usize {
    threads
        .or_else(|| std::thread::available_parallelism().ok().map(usize::from))
        .unwrap_or(1)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Run {
            dataset: dataset_args,
            framework,
            name,
            metric,
            max_runtime_seconds,
            cores,
            output_dir,
            params,
        } => {
            let framework = frameworks::lookup(&framework)?;
            let dataset = open_dataset(&dataset_args)?;
            let dataset_type = dataset.dataset_type();

            let config = TaskConfig {
                name: TaskName::new(name)?,
                framework: framework.name().to_string(),
                metric: metric.unwrap_or_else(|| default_metric(dataset_type)),
                seed: cli.seed,
                cores: cores.unwrap_or_else(|| default_cores(cli.threads)),
                max_runtime_seconds,
                output_dir,
                framework_params: params.into_iter().collect::<BTreeMap<_, _>>(),
            };
            info!(
                task = %config.name,
                framework = framework.name(),
                metric = %config.metric,
                cores = config.cores,
                "running task"
            );

            let summary = framework
                .run(&dataset, &config)
                .with_context(|| format!("{} failed on task {}", framework.name(), config.name))?;
            dataset.release(None);

            let output = RunOutput {
                task: config.name.to_string(),
                framework: config.framework.clone(),
                dataset_type,
                metric: config.metric.to_string(),
                predictions_file: config.output_predictions_file(),
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Inspect { dataset: dataset_args } => {
            let dataset = open_dataset(&dataset_args)?;
            let n_train = dataset
                .train()
                .data()
                .context("failed to load training split")?
                .nrows();
            let n_test = dataset
                .test()
                .data()
                .context("failed to load test split")?
                .nrows();

            let output = InspectOutput {
                format: dataset.format().to_string(),
                dataset_type: dataset.dataset_type(),
                target: dataset.target().name().to_string(),
                n_train,
                n_test,
                features: dataset
                    .features()
                    .iter()
                    .map(|f| FeatureOutput {
                        index: f.index(),
                        name: f.name().to_string(),
                        data_type: f.data_type().cloned(),
                        n_values: f.values().map(<[String]>::len),
                        has_missing_values: f.has_missing_values(),
                        is_target: f.is_target(),
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
