use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use sentiflow::client::{ClientError, SentimentClient, DEFAULT_URL};
use sentiflow::predict::{collect_inputs, predict_batch, render_predictions, write_predictions};
use sentiflow::service::serving_normalization;
use sentiflow::training::resolve_normalization;
use sentiflow::{
    evaluate, init_logger, preprocess, service, train, Algorithm, ArtifactStore, Classifier,
    NormalizeOptions, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "sentiflow", author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a raw labeled dataset into a cleaned one; steps run only when named
    Preprocess {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Fold text to lower case
        #[arg(long)]
        lowercase: bool,
        /// Strip ASCII punctuation
        #[arg(long)]
        remove_punctuation: bool,
        /// Strip ASCII digits
        #[arg(long)]
        remove_numbers: bool,
    },
    /// Fit a classifier on a cleaned dataset and write the model artifact.
    /// The normalization recorded by `preprocess` is stored with it
    Train {
        #[arg(long)]
        data: PathBuf,
        /// Artifact path; defaults to the model store
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        algorithm: Option<Algorithm>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Score a model artifact on a labeled dataset and write a metrics report
    Evaluate {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Serve a model artifact over HTTP
    Serve {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        host: Option<String>,
        #[arg(short = 'P', long)]
        port: Option<u16>,
    },
    /// Classify a text, or every line of a text file
    Predict {
        #[arg(long)]
        model: PathBuf,
        /// Literal text, or a path to a file with one text per line
        #[arg(long)]
        input: String,
        /// Write the JSON results here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Talk to a running service
    Client {
        /// Base URL of the service
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Check that the service is up
    Health,
    /// Classify one text
    Classify { text: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let start_time = Instant::now();

    match cli.command {
        Command::Preprocess {
            input,
            output,
            lowercase,
            remove_punctuation,
            remove_numbers,
        } => {
            // flags replace any configured options; with neither, no step runs
            let options = if lowercase || remove_punctuation || remove_numbers {
                NormalizeOptions::default()
                    .with_lowercase(lowercase)
                    .with_remove_punctuation(remove_punctuation)
                    .with_remove_numbers(remove_numbers)
            } else {
                config.normalization.unwrap_or_default()
            };
            let report = preprocess(&input, &output, &options)
                .with_context(|| format!("Preprocessing {} failed", input.display()))?;
            println!(
                "Kept {} of {} records ({} dropped) -> {}",
                report.kept,
                report.total,
                report.dropped,
                report.output.display()
            );
        }
        Command::Train {
            data,
            output,
            algorithm,
            seed,
            epochs,
        } => {
            let mut train_config = config.train.clone();
            if let Some(algorithm) = algorithm {
                train_config.algorithm = algorithm;
            }
            if let Some(seed) = seed {
                train_config.seed = seed;
            }
            if let Some(epochs) = epochs {
                train_config.epochs = epochs;
            }
            let output = output
                .unwrap_or_else(|| ArtifactStore::new_default().artifact_path(&config.artifact_name));

            let normalization = resolve_normalization(&data, config.normalization)?;
            let report = train(&data, &output, &train_config, &normalization)
                .with_context(|| format!("Training on {} failed", data.display()))?;
            info!(
                "Training finished in {:.2?} (training accuracy {:.3})",
                start_time.elapsed(),
                report.training_accuracy
            );
            println!("{}", report.artifact.display());
        }
        Command::Evaluate { model, data, output } => {
            let report = evaluate(&model, &data, &output)
                .with_context(|| format!("Evaluating {} failed", model.display()))?;
            println!(
                "accuracy {:.4}, macro F1 {:.4} -> {}",
                report.metrics.accuracy,
                report.metrics.macro_f1,
                output.display()
            );
        }
        Command::Serve { model, host, port } => {
            let mut service_config = config.service.clone();
            if let Some(host) = host {
                service_config.host = host;
            }
            if let Some(port) = port {
                service_config.port = port;
            }
            service::serve(&model, &service_config, config.normalization)
                .await
                .with_context(|| format!("Serving {} failed", model.display()))?;
        }
        Command::Predict { model, input, output } => {
            run_predict(&model, &input, output.as_deref(), config.normalization)?;
        }
        Command::Client { url, action } => return run_client(&url, action).await,
    }

    Ok(ExitCode::SUCCESS)
}

fn run_predict(
    model: &Path,
    input: &str,
    output: Option<&Path>,
    configured: Option<NormalizeOptions>,
) -> Result<()> {
    let classifier =
        Classifier::load(model).with_context(|| format!("Failed to load {}", model.display()))?;
    let options = serving_normalization(&classifier, configured);
    let texts = collect_inputs(input)?;
    let predictions = predict_batch(&classifier, &texts, &options);
    match output {
        Some(path) => {
            write_predictions(path, &predictions)?;
            info!("Wrote {} predictions to {}", predictions.len(), path.display());
        }
        None => print!("{}", render_predictions(&predictions)?),
    }
    Ok(())
}

async fn run_client(url: &str, action: ClientAction) -> Result<ExitCode> {
    let client = SentimentClient::new(url)?;
    let result = match action {
        ClientAction::Health => client
            .health()
            .await
            .map(|h| println!("Service at {} is {}", client.base_url(), h.status)),
        ClientAction::Classify { text } => client.classify(&text).await.map(|r| {
            println!("{} (confidence {:.3})", r.label, r.confidence);
        }),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e @ ClientError::ServiceUnavailable { .. }) => {
            eprintln!("{}", e);
            Ok(ExitCode::from(2))
        }
        Err(ClientError::Validation(message)) => {
            eprintln!("Validation error: {}", message);
            Ok(ExitCode::from(3))
        }
        Err(e) => Err(e.into()),
    }
}
