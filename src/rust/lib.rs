//! A text sentiment classification lifecycle: clean raw labeled text, train a
//! TF-IDF linear classifier, evaluate it, and serve it over HTTP.
//!
//! Each stage is a plain function with explicit input and output paths; the
//! only thing that crosses stage boundaries is the model artifact file.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sentiflow::{Classifier, NormalizeOptions, Record};
//!
//! let options = NormalizeOptions::standard();
//! let records = vec![
//!     Record::new(options.normalize("What a GREAT film!"), "positive"),
//!     Record::new(options.normalize("Loved every minute."), "positive"),
//!     Record::new(options.normalize("Awful, just awful."), "negative"),
//!     Record::new(options.normalize("A dull waste of time"), "negative"),
//! ];
//!
//! let classifier = Classifier::builder()
//!     .with_normalization(options)
//!     .add_records(records)?
//!     .build()?;
//!
//! let prediction = classifier.predict(&options.normalize("Great acting!"))?;
//! println!("{} ({:.2})", prediction.label, prediction.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! # Pipeline
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sentiflow::{evaluate, preprocess, train, NormalizeOptions, TrainConfig};
//! use std::path::Path;
//!
//! let options = NormalizeOptions::standard();
//! preprocess(Path::new("raw.csv"), Path::new("clean.csv"), &options)?;
//! train(Path::new("clean.csv"), Path::new("sentiment.model"), &TrainConfig::default(), &options)?;
//! evaluate(Path::new("sentiment.model"), Path::new("test.csv"), Path::new("metrics.json"))?;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod classifier;
pub mod client;
pub mod config;
pub mod dataset;
mod error;
pub mod evaluation;
pub mod features;
mod fsutil;
pub mod predict;
pub mod preprocess;
pub mod service;
pub mod text;
pub mod training;

pub use artifact::{ArtifactStore, ModelArtifact, TrainingMetadata};
pub use classifier::{Algorithm, Classifier, ClassifierBuilder, ClassifierInfo, Prediction};
pub use client::{ClientError, SentimentClient};
pub use config::{PipelineConfig, ServiceConfig, TrainConfig};
pub use dataset::{read_dataset, write_dataset, Dataset, DatasetFormat, Record};
pub use error::ClassifierError;
pub use evaluation::{evaluate, MetricsReport};
pub use predict::{predict_batch, BatchPrediction};
pub use preprocess::{preprocess, PreprocessReport};
pub use text::{normalize, NormalizeOptions};
pub use training::{train, TrainReport};

/// Initializes `env_logger` at `info`, or `debug` when `verbose` is set.
/// `RUST_LOG` takes precedence when present.
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init();
}
