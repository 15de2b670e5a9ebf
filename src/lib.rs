//! Batch inference for fine-tuned sequence classifiers.
//!
//! A run reads a CSV of examples, tokenizes them, classifies them in
//! fixed-size batches and writes `id,pred_label,probs` rows back out.

pub mod classifier;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod tokenizer;

pub use classifier::{Device, LoadOptions, ModernBertClassifier, SequenceClassifier};
pub use dataset::{CsvDatasetLoader, DatasetLoader, Example, LoadModes, LoadedDataset, SentenceLayout};
pub use error::{Error, Result};
pub use labels::LabelMap;
pub use output::PredictionRecord;
pub use pipeline::InferenceConfig;
pub use runner::{BatchRunner, Predictions};
pub use tokenizer::{TokenizedBatch, TokenizedDataset, TokenizerAdapter};
