use clap::Parser;
use relation_classifier_inference::pipeline::{self, InferenceConfig};
use relation_classifier_inference::runner::DEFAULT_BATCH_SIZE;
use relation_classifier_inference::{LoadModes, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inference")]
#[command(about = "Classify a CSV of examples with a fine-tuned checkpoint")]
struct Args {
    #[arg(long = "test_dataset_dir", default_value = "../dataset/test/test_data.csv")]
    test_dataset_dir: PathBuf,

    #[arg(long = "output_dir", default_value = "./prediction/submission.csv")]
    output_dir: PathBuf,

    /// Directory holding config.json and model.safetensors
    #[arg(long = "model_dir", default_value = "./best_model")]
    model_dir: PathBuf,

    /// Tokenizer file, directory or hub id
    #[arg(long = "model_name", default_value = "answerdotai/ModernBERT-base")]
    model_name: String,

    #[arg(long = "preprocessing_mode", default_value = "none")]
    preprocessing_mode: String,

    #[arg(long = "sentence_mode", default_value = "1")]
    sentence_mode: String,

    #[arg(long = "label_map", default_value = "./utils/dict_num_to_label.json")]
    label_map: PathBuf,

    #[arg(long = "text_columns", value_delimiter = ',', default_value = "sentence")]
    text_columns: Vec<String>,

    #[arg(long = "special_tokens", value_delimiter = ',')]
    special_tokens: Vec<String>,

    #[arg(long = "batch_size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[arg(long = "max_length", default_value_t = 256)]
    max_length: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Force CPU even when CUDA is available
    #[arg(long)]
    cpu: bool,
}

impl From<Args> for InferenceConfig {
    fn from(args: Args) -> Self {
        Self {
            test_dataset: args.test_dataset_dir,
            output: args.output_dir,
            model_dir: args.model_dir,
            model_name: args.model_name,
            modes: LoadModes {
                preprocessing: args.preprocessing_mode,
                sentence: args.sentence_mode,
            },
            label_map: args.label_map,
            text_columns: args.text_columns,
            special_tokens: args.special_tokens,
            batch_size: args.batch_size,
            max_length: args.max_length,
            seed: args.seed,
            cpu: args.cpu,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = InferenceConfig::from(Args::parse());
    pipeline::run(&config)?;
    println!("---- Finish! ----");
    Ok(())
}
