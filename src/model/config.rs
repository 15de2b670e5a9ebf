use crate::error::Result;
use candle_transformers::models::modernbert::Config as ModernBertConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn default_initializer_range() -> f64 {
    0.02
}

/// `config.json` of a fine-tuned ModernBERT sequence classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    #[serde(flatten)]
    pub modernbert_config: ModernBertConfig,
    /// Standard deviation used when new embedding rows are initialized.
    #[serde(default = "default_initializer_range")]
    pub initializer_range: f64,
}

impl CheckpointConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn vocab_size(&self) -> usize {
        self.modernbert_config.vocab_size
    }

    pub fn id2label(&self) -> HashMap<String, String> {
        self.modernbert_config
            .classifier_config
            .as_ref()
            .map(|cc| cc.id2label.clone())
            .unwrap_or_default()
    }
}
