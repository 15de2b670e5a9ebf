use crate::classifier::{LoadOptions, ModernBertClassifier, SequenceClassifier};
use crate::dataset::{CsvDatasetLoader, DatasetLoader, LoadModes, LoadedDataset};
use crate::error::{Error, Result};
use crate::labels::LabelMap;
use crate::output::{write_predictions, PredictionRecord};
use crate::runner::BatchRunner;
use crate::tokenizer::{TokenizedDataset, TokenizerAdapter};
use candle_core::Device;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub test_dataset: PathBuf,
    pub output: PathBuf,
    pub model_dir: PathBuf,
    pub model_name: String,
    pub modes: LoadModes,
    pub label_map: PathBuf,
    pub text_columns: Vec<String>,
    pub special_tokens: Vec<String>,
    pub batch_size: usize,
    pub max_length: usize,
    pub seed: u64,
    pub cpu: bool,
}

impl InferenceConfig {
    pub fn device(&self) -> Result<Device> {
        if self.cpu {
            Ok(Device::Cpu)
        } else {
            Ok(Device::cuda_if_available(0)?)
        }
    }
}

/// Loads the dataset and registers any special tokens it asks for.
pub fn load_dataset<L: DatasetLoader>(
    loader: &L,
    path: &Path,
    modes: &LoadModes,
    tokenizer: &mut TokenizerAdapter,
) -> Result<LoadedDataset> {
    let dataset = loader.load(path, modes)?;
    info!(path = %path.display(), rows = dataset.len(), layout = %dataset.layout, "loaded test dataset");
    dataset.log_head(3);
    if let Some(tokens) = &dataset.special_tokens {
        let added = tokenizer.add_special_tokens(tokens)?;
        info!(added, vocab_size = tokenizer.vocab_size(), "registered special tokens");
    }
    Ok(dataset)
}

/// Fails when the tokenized rows or ids do not line up with the dataset or
/// the model's embedding table.
pub fn check_consistency<M: SequenceClassifier>(
    model: &M,
    tokenizer: &TokenizerAdapter,
    dataset: &LoadedDataset,
    tokenized: &TokenizedDataset,
) -> Result<()> {
    if tokenized.len() != dataset.len() {
        return Err(Error::Inconsistent(format!(
            "{} tokenized rows for {} examples",
            tokenized.len(),
            dataset.len()
        )));
    }
    if tokenizer.vocab_size() > model.vocab_size() {
        return Err(Error::Inconsistent(format!(
            "tokenizer has {} entries but the model embeds only {}",
            tokenizer.vocab_size(),
            model.vocab_size()
        )));
    }
    if let Some(max) = tokenized.max_token_id()? {
        if max as usize >= model.vocab_size() {
            return Err(Error::Inconsistent(format!(
                "token id {max} is outside the model vocabulary of {}",
                model.vocab_size()
            )));
        }
    }
    Ok(())
}

/// Tokenizes, classifies and relabels every example, in input order.
pub fn predict<M: SequenceClassifier>(
    model: &M,
    tokenizer: &TokenizerAdapter,
    dataset: &LoadedDataset,
    labels: &LabelMap,
    runner: &BatchRunner,
    device: &Device,
) -> Result<Vec<PredictionRecord>> {
    let tokenized = tokenizer.tokenize(dataset)?;
    check_consistency(model, tokenizer, dataset, &tokenized)?;

    let predictions = runner.run(model, &tokenized, device)?;
    if predictions.len() != dataset.len() {
        return Err(Error::Inconsistent(format!(
            "{} predictions for {} examples",
            predictions.len(),
            dataset.len()
        )));
    }
    let pred_labels = labels.relabel(&predictions.classes)?;
    PredictionRecord::zip(dataset.ids(), pred_labels, predictions.probabilities)
}

/// Runs the whole job and returns the number of rows written.
pub fn run(config: &InferenceConfig) -> Result<usize> {
    let device = config.device()?;
    info!(?device, "selected device");

    let mut tokenizer =
        TokenizerAdapter::from_pretrained(&config.model_name)?.with_max_length(config.max_length)?;
    let loader = CsvDatasetLoader::new(config.text_columns.iter().cloned())
        .with_special_tokens(config.special_tokens.iter().cloned());
    let dataset = load_dataset(&loader, &config.test_dataset, &config.modes, &mut tokenizer)?;

    let options = LoadOptions {
        vocab_size: Some(tokenizer.vocab_size()),
        seed: config.seed,
    };
    let model = ModernBertClassifier::load(&config.model_dir, &device, &options)?;
    info!(model_dir = %config.model_dir.display(), vocab_size = model.vocab_size(), "loaded model");

    let labels = LabelMap::load(&config.label_map)?;
    let runner = BatchRunner::new(config.batch_size)?;
    let records = predict(&model, &tokenizer, &dataset, &labels, &runner, &device)?;

    write_predictions(&config.output, &records)?;
    info!(output = %config.output.display(), rows = records.len(), "wrote predictions");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Example, SentenceLayout};
    use candle_core::Tensor;

    struct Fixed {
        logits: Vec<f32>,
        vocab_size: usize,
    }

    impl SequenceClassifier for Fixed {
        fn forward(&self, input_ids: &Tensor, _: &Tensor, _: &Tensor) -> Result<Tensor> {
            let rows = input_ids.dims()[0];
            let row = Tensor::new(self.logits.as_slice(), input_ids.device())?;
            Ok(row.unsqueeze(0)?.broadcast_as((rows, self.logits.len()))?.contiguous()?)
        }

        fn vocab_size(&self) -> usize {
            self.vocab_size
        }
    }

    fn tokenizer() -> TokenizerAdapter {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tokenizer.json");
        TokenizerAdapter::from_file(path).unwrap()
    }

    fn dataset(texts: &[&str]) -> LoadedDataset {
        LoadedDataset {
            examples: texts
                .iter()
                .enumerate()
                .map(|(i, text)| Example {
                    id: format!("row-{i}"),
                    texts: vec![text.to_string()],
                    label: 100,
                })
                .collect(),
            special_tokens: None,
            layout: SentenceLayout::Single,
        }
    }

    #[test]
    fn every_row_gets_the_model_prediction() {
        let labels = LabelMap::from_json(r#"["first", "second"]"#).unwrap();
        let model = Fixed {
            logits: vec![0.0, 3f32.ln()],
            vocab_size: 12,
        };
        let records = predict(
            &model,
            &tokenizer(),
            &dataset(&["the band", "rain fell"]),
            &labels,
            &BatchRunner::default(),
            &Device::Cpu,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "row-1");
        for record in &records {
            assert_eq!(record.pred_label, "second");
            approx::assert_abs_diff_eq!(record.probs[0], 0.25, epsilon = 1e-5);
            approx::assert_abs_diff_eq!(record.probs[1], 0.75, epsilon = 1e-5);
        }
    }

    #[test]
    fn small_model_vocabulary_is_fatal() {
        let labels = LabelMap::from_json(r#"["first", "second"]"#).unwrap();
        let model = Fixed {
            logits: vec![0.0, 1.0],
            vocab_size: 8,
        };
        let err = predict(
            &model,
            &tokenizer(),
            &dataset(&["rain fell"]),
            &labels,
            &BatchRunner::default(),
            &Device::Cpu,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Inconsistent(_)));
    }

    #[test]
    fn unmapped_class_is_fatal() {
        let labels = LabelMap::from_json(r#"{"1": "second"}"#).unwrap();
        let model = Fixed {
            logits: vec![2.0, 1.0],
            vocab_size: 12,
        };
        let err = predict(
            &model,
            &tokenizer(),
            &dataset(&["rain"]),
            &labels,
            &BatchRunner::default(),
            &Device::Cpu,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownClass(0)));
    }

    #[test]
    fn cpu_flag_forces_cpu() {
        let config = InferenceConfig {
            test_dataset: PathBuf::new(),
            output: PathBuf::new(),
            model_dir: PathBuf::new(),
            model_name: String::new(),
            modes: LoadModes {
                preprocessing: "none".into(),
                sentence: "1".into(),
            },
            label_map: PathBuf::new(),
            text_columns: vec!["sentence".into()],
            special_tokens: Vec::new(),
            batch_size: 16,
            max_length: 256,
            seed: 42,
            cpu: true,
        };
        assert!(config.device().unwrap().is_cpu());
    }
}
