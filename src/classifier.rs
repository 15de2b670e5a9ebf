pub use candle_core::Device;
use crate::error::{Error, Result};
use crate::model::config::CheckpointConfig;
use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::modernbert::ModernBertForSequenceClassification;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TOKEN_EMBEDDINGS: &str = "model.embeddings.tok_embeddings.weight";

/// A model mapping a batch of token ids to per-class logits of shape
/// `(batch, num_labels)`.
pub trait SequenceClassifier {
    fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        token_type_ids: &Tensor,
    ) -> Result<Tensor>;

    /// Rows of the input embedding table.
    fn vocab_size(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Grow the embedding table to this many rows when the tokenizer has
    /// more entries than the checkpoint.
    pub vocab_size: Option<usize>,
    /// Seeds the initialization of any new embedding rows.
    pub seed: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            vocab_size: None,
            seed: 42,
        }
    }
}

#[derive(Clone)]
pub struct ModernBertClassifier {
    model: ModernBertForSequenceClassification,
    id_to_label: HashMap<String, String>,
    vocab_size: usize,
}

impl ModernBertClassifier {
    pub fn load<P: AsRef<Path>>(path: P, device: &Device, options: &LoadOptions) -> Result<Self> {
        let mut dir = PathBuf::from(path.as_ref());

        dir.push("config.json");
        let mut config = CheckpointConfig::load(&dir)?;
        dir.pop();

        dir.push("model.safetensors");
        let target = options.vocab_size.filter(|&rows| rows > config.vocab_size());
        let model_builder = match target {
            None => unsafe { VarBuilder::from_mmaped_safetensors(&[&dir], DType::F32, device) }?,
            Some(rows) => {
                let mut tensors = candle_core::safetensors::load(&dir, &Device::Cpu)?;
                resize_token_embeddings(&mut tensors, rows, config.initializer_range, options.seed)?;
                info!(
                    from = config.vocab_size(),
                    to = rows,
                    seed = options.seed,
                    "resized token embeddings"
                );
                config.modernbert_config.vocab_size = rows;
                VarBuilder::from_tensors(tensors, DType::F32, device)
            }
        };
        dir.pop();

        let model = ModernBertForSequenceClassification::load(model_builder, &config.modernbert_config)?;
        let id_to_label = config.id2label();
        debug!(labels = id_to_label.len(), "checkpoint id2label");
        Ok(Self {
            model,
            id_to_label,
            vocab_size: config.vocab_size(),
        })
    }

    /// The label table stored in the checkpoint's own config.
    pub fn id_to_label(&self) -> &HashMap<String, String> {
        &self.id_to_label
    }
}

impl SequenceClassifier for ModernBertClassifier {
    fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        _token_type_ids: &Tensor,
    ) -> Result<Tensor> {
        Ok(self.model.forward(input_ids, attention_mask)?)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

/// Appends rows drawn from `N(0, std)` to the token embedding table until it
/// has `rows` entries. Existing rows are kept as-is; the table never shrinks.
pub(crate) fn resize_token_embeddings(
    tensors: &mut HashMap<String, Tensor>,
    rows: usize,
    std: f64,
    seed: u64,
) -> Result<()> {
    let weight = tensors
        .get(TOKEN_EMBEDDINGS)
        .ok_or_else(|| Error::Inconsistent(format!("checkpoint has no `{TOKEN_EMBEDDINGS}`")))?
        .to_dtype(DType::F32)?;
    let (current, hidden) = weight.dims2()?;
    if rows <= current {
        return Ok(());
    }

    let normal = Normal::new(0f32, std as f32).map_err(|e| Error::InvalidArgument(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let extra = rows - current;
    let values: Vec<f32> = (0..extra * hidden).map(|_| normal.sample(&mut rng)).collect();
    let extra = Tensor::from_vec(values, (extra, hidden), weight.device())?;
    let resized = Tensor::cat(&[&weight, &extra], 0)?;
    tensors.insert(TOKEN_EMBEDDINGS.to_string(), resized);
    Ok(())
}
