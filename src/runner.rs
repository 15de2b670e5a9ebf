use crate::classifier::SequenceClassifier;
use crate::error::{Error, Result};
use crate::tokenizer::TokenizedDataset;
use candle_core::{DType, Device, D};
use candle_nn::ops::softmax;
use kdam::tqdm;
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Per-example outputs of a run, aligned with the input rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predictions {
    pub classes: Vec<u32>,
    pub probabilities: Vec<Vec<f32>>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Runs a classifier over a tokenized dataset in consecutive, unshuffled
/// batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    batch_size: usize,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchRunner {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidArgument("batch size must be positive".into()));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn run<M: SequenceClassifier>(
        &self,
        model: &M,
        dataset: &TokenizedDataset,
        device: &Device,
    ) -> Result<Predictions> {
        let rows = dataset.len();
        let mut predictions = Predictions {
            classes: Vec::with_capacity(rows),
            probabilities: Vec::with_capacity(rows),
        };

        let starts: Vec<usize> = (0..rows).step_by(self.batch_size).collect();
        for start in tqdm!(starts.into_iter(), desc = "inference") {
            let len = self.batch_size.min(rows - start);
            let batch = dataset.batch(start, len, device)?;
            let logits = model
                .forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids)?
                .detach()
                .to_dtype(DType::F32)?;

            let (batch_rows, _) = logits.dims2()?;
            if batch_rows != len {
                return Err(Error::Inconsistent(format!(
                    "model returned {batch_rows} rows for a batch of {len}"
                )));
            }

            let probabilities = softmax(&logits, D::Minus1)?.to_vec2::<f32>()?;
            let classes = logits.argmax(D::Minus1)?.to_vec1::<u32>()?;
            predictions.classes.extend(classes);
            predictions.probabilities.extend(probabilities);
        }
        debug!(rows, batch_size = self.batch_size, "finished batches");
        Ok(predictions)
    }
}
