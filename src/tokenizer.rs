use crate::dataset::{LoadedDataset, SentenceLayout};
use crate::error::{Error, Result};
use candle_core::{Device, Tensor};
use hf_hub::api::sync::Api;
use std::path::Path;
use tokenizers::{AddedToken, EncodeInput, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

const PAD_CANDIDATES: [&str; 2] = ["[PAD]", "<pad>"];

/// A pretrained tokenizer that pads every example of a dataset to the same
/// length and can be extended with extra special tokens.
#[derive(Clone)]
pub struct TokenizerAdapter {
    tokenizer: Tokenizer,
}

impl TokenizerAdapter {
    pub fn new(mut tokenizer: Tokenizer) -> Self {
        let padding = match tokenizer.get_padding() {
            Some(padding) => PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                ..padding.clone()
            },
            None => {
                let (pad_token, pad_id) = PAD_CANDIDATES
                    .iter()
                    .find_map(|token| tokenizer.token_to_id(token).map(|id| (token.to_string(), id)))
                    .unwrap_or_else(|| (PAD_CANDIDATES[0].to_string(), 0));
                PaddingParams {
                    strategy: PaddingStrategy::BatchLongest,
                    pad_id,
                    pad_token,
                    ..Default::default()
                }
            }
        };
        tokenizer.with_padding(Some(padding));
        Self { tokenizer }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Tokenizer::from_file(path)?))
    }

    /// Loads `name` as a `tokenizer.json` path, a directory holding one, or a
    /// model id on the Hugging Face hub.
    pub fn from_pretrained(name: &str) -> Result<Self> {
        let local = Path::new(name);
        if local.is_file() {
            return Self::from_file(local);
        }
        let in_dir = local.join("tokenizer.json");
        if in_dir.is_file() {
            return Self::from_file(in_dir);
        }
        info!(repo = name, "fetching tokenizer from the hub");
        let path = Api::new()?.model(name.to_string()).get("tokenizer.json")?;
        Self::from_file(path)
    }

    pub fn with_max_length(mut self, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::InvalidArgument("max_length must be positive".into()));
        }
        self.tokenizer.with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))?;
        Ok(self)
    }

    /// Registers additional special tokens and returns how many were new.
    /// Every token must resolve to an id afterwards.
    pub fn add_special_tokens(&mut self, tokens: &[String]) -> Result<usize> {
        let added: Vec<AddedToken> = tokens
            .iter()
            .map(|token| AddedToken::from(token.clone(), true))
            .collect();
        let count = self.tokenizer.add_special_tokens(&added);
        for token in tokens {
            if self.tokenizer.token_to_id(token).is_none() {
                return Err(Error::Inconsistent(format!(
                    "special token `{token}` has no id after registration"
                )));
            }
        }
        debug!(requested = tokens.len(), added = count, "registered special tokens");
        Ok(count)
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    pub fn inner(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn tokenize(&self, dataset: &LoadedDataset) -> Result<TokenizedDataset> {
        let inputs = dataset
            .examples
            .iter()
            .map(|example| match (dataset.layout, example.texts.as_slice()) {
                (SentenceLayout::Single, [text]) => Ok(EncodeInput::from(text.clone())),
                (SentenceLayout::Pair, [first, second]) => {
                    Ok(EncodeInput::from((first.clone(), second.clone())))
                }
                (layout, texts) => Err(Error::Inconsistent(format!(
                    "example {} has {} text segments for {layout} layout",
                    example.id,
                    texts.len()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let encodings = self.tokenizer.encode_batch(inputs, true)?;
        if encodings.len() != dataset.len() {
            return Err(Error::Inconsistent(format!(
                "{} encodings for {} examples",
                encodings.len(),
                dataset.len()
            )));
        }

        let rows = encodings.len();
        let seq_len = encodings.first().map(|e| e.len()).unwrap_or(0);
        let mut input_ids = Vec::with_capacity(rows * seq_len);
        let mut attention_mask = Vec::with_capacity(rows * seq_len);
        let mut token_type_ids = Vec::with_capacity(rows * seq_len);
        for encoding in &encodings {
            if encoding.len() != seq_len {
                return Err(Error::Inconsistent(format!(
                    "encoding of length {} in a dataset padded to {seq_len}",
                    encoding.len()
                )));
            }
            input_ids.extend_from_slice(encoding.get_ids());
            attention_mask.extend_from_slice(encoding.get_attention_mask());
            token_type_ids.extend_from_slice(encoding.get_type_ids());
        }

        let device = Device::Cpu;
        TokenizedDataset::new(
            Tensor::from_vec(input_ids, (rows, seq_len), &device)?,
            Tensor::from_vec(attention_mask, (rows, seq_len), &device)?,
            Tensor::from_vec(token_type_ids, (rows, seq_len), &device)?,
        )
    }
}

/// Model inputs for a whole dataset, one row per example.
#[derive(Debug, Clone)]
pub struct TokenizedDataset {
    input_ids: Tensor,
    attention_mask: Tensor,
    token_type_ids: Tensor,
}

/// A contiguous slice of a [`TokenizedDataset`] on the compute device.
#[derive(Debug, Clone)]
pub struct TokenizedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

impl TokenizedDataset {
    pub fn new(input_ids: Tensor, attention_mask: Tensor, token_type_ids: Tensor) -> Result<Self> {
        let dims = input_ids.dims2()?;
        if attention_mask.dims2()? != dims || token_type_ids.dims2()? != dims {
            return Err(Error::Inconsistent(format!(
                "input tensors disagree: ids {:?}, mask {:?}, types {:?}",
                input_ids.shape(),
                attention_mask.shape(),
                token_type_ids.shape()
            )));
        }
        Ok(Self {
            input_ids,
            attention_mask,
            token_type_ids,
        })
    }

    pub fn len(&self) -> usize {
        self.input_ids.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.dims()[1]
    }

    pub fn max_token_id(&self) -> Result<Option<u32>> {
        if self.input_ids.elem_count() == 0 {
            return Ok(None);
        }
        let max = self.input_ids.flatten_all()?.max(0)?.to_scalar::<u32>()?;
        Ok(Some(max))
    }

    pub fn batch(&self, start: usize, len: usize, device: &Device) -> Result<TokenizedBatch> {
        let slice = |t: &Tensor| -> Result<Tensor> { Ok(t.narrow(0, start, len)?.to_device(device)?) };
        Ok(TokenizedBatch {
            input_ids: slice(&self.input_ids)?,
            attention_mask: slice(&self.attention_mask)?,
            token_type_ids: slice(&self.token_type_ids)?,
        })
    }
}
