use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tokenizer error: {0}")]
    TokenizerError(#[from] tokenizers::Error),
    #[error("candle error: {0}")]
    CandleError(#[from] candle_core::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("csv error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("hub error: {0}")]
    HubError(#[from] hf_hub::api::sync::ApiError),
    #[error("missing column `{0}`")]
    MissingColumn(String),
    #[error("example {id}: label `{value}` is not an integer")]
    InvalidLabel { id: String, value: String },
    #[error("unknown {kind} mode `{value}`")]
    UnknownMode { kind: &'static str, value: String },
    #[error("class index {0} has no label")]
    UnknownClass(u32),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
