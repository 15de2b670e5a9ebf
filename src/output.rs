use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io;
use std::path::Path;

/// One output row: `id,pred_label,probs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: String,
    pub pred_label: String,
    #[serde(serialize_with = "serialize_probs")]
    pub probs: Vec<f32>,
}

impl PredictionRecord {
    /// Joins the three per-example sequences, which must be the same length.
    pub fn zip(ids: Vec<String>, labels: Vec<String>, probabilities: Vec<Vec<f32>>) -> Result<Vec<Self>> {
        if ids.len() != labels.len() || ids.len() != probabilities.len() {
            return Err(Error::Inconsistent(format!(
                "{} ids, {} labels, {} probability rows",
                ids.len(),
                labels.len(),
                probabilities.len()
            )));
        }
        Ok(ids
            .into_iter()
            .zip(labels)
            .zip(probabilities)
            .map(|((id, pred_label), probs)| Self {
                id,
                pred_label,
                probs,
            })
            .collect())
    }
}

/// Renders a probability vector as `[0.1, 0.7, 0.2]`.
pub fn format_probs(probs: &[f32]) -> String {
    let items: Vec<String> = probs.iter().map(|p| format!("{p:?}")).collect();
    format!("[{}]", items.join(", "))
}

fn serialize_probs<S: Serializer>(probs: &[f32], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_probs(probs))
}

pub fn write_records<W: io::Write>(writer: W, records: &[PredictionRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(["id", "pred_label", "probs"])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the records as CSV. The parent directory must already exist.
pub fn write_predictions<P: AsRef<Path>>(path: P, records: &[PredictionRecord]) -> Result<()> {
    write_records(File::create(path)?, records)
}
