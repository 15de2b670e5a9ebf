//! Class index to label lookup.
//!
//! The table lives in a JSON file next to the binary so it can be reviewed
//! and versioned with the rest of the repository. Two layouts are accepted:
//! an ordered list where the position is the class index, or an object
//! keyed by the stringified index (the `id2label` shape of a Hugging Face
//! `config.json`).

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelTable {
    Ordered(Vec<String>),
    Keyed(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: BTreeMap<u32, String>,
}

impl LabelMap {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let table: LabelTable = serde_json::from_reader(reader)?;
        let map = Self::from_table(table)?;
        debug!(path = %path.as_ref().display(), classes = map.len(), "loaded label map");
        Ok(map)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_table(serde_json::from_str(json)?)
    }

    fn from_table(table: LabelTable) -> Result<Self> {
        let labels = match table {
            LabelTable::Ordered(labels) => (0u32..).zip(labels).collect(),
            LabelTable::Keyed(entries) => entries
                .into_iter()
                .map(|(key, label)| {
                    key.trim()
                        .parse::<u32>()
                        .map(|index| (index, label))
                        .map_err(|_| {
                            Error::InvalidArgument(format!("label map key `{key}` is not a class index"))
                        })
                })
                .collect::<Result<_>>()?,
        };
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: u32) -> Result<&str> {
        self.labels
            .get(&index)
            .map(String::as_str)
            .ok_or(Error::UnknownClass(index))
    }

    /// Maps every class index to its label, failing on the first index the
    /// table does not know.
    pub fn relabel(&self, classes: &[u32]) -> Result<Vec<String>> {
        classes
            .iter()
            .map(|&index| self.label(index).map(str::to_owned))
            .collect()
    }
}
