use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub id: String,
    pub texts: Vec<String>,
    /// Gold label, or a placeholder on unlabeled splits.
    pub label: i64,
}

/// How the text fields of an example are fed to the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceLayout {
    /// One segment, every text field joined.
    Single,
    /// Two segments: the first text field, then the rest joined.
    Pair,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadModes {
    pub preprocessing: String,
    pub sentence: String,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub examples: Vec<Example>,
    pub special_tokens: Option<Vec<String>>,
    pub layout: SentenceLayout,
}

impl LoadedDataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.examples.iter().map(|e| e.id.clone()).collect()
    }

    pub fn labels(&self) -> Vec<i64> {
        self.examples.iter().map(|e| e.label).collect()
    }

    /// Logs the leading rows of the table.
    pub fn log_head(&self, n: usize) {
        for example in self.examples.iter().take(n) {
            info!(id = %example.id, label = example.label, texts = ?example.texts, "example");
        }
    }
}

/// Source of examples for inference. Mode selectors are opaque to the
/// caller and interpreted by the implementation.
pub trait DatasetLoader {
    fn load(&self, path: &Path, modes: &LoadModes) -> Result<LoadedDataset>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preprocessing {
    None,
    NormalizeWhitespace,
}

impl Preprocessing {
    fn parse(mode: &str) -> Result<Self> {
        match mode {
            "none" => Ok(Self::None),
            "normalize_whitespace" => Ok(Self::NormalizeWhitespace),
            other => Err(Error::UnknownMode {
                kind: "preprocessing",
                value: other.to_string(),
            }),
        }
    }

    fn apply(self, text: &str) -> String {
        match self {
            Self::None => text.to_string(),
            Self::NormalizeWhitespace => text.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

impl SentenceLayout {
    fn parse(mode: &str) -> Result<Self> {
        match mode {
            "1" => Ok(Self::Single),
            "2" => Ok(Self::Pair),
            other => Err(Error::UnknownMode {
                kind: "sentence",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SentenceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Pair => write!(f, "pair"),
        }
    }
}

/// Reads a CSV with `id`, `label` and the configured text columns.
#[derive(Debug, Clone)]
pub struct CsvDatasetLoader {
    text_columns: Vec<String>,
    special_tokens: Vec<String>,
}

impl CsvDatasetLoader {
    pub fn new<I, S>(text_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text_columns: text_columns.into_iter().map(Into::into).collect(),
            special_tokens: Vec::new(),
        }
    }

    pub fn with_special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    fn combine(&self, fields: Vec<String>, layout: SentenceLayout) -> Vec<String> {
        match layout {
            SentenceLayout::Single => vec![fields.join(" ")],
            SentenceLayout::Pair => {
                let mut fields = fields.into_iter();
                let first = fields.next().unwrap_or_default();
                let rest = fields.collect::<Vec<_>>().join(" ");
                vec![first, rest]
            }
        }
    }
}

impl Default for CsvDatasetLoader {
    fn default() -> Self {
        Self::new(["sentence"])
    }
}

impl DatasetLoader for CsvDatasetLoader {
    fn load(&self, path: &Path, modes: &LoadModes) -> Result<LoadedDataset> {
        let preprocessing = Preprocessing::parse(&modes.preprocessing)?;
        let layout = SentenceLayout::parse(&modes.sentence)?;
        if self.text_columns.is_empty() {
            return Err(Error::InvalidArgument("no text columns configured".into()));
        }
        if layout == SentenceLayout::Pair && self.text_columns.len() < 2 {
            return Err(Error::InvalidArgument(
                "pair sentence mode needs at least two text columns".into(),
            ));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::MissingColumn(name.to_string()))
        };
        let id_column = column("id")?;
        let label_column = column("label")?;
        let text_columns = self
            .text_columns
            .iter()
            .map(|name| column(name.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let mut examples = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |index: usize| record.get(index).unwrap_or_default();
            let id = field(id_column).to_string();
            let raw_label = field(label_column).trim();
            let label = raw_label.parse::<i64>().map_err(|_| Error::InvalidLabel {
                id: id.clone(),
                value: raw_label.to_string(),
            })?;
            let fields = text_columns
                .iter()
                .map(|&index| preprocessing.apply(field(index)))
                .collect();
            examples.push(Example {
                id,
                texts: self.combine(fields, layout),
                label,
            });
        }
        debug!(path = %path.display(), rows = examples.len(), %layout, "read dataset");

        let special_tokens = if self.special_tokens.is_empty() {
            None
        } else {
            Some(self.special_tokens.clone())
        };
        Ok(LoadedDataset {
            examples,
            special_tokens,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn modes(preprocessing: &str, sentence: &str) -> LoadModes {
        LoadModes {
            preprocessing: preprocessing.into(),
            sentence: sentence.into(),
        }
    }

    const TABLE: &str = "id,sentence,subject,object,label,source\n\
                         0,\"the  band   played\",band,played,100,wiki\n\
                         1,a quiet morning,morning,quiet,3,news\n";

    #[test]
    fn single_mode_reads_rows_in_order() {
        let file = csv_file(TABLE);
        let dataset = CsvDatasetLoader::default()
            .load(file.path(), &modes("none", "1"))
            .unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.ids(), vec!["0", "1"]);
        assert_eq!(dataset.labels(), vec![100, 3]);
        assert_eq!(dataset.examples[0].texts, vec!["the  band   played"]);
        assert_eq!(dataset.layout, SentenceLayout::Single);
        assert!(dataset.special_tokens.is_none());
    }

    #[test]
    fn pair_mode_splits_first_column_from_the_rest() {
        let file = csv_file(TABLE);
        let dataset = CsvDatasetLoader::new(["subject", "object", "sentence"])
            .load(file.path(), &modes("normalize_whitespace", "2"))
            .unwrap();
        assert_eq!(dataset.layout, SentenceLayout::Pair);
        assert_eq!(
            dataset.examples[0].texts,
            vec!["band".to_string(), "played the band played".to_string()]
        );
    }

    #[test]
    fn whitespace_is_normalized_on_request() {
        let file = csv_file(TABLE);
        let dataset = CsvDatasetLoader::default()
            .load(file.path(), &modes("normalize_whitespace", "1"))
            .unwrap();
        assert_eq!(dataset.examples[0].texts, vec!["the band played"]);
    }

    #[test]
    fn special_tokens_are_reported() {
        let file = csv_file(TABLE);
        let dataset = CsvDatasetLoader::default()
            .with_special_tokens(["[E1]", "[/E1]"])
            .load(file.path(), &modes("none", "1"))
            .unwrap();
        assert_eq!(
            dataset.special_tokens,
            Some(vec!["[E1]".to_string(), "[/E1]".to_string()])
        );
    }

    #[test]
    fn missing_text_column_fails() {
        let file = csv_file(TABLE);
        let err = CsvDatasetLoader::new(["body"])
            .load(file.path(), &modes("none", "1"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(name) if name == "body"));
    }

    #[test]
    fn missing_label_column_fails() {
        let file = csv_file("id,sentence\n0,hello\n");
        let err = CsvDatasetLoader::default()
            .load(file.path(), &modes("none", "1"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(name) if name == "label"));
    }

    #[test]
    fn non_integer_label_fails() {
        let file = csv_file("id,sentence,label\n7,hello,maybe\n");
        let err = CsvDatasetLoader::default()
            .load(file.path(), &modes("none", "1"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLabel { id, .. } if id == "7"));
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let file = csv_file(TABLE);
        let loader = CsvDatasetLoader::default();
        assert!(matches!(
            loader.load(file.path(), &modes("punct", "1")),
            Err(Error::UnknownMode { kind: "preprocessing", .. })
        ));
        assert!(matches!(
            loader.load(file.path(), &modes("none", "3")),
            Err(Error::UnknownMode { kind: "sentence", .. })
        ));
    }

    #[test]
    fn pair_mode_needs_two_columns() {
        let file = csv_file(TABLE);
        let err = CsvDatasetLoader::default()
            .load(file.path(), &modes("none", "2"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
