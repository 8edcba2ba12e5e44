use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Document, Metadata, Scalar, SourceTag};

const QUESTION_COLUMNS: &[&str] = &["question", "query"];
const ANSWER_COLUMNS: &[&str] = &["answer", "response"];
const CATEGORY_COLUMNS: &[&str] = &["category", "topic"];
const FUND_NAME_COLUMNS: &[&str] = &["fund_name", "fund name", "name", "scheme_name", "scheme name"];

/// Reads the FAQ and fund CSV files into indexable documents.
pub struct DocumentLoader {
    data_dir: PathBuf,
    faqs_file: String,
    funds_file: String,
}

impl DocumentLoader {
    pub fn new(data_dir: impl Into<PathBuf>, faqs_file: impl Into<String>, funds_file: impl Into<String>) -> Self {
        Self { data_dir: data_dir.into(), faqs_file: faqs_file.into(), funds_file: funds_file.into() }
    }

    pub fn faqs_path(&self) -> PathBuf {
        self.data_dir.join(&self.faqs_file)
    }

    pub fn funds_path(&self) -> PathBuf {
        self.data_dir.join(&self.funds_file)
    }

    /// Paths whose content determines the corpus fingerprint.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        vec![self.faqs_path(), self.funds_path()]
    }

    pub fn load_faqs(&self) -> Result<Vec<Document>> {
        let path = self.faqs_path();
        let Some(table) = read_table(&path)? else {
            tracing::warn!(path = %path.display(), "FAQ file not found");
            return Ok(vec![]);
        };

        let mut docs = Vec::new();
        for (row_idx, row) in table.rows.iter().enumerate() {
            let question = table.lookup(row, QUESTION_COLUMNS);
            let answer = table.lookup(row, ANSWER_COLUMNS);
            let (Some(question), Some(answer)) = (question, answer) else {
                tracing::debug!(row = row_idx, "skipping FAQ row without question or answer");
                continue;
            };
            let mut doc = Document::new(
                format!("faq_{row_idx}"),
                format!("Question: {question}\nAnswer: {answer}"),
                SourceTag::Faq,
            )
            .with_meta("question", question)
            .with_meta("answer", answer);
            if let Some(category) = table.lookup(row, CATEGORY_COLUMNS) {
                doc = doc.with_meta("category", category);
            }
            docs.push(doc);
        }
        tracing::info!(count = docs.len(), path = %path.display(), "loaded FAQs");
        Ok(docs)
    }

    pub fn load_funds(&self) -> Result<Vec<Document>> {
        let path = self.funds_path();
        let Some(table) = read_table(&path)? else {
            tracing::warn!(path = %path.display(), "funds file not found");
            return Ok(vec![]);
        };

        let name_col = FUND_NAME_COLUMNS.iter().find_map(|c| table.index.get(*c).copied());
        let mut docs = Vec::with_capacity(table.rows.len());
        for (row_idx, row) in table.rows.iter().enumerate() {
            let fund_name = table
                .lookup(row, FUND_NAME_COLUMNS)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Fund {row_idx}"));

            let mut lines = vec![format!("Fund Name: {fund_name}")];
            let mut metadata = Metadata::new();
            metadata.insert("fund_name".into(), Scalar::Text(fund_name));
            for (col, header) in table.headers.iter().enumerate() {
                if Some(col) == name_col {
                    continue;
                }
                let Some(raw) = row.get(col).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
                    continue;
                };
                lines.push(format!("{}: {raw}", label_for(header)));
                metadata.insert(metadata_key(header), parse_cell(raw));
            }

            docs.push(Document {
                id: format!("fund_{row_idx}"),
                text: lines.join("\n"),
                source_tag: SourceTag::Fund,
                metadata,
            });
        }
        tracing::info!(count = docs.len(), path = %path.display(), "loaded funds");
        Ok(docs)
    }

    /// FAQs first, then funds.
    pub fn load_all(&self) -> Result<Vec<Document>> {
        let mut docs = self.load_faqs()?;
        let faq_count = docs.len();
        docs.extend(self.load_funds()?);
        tracing::info!(total = docs.len(), faqs = faq_count, funds = docs.len() - faq_count, "documents loaded");
        Ok(docs)
    }
}

struct Table {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<csv::StringRecord>,
}

impl Table {
    fn lookup<'a>(&self, row: &'a csv::StringRecord, aliases: &[&str]) -> Option<&'a str> {
        aliases
            .iter()
            .filter_map(|alias| self.index.get(*alias))
            .filter_map(|&col| row.get(col))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

fn read_table(path: &Path) -> Result<Option<Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let csv_err = |e: csv::Error| Error::Validation(format!("{}: {e}", path.display()));
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path).map_err(csv_err)?;
    let headers: Vec<String> = reader.headers().map_err(csv_err)?.iter().map(|h| h.trim().to_string()).collect();
    let index = headers.iter().enumerate().map(|(i, h)| (h.to_ascii_lowercase(), i)).collect();
    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>().map_err(csv_err)?;
    Ok(Some(Table { headers, index, rows }))
}

/// `cagr_3yr (%)` -> `Cagr 3yr (%)`
fn label_for(header: &str) -> String {
    header
        .split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Expense Ratio (%)` -> `expense_ratio`
fn metadata_key(header: &str) -> String {
    header
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Percent signs and thousands separators are stripped before numeric inference.
fn parse_cell(raw: &str) -> Scalar {
    let stripped: String = raw.chars().filter(|c| *c != '%' && *c != ',').collect();
    match Scalar::infer(&stripped) {
        n @ (Scalar::Int(_) | Scalar::Float(_)) => n,
        _ => Scalar::infer(raw),
    }
}
