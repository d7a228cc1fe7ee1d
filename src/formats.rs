//! Readers for the cached file formats: tab-separated tables, labelled
//! investigation lines and HTML directory listings.

use scraper::Html;

use crate::error::MetaboError;

/// Cell values treated as missing, matching the default NA tokens of common
/// dataframe readers.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value.trim())
}

/// An in-memory tab-separated table with a header row.
#[derive(Debug, Clone)]
pub struct TsvTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn parse(name: &str, content: &str) -> Result<Self, MetaboError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .has_headers(true)
            .from_reader(content.as_bytes());

        let table_error = |err: csv::Error| MetaboError::Table {
            file: name.to_string(),
            message: err.to_string(),
        };

        let headers = reader
            .headers()
            .map_err(table_error)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(table_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> Result<usize, MetaboError> {
        self.headers
            .iter()
            .position(|header| header == column)
            .ok_or_else(|| MetaboError::MissingColumn {
                file: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Values of `column` in row order, `None` for missing cells and short rows.
    pub fn column(&self, column: &str) -> Result<Vec<Option<String>>, MetaboError> {
        let index = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .map(|row| cell(row, index))
            .collect())
    }

    /// Non-missing values of `column`, in row order.
    pub fn present_values(&self, column: &str) -> Result<Vec<String>, MetaboError> {
        Ok(self.column(column)?.into_iter().flatten().collect())
    }

    /// Non-missing values of `column` for rows where `filter_column` equals
    /// `expected` exactly.
    pub fn present_values_where(
        &self,
        column: &str,
        filter_column: &str,
        expected: &str,
    ) -> Result<Vec<String>, MetaboError> {
        let filter_index = self.column_index(filter_column)?;
        let index = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .filter(|row| row.get(filter_index).map(String::as_str) == Some(expected))
            .filter_map(|row| cell(row, index))
            .collect())
    }
}

fn cell(row: &[String], index: usize) -> Option<String> {
    row.get(index)
        .filter(|value| !is_missing(value))
        .cloned()
}

/// Title and description found in an investigation-style text file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyLabels {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub const STUDY_TITLE: &str = "Study Title";
pub const STUDY_DESCRIPTION: &str = "Study Description";

/// Scans lines for the study labels. A matching line yields its text with the
/// label removed and surrounding whitespace trimmed; later lines win.
pub fn study_labels(content: &str) -> StudyLabels {
    let mut labels = StudyLabels::default();
    for line in content.lines() {
        if line.contains(STUDY_TITLE) {
            labels.title = Some(line.replace(STUDY_TITLE, "").trim().to_string());
        }
        if line.contains(STUDY_DESCRIPTION) {
            labels.description = Some(line.replace(STUDY_DESCRIPTION, "").trim().to_string());
        }
    }
    labels
}

/// Concatenated text nodes of an HTML document, in document order.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document.root_element().text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_strip_label_and_whitespace() {
        let labels = study_labels(
            "Study Identifier\tMTBLS93\nStudy Title\tMy Study Name\nStudy Description\t  Plasma profiling \n",
        );
        assert_eq!(labels.title.as_deref(), Some("My Study Name"));
        assert_eq!(labels.description.as_deref(), Some("Plasma profiling"));
    }

    #[test]
    fn column_drops_missing_values() {
        let table = TsvTable::parse(
            "m_test.tsv",
            "database_identifier\tmetabolite_identification\nCHEBI:1\tglucose\nCHEBI:2\t\nCHEBI:3\tlactate\nCHEBI:4\tNaN\n",
        )
        .unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(
            table.present_values("metabolite_identification").unwrap(),
            vec!["glucose", "lactate"]
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        let table = TsvTable::parse("t.tsv", "a\tb\n1\t2\n").unwrap();
        assert!(matches!(
            table.column("metabolite_identification"),
            Err(MetaboError::MissingColumn { .. })
        ));
    }

    #[test]
    fn html_text_keeps_file_names() {
        let text = html_to_text(
            "<html><body><pre><a href=\"x.maf.pos.txt\">MTBKS93.maf.pos.txt</a>  2023-01-01</pre></body></html>",
        );
        assert!(text.contains("MTBKS93.maf.pos.txt"));
        assert!(!text.contains("href"));
    }
}
