use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{DatasetRecord, RepositoryKind};
use crate::store::Manifest;

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryInfo {
    pub name: &'static str,
    pub accession_template: &'static str,
    pub accession_prefix: &'static str,
    pub repository_website: &'static str,
}

impl From<RepositoryKind> for RepositoryInfo {
    fn from(kind: RepositoryKind) -> Self {
        Self {
            name: kind.name(),
            accession_template: kind.accession_template(),
            accession_prefix: kind.prefix(),
            repository_website: kind.website(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_record(record: &DatasetRecord) -> io::Result<()> {
        Self::print_json(record)
    }

    pub fn print_cached(manifests: &[Manifest]) -> io::Result<()> {
        Self::print_json(&manifests)
    }

    pub fn print_repositories() -> io::Result<()> {
        let repositories = RepositoryKind::ALL
            .into_iter()
            .map(RepositoryInfo::from)
            .collect::<Vec<_>>();
        Self::print_json(&repositories)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn render_record(record: &DatasetRecord) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} ({})\n", record.accession, record.repository));
        if let Some(title) = &record.title {
            out.push_str(&format!("Title: {title}\n"));
        }
        if let Some(analysis) = &record.analysis_id {
            out.push_str(&format!("Analysis: {analysis}\n"));
        }
        if let Some(description) = &record.description {
            out.push_str(&format!("Description: {description}\n"));
        }
        out.push_str(&format!("Metabolites ({}):\n", record.metabolites.len()));
        for name in &record.metabolites {
            out.push_str(&format!("  - {name}\n"));
        }
        out.push_str(&format!("Raw data files ({}):\n", record.rawdata_filenames.len()));
        for name in &record.rawdata_filenames {
            out.push_str(&format!("  - {name}\n"));
        }
        out
    }

    pub fn print_record(record: &DatasetRecord) -> io::Result<()> {
        io::stdout().write_all(Self::render_record(record).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccessionCode;

    #[test]
    fn text_lists_metabolites_and_files() {
        let acc: AccessionCode = "MTBLS93".parse().unwrap();
        let mut record = DatasetRecord::new(&acc);
        record.title = Some("Plasma study".to_string());
        record.metabolites = vec!["glucose".to_string()];
        record.rawdata_filenames = vec!["a.raw".to_string(), "b.raw".to_string()];
        let text = TextOutput::render_record(&record);
        assert!(text.starts_with("MTBLS93 (MetaboLights)\nTitle: Plasma study\n"));
        assert!(text.contains("Metabolites (1):\n  - glucose\n"));
        assert!(text.contains("Raw data files (2):"));
    }
}
