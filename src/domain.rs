use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::MetaboError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryKind {
    MetaboLights,
    MetabolomicsWorkbench,
    MetaboBank,
}

impl RepositoryKind {
    pub const ALL: [RepositoryKind; 3] = [
        RepositoryKind::MetaboLights,
        RepositoryKind::MetabolomicsWorkbench,
        RepositoryKind::MetaboBank,
    ];

    /// Accession prefix, also used as the cache directory token.
    pub fn prefix(&self) -> &'static str {
        match self {
            RepositoryKind::MetaboLights => "MTBLS",
            RepositoryKind::MetabolomicsWorkbench => "ST",
            RepositoryKind::MetaboBank => "MTBK",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RepositoryKind::MetaboLights => "MetaboLights",
            RepositoryKind::MetabolomicsWorkbench => "Metabolomics-Workbench",
            RepositoryKind::MetaboBank => "MetaboBank",
        }
    }

    pub fn accession_template(&self) -> &'static str {
        match self {
            RepositoryKind::MetaboLights => "MTBLSxxx",
            RepositoryKind::MetabolomicsWorkbench => "STxxx",
            RepositoryKind::MetaboBank => "MTBKxxx",
        }
    }

    pub fn website(&self) -> &'static str {
        match self {
            RepositoryKind::MetaboLights => "https://www.ebi.ac.uk/metabolights",
            RepositoryKind::MetabolomicsWorkbench => "https://www.metabolomicsworkbench.org",
            RepositoryKind::MetaboBank => "https://mb2.ddbj.nig.ac.jp",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Maps an accession to its repository. Rules are checked in order and the
/// first match wins, so `ST...` is decided before `MTBK...` is considered.
pub fn classify(code: &str) -> Result<RepositoryKind, MetaboError> {
    let code = code.trim();
    let is_segment = !code.is_empty()
        && !code.contains(['/', '\\'])
        && !code.contains("..")
        && !code.chars().any(char::is_whitespace);
    if !is_segment {
        return Err(MetaboError::InvalidAccession(code.to_string()));
    }
    if code.starts_with("MTBLS") {
        Ok(RepositoryKind::MetaboLights)
    } else if code.starts_with("ST") {
        Ok(RepositoryKind::MetabolomicsWorkbench)
    } else if code.starts_with("MTBK") {
        Ok(RepositoryKind::MetaboBank)
    } else {
        Err(MetaboError::InvalidAccession(code.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessionCode {
    code: String,
    kind: RepositoryKind,
}

impl AccessionCode {
    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }
}

impl fmt::Display for AccessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl FromStr for AccessionCode {
    type Err = MetaboError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let kind = classify(value)?;
        Ok(Self {
            code: value.trim().to_string(),
            kind,
        })
    }
}

/// Normalized summary of one dataset, keyed the way the JSON boundary and the
/// result page expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub accession: String,
    pub repository: RepositoryKind,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(rename = "Metabolites", default)]
    pub metabolites: Vec<String>,
    #[serde(rename = "Rawdata", default)]
    pub rawdata_filenames: Vec<String>,
}

impl DatasetRecord {
    pub fn new(accession: &AccessionCode) -> Self {
        Self {
            accession: accession.as_str().to_string(),
            repository: accession.kind(),
            title: None,
            description: None,
            analysis_id: None,
            metabolites: Vec::new(),
            rawdata_filenames: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Metadata,
    Metabolites,
    Rawdata,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Metadata => write!(f, "metadata"),
            ArtifactKind::Metabolites => write!(f, "metabolites"),
            ArtifactKind::Rawdata => write!(f, "rawdata"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn classify_known_prefixes() {
        assert_eq!(classify("MTBLS93").unwrap(), RepositoryKind::MetaboLights);
        assert_eq!(
            classify("ST000025").unwrap(),
            RepositoryKind::MetabolomicsWorkbench
        );
        assert_eq!(classify("MTBKS93").unwrap(), RepositoryKind::MetaboBank);
    }

    #[test]
    fn classify_rejects_unknown_and_paths() {
        assert_matches!(classify("GSE1234"), Err(MetaboError::InvalidAccession(_)));
        assert_matches!(classify(""), Err(MetaboError::InvalidAccession(_)));
        assert_matches!(classify("mtbls93"), Err(MetaboError::InvalidAccession(_)));
        assert_matches!(
            classify("MTBLS93/../etc"),
            Err(MetaboError::InvalidAccession(_))
        );
    }

    #[test]
    fn record_serializes_with_boundary_keys() {
        let acc: AccessionCode = "ST000025".parse().unwrap();
        let mut record = DatasetRecord::new(&acc);
        record.title = Some("Study".to_string());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Title"], "Study");
        assert_eq!(value["repository"], "metabolomics-workbench");
        assert!(value.get("Description").is_none());
        assert_eq!(value["Metabolites"], serde_json::json!([]));
    }
}
