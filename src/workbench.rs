use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WorkbenchSettings;
use crate::domain::{AccessionCode, ArtifactKind, DatasetRecord};
use crate::error::MetaboError;
use crate::http::HttpClient;
use crate::repository::{FetchContext, FetchReport, Fetcher, Parser};
use crate::store::CacheStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRef {
    pub study_id: String,
    pub analysis_id: String,
}

/// Metabolomics Workbench: REST lookup of the analysis, then the mwTab study
/// export as JSON and as text.
pub struct MetabolomicsWorkbench {
    settings: WorkbenchSettings,
    http: Arc<dyn HttpClient>,
}

impl MetabolomicsWorkbench {
    pub fn new(settings: WorkbenchSettings, http: Arc<dyn HttpClient>) -> Self {
        Self { settings, http }
    }

    fn analysis_url(&self, accession: &AccessionCode) -> String {
        format!(
            "{}/study/study_id/{}/analysis",
            self.settings.rest_base_url.trim_end_matches('/'),
            accession.as_str()
        )
    }

    fn json_url(&self, analysis: &AnalysisRef) -> String {
        format!(
            "{}?JSON=YES&STUDY_ID={}&ANALYSIS_ID={}&MODE=d",
            self.settings.data_url, analysis.study_id, analysis.analysis_id
        )
    }

    fn mwtab_url(&self, analysis: &AnalysisRef) -> String {
        format!(
            "{}?STUDY_ID={}&ANALYSIS_ID={}&MODE=d",
            self.settings.data_url, analysis.study_id, analysis.analysis_id
        )
    }

    pub fn json_file_name(&self, id: &str) -> String {
        format!("{id}{}", self.settings.json_suffix)
    }

    pub fn mwtab_file_name(&self, id: &str) -> String {
        format!("{id}{}", self.settings.mwtab_suffix)
    }

    fn lookup_analysis(
        &self,
        accession: &AccessionCode,
        ctx: &FetchContext<'_>,
    ) -> Result<Option<AnalysisRef>, MetaboError> {
        ctx.deadline.check(accession)?;
        let url = self.analysis_url(accession);
        let Some(body) = self.http.get(&url)?.into_content() else {
            return Ok(None);
        };
        let Ok(value) = serde_json::from_str::<Value>(&body) else {
            warn!(%url, "analysis lookup returned non-JSON content");
            return Ok(None);
        };
        Ok(analysis_ref(&value))
    }
}

/// Reads `study_id`/`analysis_id` from an analysis lookup reply. Studies with
/// several analyses answer with an object keyed by analysis number; the first
/// complete entry is used.
pub fn analysis_ref(value: &Value) -> Option<AnalysisRef> {
    let from_object = |object: &Value| {
        Some(AnalysisRef {
            study_id: json_text(object.get("study_id")?)?,
            analysis_id: json_text(object.get("analysis_id")?)?,
        })
    };
    if let Some(found) = from_object(value) {
        return Some(found);
    }
    value
        .as_object()?
        .values()
        .filter(|entry| entry.is_object())
        .find_map(from_object)
}

/// Text of a truthy scalar: non-empty strings and non-zero numbers. Narrower
/// than general truthiness: booleans, arrays and objects never yield text.
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        _ => None,
    }
}

impl Fetcher for MetabolomicsWorkbench {
    fn fetch(
        &self,
        accession: &AccessionCode,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchReport, MetaboError> {
        let mut report = FetchReport::default();
        let Some(analysis) = self.lookup_analysis(accession, ctx)? else {
            warn!(accession = %accession, "no analysis found");
            return Ok(report);
        };
        debug!(
            accession = %accession,
            study_id = %analysis.study_id,
            analysis_id = %analysis.analysis_id,
            "resolved analysis"
        );

        ctx.deadline.check(accession)?;
        let url = self.json_url(&analysis);
        if let Some(body) = self.http.get(&url)?.into_content() {
            match serde_json::from_str::<Value>(&body) {
                Ok(value) if !is_empty_json(&value) => {
                    let name = self.json_file_name(&analysis.study_id);
                    let content = serde_json::to_vec(&value)
                        .map_err(|err| MetaboError::Filesystem(err.to_string()))?;
                    ctx.store.write(accession, &name, &content)?;
                    report.record(&name);
                }
                Ok(_) => warn!(%url, "empty study document"),
                Err(err) => warn!(%url, error = %err, "study document is not JSON"),
            }
        }

        ctx.deadline.check(accession)?;
        let url = self.mwtab_url(&analysis);
        if let Some(body) = self.http.get(&url)?.into_content() {
            let name = self.mwtab_file_name(&analysis.study_id);
            ctx.store.write(accession, &name, body.as_bytes())?;
            report.record(&name);
        }

        info!(accession = %accession, files = report.files.len(), "fetched study");
        Ok(report)
    }
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn section<'a>(value: &'a Value, key: &str, file: &str) -> Result<&'a Value, MetaboError> {
    value.get(key).ok_or_else(|| MetaboError::MissingJsonKey {
        file: file.to_string(),
        key: key.to_string(),
    })
}

impl Parser for MetabolomicsWorkbench {
    fn parse(
        &self,
        accession: &AccessionCode,
        store: &CacheStore,
    ) -> Result<DatasetRecord, MetaboError> {
        let file = self.json_file_name(accession.as_str());
        let content = store.read_to_string(accession, &file)?;
        let document: Value = serde_json::from_str(&content).map_err(|err| MetaboError::Json {
            file: file.clone(),
            message: err.to_string(),
        })?;

        let mut record = DatasetRecord::new(accession);
        let header = section(&document, "METABOLOMICS WORKBENCH", &file)?;
        record.analysis_id = header.get("ANALYSIS_ID").and_then(json_text);
        let study = section(&document, "STUDY", &file)?;
        record.title = study.get("STUDY_TITLE").and_then(json_text);
        record.description = study.get("STUDY_SUMMARY").and_then(json_text);

        let data = section(section(&document, "MS_METABOLITE_DATA", &file)?, "Data", &file)?;
        record.metabolites = data
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get("Metabolite").and_then(json_text))
                    .collect()
            })
            .unwrap_or_default();
        Ok(record)
    }

    fn artifact_name(
        &self,
        accession: &AccessionCode,
        _kind: ArtifactKind,
        _store: &CacheStore,
    ) -> Result<Option<String>, MetaboError> {
        Ok(Some(self.mwtab_file_name(accession.as_str())))
    }
}
