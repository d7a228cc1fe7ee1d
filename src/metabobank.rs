use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MetaboBankSettings;
use crate::domain::{AccessionCode, ArtifactKind, DatasetRecord};
use crate::error::MetaboError;
use crate::formats::{TsvTable, html_to_text, study_labels};
use crate::http::HttpClient;
use crate::metabolights::METABOLITE_COLUMN;
use crate::repository::{FetchContext, FetchReport, Fetcher, Parser};
use crate::store::{CacheStore, is_plain_file_name};

const MAF_MARKER: &str = ".maf.";

/// MetaboBank: fixed-name MAGE-TAB files plus every `*.maf.*.txt` assay file
/// named in the study's directory listing. All files are optional.
pub struct MetaboBank {
    settings: MetaboBankSettings,
    http: Arc<dyn HttpClient>,
}

impl MetaboBank {
    pub fn new(settings: MetaboBankSettings, http: Arc<dyn HttpClient>) -> Self {
        Self { settings, http }
    }

    fn study_url(&self, accession: &AccessionCode) -> String {
        format!(
            "{}/{}/",
            self.settings.study_url.trim_end_matches('/'),
            accession.as_str()
        )
    }

    pub fn idf_file_name(&self, accession: &AccessionCode) -> String {
        format!("{accession}{}", self.settings.idf_suffix)
    }

    pub fn sdrf_file_name(&self, accession: &AccessionCode) -> String {
        format!("{accession}{}", self.settings.sdrf_suffix)
    }

    pub fn filelist_file_name(&self, accession: &AccessionCode) -> String {
        format!("{accession}{}", self.settings.filelist_suffix)
    }

    /// Fetches one file from the study directory and caches it when the reply
    /// has content. Returns whether anything was written.
    fn fetch_optional(
        &self,
        accession: &AccessionCode,
        filename: &str,
        ctx: &FetchContext<'_>,
        report: &mut FetchReport,
    ) -> Result<bool, MetaboError> {
        ctx.deadline.check(accession)?;
        let url = format!("{}{}", self.study_url(accession), filename);
        match self.http.get(&url)?.into_content() {
            Some(body) => {
                ctx.store.write(accession, filename, body.as_bytes())?;
                report.record(filename);
                Ok(true)
            }
            None => {
                warn!(%url, "file not available, skipping");
                Ok(false)
            }
        }
    }

    fn maf_file_name(
        &self,
        accession: &AccessionCode,
        store: &CacheStore,
    ) -> Result<Option<String>, MetaboError> {
        Ok(store
            .list_files(accession)?
            .into_iter()
            .find(|name| name.contains("maf")))
    }
}

/// Assay file names found in the text of a directory listing. Tokens glued to
/// trailing listing text are cut back to their last `.txt`; names that are
/// not a single path segment are dropped.
pub fn maf_file_names(listing_text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in listing_text.split_whitespace() {
        if !token.contains(MAF_MARKER) {
            continue;
        }
        let stem = token.rsplit_once(".txt").map_or(token, |(head, _)| head);
        let name = format!("{stem}.txt");
        if !is_plain_file_name(&name) {
            warn!(%name, "skipping listed file with a path component");
            continue;
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

impl Fetcher for MetaboBank {
    fn fetch(
        &self,
        accession: &AccessionCode,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchReport, MetaboError> {
        let mut report = FetchReport::default();
        for filename in [
            self.idf_file_name(accession),
            self.sdrf_file_name(accession),
            self.filelist_file_name(accession),
        ] {
            self.fetch_optional(accession, &filename, ctx, &mut report)?;
        }

        ctx.deadline.check(accession)?;
        let listing_url = self.study_url(accession);
        match self.http.get(&listing_url)?.into_content() {
            Some(html) => {
                let names = maf_file_names(&html_to_text(&html));
                debug!(accession = %accession, count = names.len(), "assay files listed");
                for name in names {
                    self.fetch_optional(accession, &name, ctx, &mut report)?;
                }
            }
            None => warn!(url = %listing_url, "directory listing not available"),
        }

        info!(accession = %accession, files = report.files.len(), "fetched study");
        Ok(report)
    }
}

impl Parser for MetaboBank {
    fn parse(
        &self,
        accession: &AccessionCode,
        store: &CacheStore,
    ) -> Result<DatasetRecord, MetaboError> {
        let mut record = DatasetRecord::new(accession);

        let idf = store.read_to_string(accession, &self.idf_file_name(accession))?;
        let labels = study_labels(&idf);
        record.title = labels.title;
        record.description = labels.description;

        if let Some(name) = self.maf_file_name(accession, store)? {
            debug!(accession = %accession, file = %name, "reading metabolite table");
            let content = store.read_to_string(accession, &name)?;
            record.metabolites = TsvTable::parse(&name, &content)?.present_values(METABOLITE_COLUMN)?;
        }

        let filelist_name = self.filelist_file_name(accession);
        let filelist = store.read_to_string(accession, &filelist_name)?;
        record.rawdata_filenames =
            TsvTable::parse(&filelist_name, &filelist)?.present_values_where("Name", "Type", "raw")?;
        Ok(record)
    }

    fn artifact_name(
        &self,
        accession: &AccessionCode,
        kind: ArtifactKind,
        store: &CacheStore,
    ) -> Result<Option<String>, MetaboError> {
        match kind {
            ArtifactKind::Metadata => Ok(Some(self.idf_file_name(accession))),
            ArtifactKind::Metabolites => self.maf_file_name(accession, store),
            ArtifactKind::Rawdata => Ok(Some(self.filelist_file_name(accession))),
        }
    }
}
