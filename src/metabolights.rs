use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::MetaboLightsSettings;
use crate::domain::{AccessionCode, ArtifactKind, DatasetRecord};
use crate::error::MetaboError;
use crate::formats::{TsvTable, study_labels};
use crate::ftp::{FtpConnector, FtpSession};
use crate::http::HttpClient;
use crate::repository::{FetchContext, FetchReport, Fetcher, Parser};
use crate::store::{CacheStore, is_plain_file_name};

pub const RESULT_FILES_DIR: &str = "FILES";
pub const METABOLITE_COLUMN: &str = "metabolite_identification";

static METADATA_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[siam].+\.(txt|tsv)$").unwrap());
static METABOLITE_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^m_.+\.tsv$").unwrap());

/// MetaboLights: directory listing over FTP, file bodies over the HTTP mirror.
pub struct MetaboLights {
    settings: MetaboLightsSettings,
    http: Arc<dyn HttpClient>,
    ftp: Arc<dyn FtpConnector>,
}

impl MetaboLights {
    pub fn new(
        settings: MetaboLightsSettings,
        http: Arc<dyn HttpClient>,
        ftp: Arc<dyn FtpConnector>,
    ) -> Self {
        Self { settings, http, ftp }
    }

    fn study_dir(&self, accession: &AccessionCode) -> String {
        format!(
            "{}/{}",
            self.settings.ftp_base_dir.trim_end_matches('/'),
            accession.as_str()
        )
    }

    fn file_url(&self, accession: &AccessionCode, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.remote_url.trim_end_matches('/'),
            accession.as_str(),
            filename
        )
    }

    fn download_metadata(
        &self,
        accession: &AccessionCode,
        filename: &str,
        ctx: &FetchContext<'_>,
    ) -> Result<(), MetaboError> {
        ctx.deadline.check(accession)?;
        let url = self.file_url(accession, filename);
        let reply = self.http.get(&url)?;
        if !reply.is_success() {
            error!(%url, status = reply.status, "could not download file");
            return Err(MetaboError::HttpStatus {
                url,
                status: reply.status,
            });
        }
        ctx.store.write(accession, filename, reply.body.as_bytes())?;
        Ok(())
    }

    fn fetch_listing(
        &self,
        accession: &AccessionCode,
        ctx: &FetchContext<'_>,
        session: &mut dyn FtpSession,
    ) -> Result<FetchReport, MetaboError> {
        let study_dir = self.study_dir(accession);
        session.cwd(&study_dir)?;
        let entries = session.nlst()?;
        let mut report = FetchReport::default();

        for name in entries {
            if !is_plain_file_name(&name) {
                warn!(accession = %accession, %name, "skipping listing entry with a path component");
                continue;
            }
            if is_metadata_file(&name) {
                self.download_metadata(accession, &name, ctx)?;
                report.record(&name);
            }
            if name == RESULT_FILES_DIR {
                debug!(accession = %accession, "listing result files");
                ctx.deadline.check(accession)?;
                session.cwd(RESULT_FILES_DIR)?;
                let result_files = session.nlst()?;
                let mut content = String::new();
                for file in &result_files {
                    content.push_str(file);
                    content.push('\n');
                }
                let manifest = &self.settings.result_files_manifest;
                ctx.store.write(accession, manifest, content.as_bytes())?;
                report.record(manifest);
            }
        }
        Ok(report)
    }

    fn metabolite_file_name(
        &self,
        accession: &AccessionCode,
        store: &CacheStore,
    ) -> Result<Option<String>, MetaboError> {
        Ok(store
            .list_files(accession)?
            .into_iter()
            .rev()
            .find(|name| METABOLITE_FILE.is_match(name)))
    }
}

/// Study files worth caching: `s_`, `i_`, `a_` and `m_` sheets in text or
/// tab-separated form.
pub fn is_metadata_file(name: &str) -> bool {
    METADATA_FILE.is_match(name)
}

impl Fetcher for MetaboLights {
    fn fetch(
        &self,
        accession: &AccessionCode,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchReport, MetaboError> {
        ctx.deadline.check(accession)?;
        debug!(
            accession = %accession,
            host = %self.settings.ftp_host,
            dir = %self.settings.ftp_base_dir,
            "fetching study"
        );
        let mut session = self.ftp.connect(&self.settings)?;
        let report = self.fetch_listing(accession, ctx, &mut *session);
        match report {
            Ok(report) => {
                session.quit()?;
                info!(accession = %accession, files = report.files.len(), "fetched study");
                Ok(report)
            }
            Err(err) => {
                error!(accession = %accession, error = %err, "fetch aborted");
                let _ = session.quit();
                Err(err)
            }
        }
    }
}

impl Parser for MetaboLights {
    fn parse(
        &self,
        accession: &AccessionCode,
        store: &CacheStore,
    ) -> Result<DatasetRecord, MetaboError> {
        let mut record = DatasetRecord::new(accession);

        let investigation = store.read_to_string(accession, &self.settings.investigation_file)?;
        let labels = study_labels(&investigation);
        record.title = labels.title;
        record.description = labels.description;

        let result_files =
            store.read_to_string(accession, &self.settings.result_files_manifest)?;
        record.rawdata_filenames = result_files
            .lines()
            .map(|line| line.trim().to_string())
            .collect();

        if let Some(name) = self.metabolite_file_name(accession, store)? {
            debug!(accession = %accession, file = %name, "reading metabolite table");
            let content = store.read_to_string(accession, &name)?;
            record.metabolites = TsvTable::parse(&name, &content)?.present_values(METABOLITE_COLUMN)?;
        }
        Ok(record)
    }

    fn artifact_name(
        &self,
        accession: &AccessionCode,
        kind: ArtifactKind,
        store: &CacheStore,
    ) -> Result<Option<String>, MetaboError> {
        match kind {
            ArtifactKind::Metadata => Ok(Some(self.settings.investigation_file.clone())),
            ArtifactKind::Metabolites => self.metabolite_file_name(accession, store),
            ArtifactKind::Rawdata => Ok(Some(self.settings.result_files_manifest.clone())),
        }
    }
}
