use std::collections::HashMap;
use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::domain::{AccessionCode, ArtifactKind, DatasetRecord, RepositoryKind};
use crate::error::MetaboError;
use crate::ftp::{FtpConnector, SuppaFtpConnector};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::metabobank::MetaboBank;
use crate::metabolights::MetaboLights;
use crate::repository::{Deadline, FetchContext, FetchReport, Repository};
use crate::store::{CacheStore, Manifest};
use crate::workbench::MetabolomicsWorkbench;

const SLOT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Whether a record came from an existing cache entry or a fresh fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Fetched,
}

/// Dataset acquisition: classify, check the cache, fetch on a miss, parse.
pub struct Pipeline {
    store: CacheStore,
    metabolights: MetaboLights,
    workbench: MetabolomicsWorkbench,
    metabobank: MetaboBank,
    in_flight: Mutex<HashMap<AccessionCode, Arc<Mutex<()>>>>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        http: Arc<dyn HttpClient>,
        ftp: Arc<dyn FtpConnector>,
    ) -> Self {
        Self {
            store: CacheStore::new(settings.datasets_root),
            metabolights: MetaboLights::new(settings.metabolights, http.clone(), ftp),
            workbench: MetabolomicsWorkbench::new(settings.workbench, http.clone()),
            metabobank: MetaboBank::new(settings.metabobank, http),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: Settings) -> Result<Self, MetaboError> {
        let http = Arc::new(ReqwestHttpClient::new(&settings.network)?);
        let ftp = Arc::new(SuppaFtpConnector::new(settings.network.clone()));
        Ok(Self::new(settings, http, ftp))
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    fn repository(&self, kind: RepositoryKind) -> &dyn Repository {
        match kind {
            RepositoryKind::MetaboLights => &self.metabolights,
            RepositoryKind::MetabolomicsWorkbench => &self.workbench,
            RepositoryKind::MetaboBank => &self.metabobank,
        }
    }

    /// Boundary entry point: any failure is logged and reported as not found.
    pub fn get_dataset(&self, accession: &str) -> Result<DatasetRecord, MetaboError> {
        self.collapse(accession, self.acquire(accession, Deadline::none()))
    }

    pub fn get_dataset_within(
        &self,
        accession: &str,
        timeout: Duration,
    ) -> Result<DatasetRecord, MetaboError> {
        self.collapse(accession, self.acquire(accession, Deadline::after(timeout)))
    }

    fn collapse(
        &self,
        accession: &str,
        result: Result<DatasetRecord, MetaboError>,
    ) -> Result<DatasetRecord, MetaboError> {
        result.map_err(|err| {
            error!(accession, error = %err, "dataset unavailable");
            MetaboError::DatasetNotFound(accession.trim().to_string())
        })
    }

    /// Same as [`Pipeline::get_dataset`] but keeps the underlying error.
    pub fn acquire(
        &self,
        accession: &str,
        deadline: Deadline,
    ) -> Result<DatasetRecord, MetaboError> {
        self.acquire_with_outcome(accession, deadline)
            .map(|(record, _)| record)
    }

    pub fn acquire_with_outcome(
        &self,
        accession: &str,
        deadline: Deadline,
    ) -> Result<(DatasetRecord, CacheOutcome), MetaboError> {
        let accession: AccessionCode = accession.parse()?;
        let repository = self.repository(accession.kind());

        let outcome = self.with_slot(&accession, deadline, || {
            if self.store.exists(&accession) {
                debug!(accession = %accession, "cache hit");
                Ok(CacheOutcome::Hit)
            } else {
                debug!(accession = %accession, repository = %accession.kind(), "cache miss");
                self.fetch_into_cache(&accession, repository, deadline)
                    .map(|_| CacheOutcome::Fetched)
            }
        })?;

        deadline.check(&accession)?;
        let record = repository.parse(&accession, &self.store)?;
        info!(
            accession = %accession,
            metabolites = record.metabolites.len(),
            rawdata = record.rawdata_filenames.len(),
            "parsed dataset"
        );
        Ok((record, outcome))
    }

    /// Fetches into the cache whether or not an entry already exists.
    pub fn fetch_only(
        &self,
        accession: &str,
        deadline: Deadline,
    ) -> Result<FetchReport, MetaboError> {
        let accession: AccessionCode = accession.parse()?;
        let repository = self.repository(accession.kind());
        self.with_slot(&accession, deadline, || {
            self.fetch_into_cache(&accession, repository, deadline)
        })
    }

    fn fetch_into_cache(
        &self,
        accession: &AccessionCode,
        repository: &dyn Repository,
        deadline: Deadline,
    ) -> Result<FetchReport, MetaboError> {
        let ctx = FetchContext {
            store: &self.store,
            deadline,
        };
        let report = repository.fetch(accession, &ctx).inspect_err(|err| {
            error!(accession = %accession, error = %err, "fetch failed");
        })?;
        if report.is_empty() {
            debug!(accession = %accession, "fetch produced no artifacts");
        } else {
            self.store.write_manifest(accession, report.files.clone())?;
        }
        Ok(report)
    }

    /// Opens the cached file backing a download of `kind`.
    pub fn open_artifact(
        &self,
        accession: &str,
        kind: ArtifactKind,
    ) -> Result<(String, File), MetaboError> {
        let accession: AccessionCode = accession.parse()?;
        let name = self
            .repository(accession.kind())
            .artifact_name(&accession, kind, &self.store)?
            .ok_or_else(|| MetaboError::ArtifactNotFound(format!("{accession} {kind}")))?;
        let file = self.store.open_artifact(&accession, &name)?;
        Ok((name, file))
    }

    pub fn list_cached(&self) -> Result<Vec<Manifest>, MetaboError> {
        self.store.list_cached()
    }

    /// Runs `work` while holding the accession's in-flight lock. Waiting for
    /// another caller's fetch counts against `deadline`.
    fn with_slot<T>(
        &self,
        accession: &AccessionCode,
        deadline: Deadline,
        work: impl FnOnce() -> Result<T, MetaboError>,
    ) -> Result<T, MetaboError> {
        let slot = self.slot(accession);
        let result = match wait_for_slot(&slot, accession, deadline) {
            Ok(guard) => {
                let result = work();
                drop(guard);
                result
            }
            Err(err) => Err(err),
        };
        self.release(accession, slot);
        result
    }

    fn slot(&self, accession: &AccessionCode) -> Arc<Mutex<()>> {
        lock(&self.in_flight)
            .entry(accession.clone())
            .or_default()
            .clone()
    }

    /// Drops the per-accession lock once no other caller holds it.
    fn release(&self, accession: &AccessionCode, slot: Arc<Mutex<()>>) {
        let mut in_flight = lock(&self.in_flight);
        drop(slot);
        if in_flight
            .get(accession)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            in_flight.remove(accession);
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

fn wait_for_slot<'a>(
    slot: &'a Mutex<()>,
    accession: &AccessionCode,
    deadline: Deadline,
) -> Result<MutexGuard<'a, ()>, MetaboError> {
    if deadline.is_unbounded() {
        return Ok(lock(slot));
    }
    loop {
        match slot.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if deadline.is_expired() {
                    warn!(accession = %accession, "gave up waiting for in-flight fetch");
                    return Err(MetaboError::DeadlineExceeded(accession.to_string()));
                }
                thread::sleep(SLOT_POLL_INTERVAL);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
