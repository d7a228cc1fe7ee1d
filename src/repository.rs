use std::time::{Duration, Instant};

use crate::domain::{AccessionCode, ArtifactKind, DatasetRecord};
use crate::error::MetaboError;
use crate::store::CacheStore;

/// Point in time after which an acquisition stops issuing remote calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self, accession: &AccessionCode) -> Result<(), MetaboError> {
        if self.is_expired() {
            return Err(MetaboError::DeadlineExceeded(accession.to_string()));
        }
        Ok(())
    }
}

pub struct FetchContext<'a> {
    pub store: &'a CacheStore,
    pub deadline: Deadline,
}

/// Names of the artifacts a fetch wrote, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub files: Vec<String>,
}

impl FetchReport {
    pub fn record(&mut self, filename: &str) {
        if !self.files.iter().any(|name| name == filename) {
            self.files.push(filename.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Retrieves a repository's file set into the cache. Files written before a
/// failure stay on disk.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        accession: &AccessionCode,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchReport, MetaboError>;
}

/// Builds a [`DatasetRecord`] from cached files only.
pub trait Parser: Send + Sync {
    fn parse(
        &self,
        accession: &AccessionCode,
        store: &CacheStore,
    ) -> Result<DatasetRecord, MetaboError>;

    /// Cached file name serving a download of `kind`, if the repository keeps one.
    fn artifact_name(
        &self,
        accession: &AccessionCode,
        kind: ArtifactKind,
        store: &CacheStore,
    ) -> Result<Option<String>, MetaboError>;
}

pub trait Repository: Fetcher + Parser {}

impl<T: Fetcher + Parser> Repository for T {}
