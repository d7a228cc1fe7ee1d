use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::debug;

use crate::domain::{AccessionCode, RepositoryKind};
use crate::error::MetaboError;

pub const MANIFEST_FILE: &str = ".manifest.json";

/// Filesystem cache laid out as `{root}/{prefix}/{accession}/{filename}`.
///
/// A dataset counts as cached only once its completion manifest exists; a
/// directory left behind by an interrupted fetch is treated as a miss and
/// fetched again over the leftovers.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub repository: RepositoryKind,
    pub accession: String,
    pub files: Vec<String>,
    pub fetched_at: String,
    pub tool: String,
}

/// A single path segment that stays inside its directory: no separators,
/// drive prefixes or `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && !name.contains(':')
}

impl CacheStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dataset_dir(&self, accession: &AccessionCode) -> Utf8PathBuf {
        self.root
            .join(accession.kind().prefix())
            .join(accession.as_str())
    }

    pub fn artifact_path(&self, accession: &AccessionCode, filename: &str) -> Utf8PathBuf {
        self.dataset_dir(accession).join(filename)
    }

    pub fn exists(&self, accession: &AccessionCode) -> bool {
        self.artifact_path(accession, MANIFEST_FILE)
            .as_std_path()
            .is_file()
    }

    pub fn has_directory(&self, accession: &AccessionCode) -> bool {
        self.dataset_dir(accession).as_std_path().is_dir()
    }

    pub fn write(
        &self,
        accession: &AccessionCode,
        filename: &str,
        content: &[u8],
    ) -> Result<Utf8PathBuf, MetaboError> {
        if !is_plain_file_name(filename) {
            return Err(MetaboError::InvalidFileName(filename.to_string()));
        }
        let dir = self.dataset_dir(accession);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| MetaboError::Filesystem(format!("create {dir}: {err}")))?;
        let dest = dir.join(filename);
        let mut temp = Builder::new()
            .prefix(".metabo-ds")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| MetaboError::Filesystem(err.to_string()))?;
        std::io::Write::write_all(&mut temp, content)
            .map_err(|err| MetaboError::Filesystem(format!("write {dest}: {err}")))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| MetaboError::Filesystem(format!("persist {dest}: {err}")))?;
        debug!(path = %dest, bytes = content.len(), "cached artifact");
        Ok(dest)
    }

    pub fn read_to_string(
        &self,
        accession: &AccessionCode,
        filename: &str,
    ) -> Result<String, MetaboError> {
        let path = self.artifact_path(accession, filename);
        if !path.as_std_path().is_file() {
            return Err(MetaboError::MissingArtifact(path.into_std_path_buf()));
        }
        fs::read_to_string(path.as_std_path())
            .map_err(|err| MetaboError::Filesystem(format!("read {path}: {err}")))
    }

    pub fn open_artifact(
        &self,
        accession: &AccessionCode,
        filename: &str,
    ) -> Result<fs::File, MetaboError> {
        let path = self.artifact_path(accession, filename);
        if !path.as_std_path().is_file() {
            return Err(MetaboError::ArtifactNotFound(path.to_string()));
        }
        fs::File::open(path.as_std_path())
            .map_err(|err| MetaboError::Filesystem(format!("open {path}: {err}")))
    }

    /// Cached file names sorted by name; hidden entries (manifest, temp
    /// files) are skipped.
    pub fn list_files(&self, accession: &AccessionCode) -> Result<Vec<String>, MetaboError> {
        let dir = self.dataset_dir(accession);
        if !dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| MetaboError::Filesystem(format!("read {dir}: {err}")))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| MetaboError::Filesystem(err.to_string()))?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn write_manifest(
        &self,
        accession: &AccessionCode,
        files: Vec<String>,
    ) -> Result<Manifest, MetaboError> {
        let manifest = Manifest {
            repository: accession.kind(),
            accession: accession.as_str().to_string(),
            files,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("metabo-ds/{}", env!("CARGO_PKG_VERSION")),
        };
        let content = serde_json::to_vec_pretty(&manifest)
            .map_err(|err| MetaboError::Filesystem(err.to_string()))?;
        self.write(accession, MANIFEST_FILE, &content)?;
        Ok(manifest)
    }

    pub fn read_manifest(&self, accession: &AccessionCode) -> Result<Manifest, MetaboError> {
        let content = self.read_to_string(accession, MANIFEST_FILE)?;
        serde_json::from_str(&content).map_err(|err| MetaboError::Json {
            file: MANIFEST_FILE.to_string(),
            message: err.to_string(),
        })
    }

    /// Every completed dataset across the three repositories, ordered by
    /// repository then accession.
    pub fn list_cached(&self) -> Result<Vec<Manifest>, MetaboError> {
        let mut manifests = Vec::new();
        for kind in RepositoryKind::ALL {
            let repo_dir = self.root.join(kind.prefix());
            if !repo_dir.as_std_path().is_dir() {
                continue;
            }
            let entries = fs::read_dir(repo_dir.as_std_path())
                .map_err(|err| MetaboError::Filesystem(format!("read {repo_dir}: {err}")))?;
            let mut found = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|err| MetaboError::Filesystem(err.to_string()))?;
                let path = entry.path().join(MANIFEST_FILE);
                if !path.is_file() {
                    continue;
                }
                let content = fs::read_to_string(&path)
                    .map_err(|err| MetaboError::Filesystem(err.to_string()))?;
                let manifest: Manifest =
                    serde_json::from_str(&content).map_err(|err| MetaboError::Json {
                        file: path.display().to_string(),
                        message: err.to_string(),
                    })?;
                found.push(manifest);
            }
            found.sort_by(|a, b| a.accession.cmp(&b.accession));
            manifests.extend(found);
        }
        Ok(manifests)
    }
}
