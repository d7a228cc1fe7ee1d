use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::MetaboError;

pub const DEFAULT_CONFIG_FILE: &str = "metabo-ds.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_datasets_root")]
    pub datasets_root: Utf8PathBuf,
    #[serde(default)]
    pub metabolights: MetaboLightsSettings,
    #[serde(default)]
    pub workbench: WorkbenchSettings,
    #[serde(default)]
    pub metabobank: MetaboBankSettings,
    #[serde(default)]
    pub network: NetworkSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            datasets_root: default_datasets_root(),
            metabolights: MetaboLightsSettings::default(),
            workbench: WorkbenchSettings::default(),
            metabobank: MetaboBankSettings::default(),
            network: NetworkSettings::default(),
        }
    }
}

impl Settings {
    pub fn with_datasets_root(root: Utf8PathBuf) -> Self {
        Self {
            datasets_root: root,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetaboLightsSettings {
    pub ftp_host: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_password: String,
    pub ftp_base_dir: String,
    /// HTTP mirror of the FTP tree, used for the actual file downloads.
    pub remote_url: String,
    pub investigation_file: String,
    pub result_files_manifest: String,
}

impl Default for MetaboLightsSettings {
    fn default() -> Self {
        Self {
            ftp_host: "ftp.ebi.ac.uk".to_string(),
            ftp_port: 21,
            ftp_user: "anonymous".to_string(),
            ftp_password: "anonymous@".to_string(),
            ftp_base_dir: "/pub/databases/metabolights/studies/public".to_string(),
            remote_url: "http://ftp.ebi.ac.uk/pub/databases/metabolights/studies/public"
                .to_string(),
            investigation_file: "i_Investigation.txt".to_string(),
            result_files_manifest: "result_files.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkbenchSettings {
    pub rest_base_url: String,
    pub data_url: String,
    pub json_suffix: String,
    pub mwtab_suffix: String,
}

impl Default for WorkbenchSettings {
    fn default() -> Self {
        Self {
            rest_base_url: "https://www.metabolomicsworkbench.org/rest".to_string(),
            data_url: "https://www.metabolomicsworkbench.org/data/study_textformat_view.php"
                .to_string(),
            json_suffix: ".json".to_string(),
            mwtab_suffix: ".mwtab.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetaboBankSettings {
    pub study_url: String,
    pub idf_suffix: String,
    pub sdrf_suffix: String,
    pub filelist_suffix: String,
}

impl Default for MetaboBankSettings {
    fn default() -> Self {
        Self {
            study_url: "https://ddbj.nig.ac.jp/public/metabobank/study".to_string(),
            idf_suffix: ".idf.txt".to_string(),
            sdrf_suffix: ".sdrf.txt".to_string(),
            filelist_suffix: ".filelist.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            max_retries: 3,
            retry_delay_ms: 200,
        }
    }
}

impl NetworkSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<Settings, MetaboError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let settings = if path.is_none() && !config_path.exists() {
            Settings::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| MetaboError::ConfigRead(config_path.clone()))?;
            Self::parse(&content)?
        };

        Ok(Self::apply_env(settings, |key| std::env::var(key).ok()))
    }

    pub fn parse(content: &str) -> Result<Settings, MetaboError> {
        serde_json::from_str(content).map_err(|err| MetaboError::ConfigParse(err.to_string()))
    }

    pub fn apply_env<F>(mut settings: Settings, lookup: F) -> Settings
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(root) = non_empty("METABO_DATASETS_DIR") {
            settings.datasets_root = Utf8PathBuf::from(root.trim());
        }
        if let Some(user) = non_empty("MTBLS_FTP_USER") {
            settings.metabolights.ftp_user = user;
        }
        if let Some(password) = non_empty("MTBLS_FTP_PASSWORD") {
            settings.metabolights.ftp_password = password;
        }
        settings
    }
}

fn default_datasets_root() -> Utf8PathBuf {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("metabo-datasets")
                    .join("datasets"),
            )
            .ok()
        })
        .unwrap_or_else(|| Utf8PathBuf::from("datasets"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let settings = ConfigLoader::parse(
            r#"{"datasets_root": "/tmp/ds", "metabolights": {"ftp_user": "reader"}}"#,
        )
        .unwrap();
        assert_eq!(settings.datasets_root, Utf8PathBuf::from("/tmp/ds"));
        assert_eq!(settings.metabolights.ftp_user, "reader");
        assert_eq!(settings.metabolights.ftp_host, "ftp.ebi.ac.uk");
        assert_eq!(settings.workbench.json_suffix, ".json");
        assert_eq!(settings.network.max_retries, 3);
    }

    #[test]
    fn env_overrides_apply() {
        let settings = ConfigLoader::apply_env(Settings::default(), |key| match key {
            "METABO_DATASETS_DIR" => Some("/data/cache".to_string()),
            "MTBLS_FTP_PASSWORD" => Some("secret".to_string()),
            "MTBLS_FTP_USER" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(settings.datasets_root, Utf8PathBuf::from("/data/cache"));
        assert_eq!(settings.metabolights.ftp_password, "secret");
        assert_eq!(settings.metabolights.ftp_user, "anonymous");
    }
}
