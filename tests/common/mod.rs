#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;

use metabo_datasets::config::{MetaboLightsSettings, Settings};
use metabo_datasets::error::MetaboError;
use metabo_datasets::ftp::{FtpConnector, FtpSession};
use metabo_datasets::http::{HttpClient, HttpReply};
use metabo_datasets::pipeline::Pipeline;

pub const MTBLS_DIR: &str = "/pub/databases/metabolights/studies/public";
pub const MTBLS_HTTP: &str = "http://ftp.ebi.ac.uk/pub/databases/metabolights/studies/public";
pub const WORKBENCH_REST: &str = "https://www.metabolomicsworkbench.org/rest";
pub const WORKBENCH_DATA: &str =
    "https://www.metabolomicsworkbench.org/data/study_textformat_view.php";
pub const METABOBANK_STUDY: &str = "https://ddbj.nig.ac.jp/public/metabobank/study";

/// Canned HTTP replies keyed by URL; anything else answers 404.
#[derive(Default)]
pub struct MockHttp {
    routes: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn with(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn ok(self, url: &str, body: &str) -> Self {
        self.with(url, 200, body)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpClient for MockHttp {
    fn get(&self, url: &str) -> Result<HttpReply, MetaboError> {
        self.calls.lock().unwrap().push(url.to_string());
        let (status, body) = self
            .routes
            .get(url)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(HttpReply { status, body })
    }
}

/// Wraps [`MockHttp`] and sleeps before every reply.
pub struct SlowHttp {
    pub inner: MockHttp,
    pub delay: Duration,
}

impl HttpClient for SlowHttp {
    fn get(&self, url: &str) -> Result<HttpReply, MetaboError> {
        thread::sleep(self.delay);
        self.inner.get(url)
    }
}

/// In-memory FTP tree: absolute directory path to its entry names.
#[derive(Default)]
pub struct MockFtp {
    dirs: HashMap<String, Vec<String>>,
    connects: Mutex<usize>,
}

impl MockFtp {
    pub fn dir(mut self, path: &str, entries: &[&str]) -> Self {
        self.dirs.insert(
            path.to_string(),
            entries.iter().map(|entry| entry.to_string()).collect(),
        );
        self
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }
}

impl FtpConnector for MockFtp {
    fn connect(
        &self,
        _settings: &MetaboLightsSettings,
    ) -> Result<Box<dyn FtpSession>, MetaboError> {
        *self.connects.lock().unwrap() += 1;
        Ok(Box::new(MockSession {
            dirs: self.dirs.clone(),
            current: "/".to_string(),
        }))
    }
}

struct MockSession {
    dirs: HashMap<String, Vec<String>>,
    current: String,
}

impl FtpSession for MockSession {
    fn cwd(&mut self, path: &str) -> Result<(), MetaboError> {
        let target = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.current.trim_end_matches('/'), path)
        };
        if !self.dirs.contains_key(&target) {
            return Err(MetaboError::Ftp(format!("550 {target}: no such directory")));
        }
        self.current = target;
        Ok(())
    }

    fn nlst(&mut self) -> Result<Vec<String>, MetaboError> {
        Ok(self.dirs.get(&self.current).cloned().unwrap_or_default())
    }

    fn quit(self: Box<Self>) -> Result<(), MetaboError> {
        Ok(())
    }
}

pub fn utf8_root(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

pub fn pipeline(root: &Path, http: Arc<dyn HttpClient>, ftp: Arc<MockFtp>) -> Pipeline {
    Pipeline::new(Settings::with_datasets_root(utf8_root(root)), http, ftp)
}
