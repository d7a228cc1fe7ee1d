use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::config::NetworkSettings;
use crate::error::MetaboError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Body of a 200 reply that carries content; `None` otherwise.
    pub fn into_content(self) -> Option<String> {
        (self.is_success() && !self.body.is_empty()).then_some(self.body)
    }
}

pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpReply, MetaboError>;
}

#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    max_retries: usize,
    retry_delay: Duration,
}

impl ReqwestHttpClient {
    pub fn new(network: &NetworkSettings) -> Result<Self, MetaboError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("metabo-ds/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MetaboError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(network.connect_timeout())
            .timeout(network.read_timeout())
            .build()
            .map_err(|err| MetaboError::Http(err.to_string()))?;
        Ok(Self {
            client,
            max_retries: network.max_retries,
            retry_delay: Duration::from_millis(network.retry_delay_ms),
        })
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, MetaboError> {
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        warn!(url, status, attempt, "retrying request");
                        thread::sleep(self.retry_delay * (attempt as u32 + 1));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        warn!(url, attempt, error = %err, "retrying request");
                        thread::sleep(self.retry_delay * (attempt as u32 + 1));
                        attempt += 1;
                        continue;
                    }
                    return Err(MetaboError::Http(format!("{url}: {err}")));
                }
            }
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str) -> Result<HttpReply, MetaboError> {
        debug!(url, "GET");
        let response = self.send_with_retries(url)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| MetaboError::Http(format!("{url}: {err}")))?;
        debug!(url, status, bytes = body.len(), "response");
        Ok(HttpReply { status, body })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_requires_ok_and_body() {
        let reply = HttpReply {
            status: 200,
            body: "data".to_string(),
        };
        assert_eq!(reply.into_content().as_deref(), Some("data"));

        let empty = HttpReply {
            status: 200,
            body: String::new(),
        };
        assert_eq!(empty.into_content(), None);

        let missing = HttpReply {
            status: 404,
            body: "Not Found".to_string(),
        };
        assert_eq!(missing.into_content(), None);
    }

    #[test]
    fn retry_policy_skips_not_found() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
