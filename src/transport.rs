use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::protocol;
use crate::Result;

#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub text: String,
}

pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
}

impl Transport {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Paths resolve against the base URL; absolute URLs are used as given.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<RawResponse> {
        let url = self.url(path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, protocol::USER_AGENT)
            .json(body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).ok();
        trace!(%method, url = %url, status, "dsiot response");

        Ok(RawResponse { status, body, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_relative_paths() {
        let t = Transport::new(reqwest::Client::new(), "https://example.com/");
        assert_eq!(t.url("/dsiot/multireq"), "https://example.com/dsiot/multireq");
        assert_eq!(t.url("premise/dsiot/login"), "https://example.com/premise/dsiot/login");
    }

    #[test]
    fn url_keeps_absolute_urls() {
        let t = Transport::new(reqwest::Client::new(), "https://example.com");
        assert_eq!(t.url("https://other.example/common/login"), "https://other.example/common/login");
    }
}
