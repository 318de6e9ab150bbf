//! HTTP capability used for relay probes and submissions.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-over-HTTP transport. Any non-2xx status is an error.
pub trait HttpTransport: Send + Sync {
    fn get_json(&self, url: &str) -> impl Future<Output = Result<Value, crate::Error>> + Send;

    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Value, crate::Error>> + Send;
}

impl<T: HttpTransport> HttpTransport for &T {
    fn get_json(&self, url: &str) -> impl Future<Output = Result<Value, crate::Error>> + Send {
        (**self).get_json(url)
    }

    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Value, crate::Error>> + Send {
        (**self).post_json(url, body)
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, crate::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http })
    }

    async fn read_json(url: &str, resp: reqwest::Response) -> Result<Value, crate::Error> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(crate::Error::Http(format!("{url}: HTTP {status}: {body}")));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| crate::Error::Http(format!("{url}: invalid JSON: {e}")))
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<Value, crate::Error> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| crate::Error::Http(format!("GET {url}: {e}")))?;
        Self::read_json(url, resp).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, crate::Error> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| crate::Error::Http(format!("POST {url}: {e}")))?;
        Self::read_json(url, resp).await
    }
}

// --- Test transport (shared across module tests) ---
