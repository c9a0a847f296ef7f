use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// What one delivery attempt came back with. `status: None` means the
/// request never produced an HTTP response (transport failure).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: Option<u16>,
    pub request_id: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn transport_failure(err: impl std::fmt::Display) -> Self {
        Self {
            status: None,
            request_id: None,
            body: err.to_string(),
        }
    }
}

/// Seam between the pipeline and the wire. Production goes through
/// `HttpTransport`; tests substitute a scripted in-memory transport.
pub trait ApiTransport {
    /// PUT a JSON document. Transport-level failures are folded into the
    /// returned `ApiResponse` (status `None`) rather than an `Err`, so the
    /// caller classifies every outcome in one place.
    fn put_json(&self, url: &str, body: &Value) -> Result<ApiResponse>;

    /// GET a JSON document, erroring on any non-2xx response.
    fn get_json(&self, url: &str) -> Result<Value>;
}

const REQUEST_ID_HEADER: &str = "x-github-request-id";

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(timeout_seconds: u64, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("sarif-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("constructing HTTP client")?;
        Ok(Self { client, token })
    }

    fn authed(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

impl ApiTransport for HttpTransport {
    fn put_json(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        let result = self.authed(self.client.put(url)).json(body).send();

        let response = match result {
            Ok(r) => r,
            Err(err) => {
                debug!("PUT {url} transport failure: {err}");
                return Ok(ApiResponse::transport_failure(err));
            }
        };

        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().unwrap_or_default();
        debug!("PUT {url} -> {status}");

        Ok(ApiResponse {
            status: Some(status),
            request_id,
            body,
        })
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .authed(self.client.get(url))
            .send()
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("GET {url} returned {status}: {body}"));
        }

        response.json().with_context(|| format!("GET {url}: parsing JSON"))
    }
}
