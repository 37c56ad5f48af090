//! HTTP client for the answer service.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fields::{sanitize_answers, AnswerMap, FillRequest};

/// Client for `POST /api/fill` on a deployed answer service.
pub struct FillClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl FillClient {
    /// Create a client for the service at `api_url` (scheme + host, no
    /// trailing `/api/fill`). `api_key` is sent as a bearer token when set.
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send one fill request and return the answer map.
    ///
    /// A non-2xx status becomes `Error::ServiceError` carrying both the
    /// status code and the response body, so the caller can surface them
    /// together. The body of a 2xx response is post-validated: non-string
    /// values are dropped rather than trusted.
    pub async fn fill(&self, request: &FillRequest) -> Result<AnswerMap> {
        let url = format!("{}/api/fill", self.api_url);
        debug!(%url, fields = request.form_fields.len(), "requesting answers");

        let mut req = self.http.post(&url).json(request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        Ok(sanitize_answers(value))
    }
}
