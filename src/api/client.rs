//! Shared reqwest client with bearer auth and response mapping.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::error::ApiError;

/// Error body shape used by the dispatch backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// One authenticated client for all backend calls.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) http: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: Client::new(),
            base_url,
            token: token.into(),
        }
    }

    /// Absolute URL for a backend path.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn bearer(&self) -> &str {
        &self.token
    }

    /// Map a response into the error taxonomy: 401 becomes AuthExpired,
    /// other non-2xx statuses surface the server message when present.
    pub(crate) async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthExpired);
        }
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Err(ApiError::Network(message))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_stripped_from_base() {
        let c = ApiClient::new("https://api.example.com//", "tok");
        assert_eq!(c.url("/api/jobs"), "https://api.example.com/api/jobs");
    }
}
