//! Shared plumbing for the Google REST endpoints (Identity Toolkit, Firestore).

use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

/// HTTP client shared by every remote collaborator
pub fn build_http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("decompas-admin-bootstrap/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::Http)
}

/// Base URL for a local emulator host such as `localhost:9099`
pub fn emulator_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Turn a non-success response into a `ProviderError::Api`
pub async fn check_response(response: Response, operation: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_error_message(&body);
    debug!(status = %status, operation, message = %message, "API error response");

    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) if !parsed.error.message.contains(&status) => {
                format!("{} ({})", parsed.error.message, status)
            }
            _ => parsed.error.message,
        },
        Err(_) if body.is_empty() => "empty response body".to_string(),
        Err(_) => body.to_string(),
    }
}
