//! Shared HTTP plumbing for the adapters.

use std::time::Duration;

use labgrader_state::{GatewayError, GatewayResult};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

pub(crate) const USER_AGENT: &str = concat!("labgrader/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 300;

/// HTTP client with the adapter-wide timeout and user agent.
pub(crate) fn build_client(service: &str) -> GatewayResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| GatewayError::transport(service, e))
}

/// Map a `reqwest` send failure.
pub(crate) fn send_error(service: &str, err: reqwest::Error) -> GatewayError {
    GatewayError::transport(service, err)
}

/// Pass 2xx responses through; turn everything else into an error.
///
/// 5xx and 429 are transport failures (worth retrying later); other
/// statuses mean the request itself was wrong.
pub(crate) async fn check_status(service: &str, resp: Response) -> GatewayResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = format!("{status}: {}", truncate(body.trim(), ERROR_BODY_LIMIT));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(GatewayError::transport(service, message))
    } else {
        Err(GatewayError::protocol(service, message))
    }
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(service: &str, resp: Response) -> GatewayResult<T> {
    let resp = check_status(service, resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| GatewayError::protocol(service, format!("decoding body: {e}")))
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
