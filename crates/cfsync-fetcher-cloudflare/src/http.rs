// # HTTP plumbing shared by both protocols
//
// One client per fetcher (cookie jar included), one status mapping for
// every call. URLs are never included in errors: legacy URLs carry the
// access token in the query string.

use cfsync_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Provider name used in error messages
pub(crate) const PROVIDER: &str = "cloudflare";

/// Default HTTP timeout for every request (30 seconds)
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used for a whole run
///
/// Cookies are kept so a browser-style login carries over to later calls.
pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .cookie_store(true)
        .user_agent(concat!("cfsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport failure, dropping the URL from the message
pub(crate) fn send_error(e: reqwest::Error) -> Error {
    Error::http(format!("HTTP request failed: {}", e.without_url()))
}

/// Map a non-success status to the error taxonomy
///
/// `what` names the call for the message (e.g. "zone listing").
pub(crate) fn status_error(status: reqwest::StatusCode, what: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: invalid credentials or insufficient permissions. Status: {}",
            what, status
        )),
        404 => Error::not_found(format!("{} not found. Status: {}", what, status)),
        429 => Error::rate_limited(format!(
            "{} rate limited. Please retry later. Status: {}",
            what, status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient) during {}: {}", what, status),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed: {}", what, status)),
    }
}

/// Fail on a non-success status, otherwise hand the response back
pub(crate) fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::debug!("{} returned {}", what, status);
        Err(status_error(status, what))
    }
}

/// Read a successful response as text
pub(crate) async fn read_text(response: reqwest::Response, what: &str) -> Result<String> {
    check_status(response, what)?
        .text()
        .await
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to read {} response: {}", what, e.without_url())))
}

/// Read a successful response as JSON
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let body = read_text(response, what).await?;
    serde_json::from_str(&body)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse {} response: {}", what, e)))
}

/// Extract `field` from a dashboard (`/api/v2`) style response
///
/// These responses carry `"result": "success" | "error"` with the data
/// under `response` and the failure text under `msg`.
pub(crate) fn v2_field(mut body: Value, field: &str, what: &str) -> Result<Value> {
    if body.get("result").and_then(Value::as_str) == Some("error") {
        let msg = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(Error::provider(PROVIDER, format!("{} failed: {}", what, msg)));
    }

    body.get_mut(field)
        .map(Value::take)
        .ok_or_else(|| {
            Error::provider(
                PROVIDER,
                format!("Invalid {} response: missing `{}`", what, field),
            )
        })
}

/// Base URL without trailing slashes
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
