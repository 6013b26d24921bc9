//! HTTP plumbing towards the session-issuing service.
//!
//! - one shared `reqwest::Client` (cheap to clone, pooled connections)
//! - [`ProviderForwarder`]: relays requests for the provider's own namespace
//!   (sign-in, callback, sign-out, get-session) to the provider unchanged

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, header};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid forward target: {0}")]
    Target(String),
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

/// Shared client for every call to the provider.
///
/// Redirects are not followed: OAuth flows answer with `302` + `Set-Cookie`, and the
/// browser has to see both.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("session-gate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Upstream answer, already detached from the reqwest types.
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Debug)]
pub struct ProviderForwarder {
    client: reqwest::Client,
    base_url: Url,
}

impl ProviderForwarder {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Sends `method path_and_query` to the provider with the caller's headers and body.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ForwardedResponse, ForwardError> {
        let target = self
            .base_url
            .join(path_and_query)
            .map_err(|e| ForwardError::Target(e.to_string()))?;

        // `join` with an absolute path could still switch hosts via `//host/...`.
        if target.origin() != self.base_url.origin() {
            return Err(ForwardError::Target(format!("{target} leaves provider origin")));
        }

        let response = self
            .client
            .request(method, target)
            .headers(strip_hop_by_hop(headers, &[header::HOST, header::CONTENT_LENGTH]))
            .body(body)
            .send()
            .await
            .map_err(|e| ForwardError::Unreachable(e.to_string()))?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers(), &[header::CONTENT_LENGTH]);
        let body = response
            .bytes()
            .await
            .map_err(|e| ForwardError::Unreachable(e.to_string()))?;

        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}

/// Connection-scoped headers must not cross a proxy hop (RFC 9110 §7.6.1).
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter().chain(extra) {
        out.remove(name);
    }
    out
}
