use axum::{
    body::{self, Body},
    extract::Request,
    http::{HeaderMap, HeaderName, StatusCode, Uri, header},
    response::Response,
};
use tracing::warn;
use url::Url;

use crate::gatekeeper;

/// Upper bound on a request body relayed to the page origin.
const MAX_FORWARD_BODY: usize = 10 * 1024 * 1024;

/// PageOrigin
///
/// The upstream server that renders pages. Every request the gatekeeper allows (and
/// that no local route claims) is relayed here unchanged and its answer is relayed
/// back.
#[derive(Clone, Debug)]
pub struct PageOrigin {
    client: reqwest::Client,
    base: Url,
}

impl PageOrigin {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(base_url)?,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// forward
    ///
    /// Relays method, path, query, end-to-end headers and body. The path is set on
    /// the base URL verbatim and must already be canonical, so the origin serves the
    /// resource that was gated. Fails with `400` for a non-canonical path, `413` for
    /// oversized bodies and `502` when the origin cannot be reached.
    pub async fn forward(&self, request: Request) -> Result<Response, StatusCode> {
        let target = self.target_for(request.uri())?;

        let (parts, body) = request.into_parts();
        let bytes = body::to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

        let mut headers = end_to_end(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let upstream = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, origin = %self.base, "page origin unreachable");
                StatusCode::BAD_GATEWAY
            })?;

        let status = upstream.status();
        let headers = end_to_end(upstream.headers());
        let body = upstream.bytes().await.map_err(|e| {
            warn!(error = %e, "page origin response interrupted");
            StatusCode::BAD_GATEWAY
        })?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// The origin URL for `uri`: same scheme, host and port as the base, with the
    /// request's path and query.
    pub fn target_for(&self, uri: &Uri) -> Result<Url, StatusCode> {
        let path = uri.path();
        if gatekeeper::canonical_path(path) != path {
            warn!(%path, "refusing to forward a non-canonical path");
            return Err(StatusCode::BAD_REQUEST);
        }
        let mut target = self.base.clone();
        target.set_path(path);
        target.set_query(uri.query());
        Ok(target)
    }
}

/// Hop-by-hop headers apply to a single connection and are not relayed.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
