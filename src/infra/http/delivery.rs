//! Response assembly for a cached asset.

use axum::{
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{
            CACHE_CONTROL, CONTENT_ENCODING, CONTENT_SECURITY_POLICY, CONTENT_TYPE, ETAG,
            STRICT_TRANSPORT_SECURITY, VARY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
            X_XSS_PROTECTION,
        },
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use metrics::counter;

use crate::application::error::ErrorReport;
use crate::cache::CachedEntry;

use super::conditional::serve_bytes;
use super::negotiate::select_variant;

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const SNIFF_LEN: usize = 512;
const METRIC_RESPONSES_TOTAL: &str = "vitrine_http_responses_total";

/// Caching directive sent with an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Thirty days of client caching.
    Static,
    /// Always revalidate. Used for fixed pages.
    NoStore,
}

impl CachePolicy {
    pub fn header_value(self) -> HeaderValue {
        match self {
            CachePolicy::Static => HeaderValue::from_static("max-age=2592000"),
            CachePolicy::NoStore => HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        }
    }
}

/// Build the full response for `entry`, picking the variant from the request.
pub fn deliver(request: &Parts, entry: &CachedEntry, policy: CachePolicy) -> Response {
    let accept_encoding = request
        .headers
        .get(axum::http::header::ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok());
    let variant = select_variant(accept_encoding, entry);

    let mut headers = HeaderMap::new();
    headers.insert(KEEP_ALIVE, HeaderValue::from_static("timeout=5, max=100"));
    headers.insert(CACHE_CONTROL, policy.header_value());
    if let Ok(etag) = HeaderValue::from_str(&entry.validator) {
        headers.insert(ETAG, etag);
    }
    insert_security_headers(&mut headers);

    if let Ok(value) = HeaderValue::from_str(&content_type(&entry.filename, &entry.raw)) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Some(encoding) = variant.content_encoding() {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));

    let response = serve_bytes(request, headers, variant.body(entry), entry.last_modified);

    counter!(
        METRIC_RESPONSES_TOTAL,
        "status" => response.status().as_u16().to_string(),
        "encoding" => variant.label()
    )
    .increment(1);

    response
}

/// Plain 404 for a path with no cached entry.
pub fn not_found(source: &'static str, path: &str) -> Response {
    counter!(
        METRIC_RESPONSES_TOTAL,
        "status" => "404",
        "encoding" => "identity"
    )
    .increment(1);

    let mut response = (StatusCode::NOT_FOUND, "404 page not found").into_response();
    ErrorReport::from_message(
        source,
        StatusCode::NOT_FOUND,
        format!("no cached asset for `{path}`"),
    )
    .attach(&mut response);
    response
}

/// Media type from the file name, falling back to a look at the body.
///
/// Only markup and plain text are recognized by content. Anything else with
/// an unknown extension is sent as `application/octet-stream`.
pub fn content_type(filename: &str, raw: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(filename).first() {
        return mime.to_string();
    }

    let head = &raw[..raw.len().min(SNIFF_LEN)];
    let text = head.trim_ascii_start();
    let lowered = text
        .iter()
        .take(14)
        .map(u8::to_ascii_lowercase)
        .collect::<Vec<_>>();
    if lowered.starts_with(b"<!doctype html") || lowered.starts_with(b"<html") {
        return "text/html; charset=utf-8".to_string();
    }
    if looks_like_text(head) {
        return "text/plain; charset=utf-8".to_string();
    }
    mime_guess::mime::APPLICATION_OCTET_STREAM.to_string()
}

fn looks_like_text(head: &[u8]) -> bool {
    // A multi-byte sequence may be cut at the sniff boundary.
    let valid = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    };
    valid
        && !head
            .iter()
            .any(|b| matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F))
}

fn insert_security_headers(headers: &mut HeaderMap) {
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    headers.insert(
        STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
}
