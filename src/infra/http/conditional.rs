//! Conditional-GET and byte-range delivery of an in-memory buffer.
//!
//! Precondition order follows RFC 9110 §13.2.2: `If-Match`, then
//! `If-Unmodified-Since`, then `If-None-Match`, then `If-Modified-Since`, and
//! finally `Range` gated by `If-Range`. Dates compare at whole-second
//! granularity because that is all an HTTP date carries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
            IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE,
            LAST_MODIFIED, RANGE,
        },
        request::Parts,
    },
    response::Response,
};
use bytes::Bytes;

/// Answer `request` with `body`, honoring validators and a single byte range.
///
/// `headers` are the response headers prepared by the caller and must already
/// contain `ETag` when one applies. `Last-Modified` is set here.
pub fn serve_bytes(
    request: &Parts,
    mut headers: HeaderMap,
    body: Bytes,
    last_modified: SystemTime,
) -> Response {
    let last_modified = truncate_to_seconds(last_modified);
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(last_modified)) {
        headers.insert(LAST_MODIFIED, value);
    }

    let etag = headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match evaluate_preconditions(request, etag.as_deref(), last_modified) {
        Precondition::Failed => return without_body(StatusCode::PRECONDITION_FAILED, headers),
        Precondition::NotModified => return without_body(StatusCode::NOT_MODIFIED, headers),
        Precondition::Proceed => {}
    }

    let total = body.len() as u64;
    let range = if if_range_allows(request, etag.as_deref(), last_modified) {
        header_str(&request.headers, RANGE).map(|value| parse_range(value, total))
    } else {
        None
    };

    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let (status, payload) = match range {
        Some(RangeOutcome::Single { start, end }) => {
            let content_range = format!("bytes {start}-{end}/{total}");
            if let Ok(value) = HeaderValue::from_str(&content_range) {
                headers.insert(CONTENT_RANGE, value);
            }
            (
                StatusCode::PARTIAL_CONTENT,
                body.slice(start as usize..=end as usize),
            )
        }
        Some(RangeOutcome::Unsatisfiable) => {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
                headers.insert(CONTENT_RANGE, value);
            }
            headers.remove(CONTENT_ENCODING);
            return with_body(
                StatusCode::RANGE_NOT_SATISFIABLE,
                headers,
                Bytes::new(),
                request,
            );
        }
        Some(RangeOutcome::Ignored) | None => (StatusCode::OK, body),
    };

    with_body(status, headers, payload, request)
}

#[derive(Debug, PartialEq, Eq)]
enum Precondition {
    Proceed,
    NotModified,
    Failed,
}

fn evaluate_preconditions(
    request: &Parts,
    etag: Option<&str>,
    last_modified: SystemTime,
) -> Precondition {
    let headers = &request.headers;

    if let Some(if_match) = header_str(headers, IF_MATCH) {
        if !etag_list_matches(if_match, etag, Comparison::Strong) {
            return Precondition::Failed;
        }
    } else if let Some(since) = header_date(headers, IF_UNMODIFIED_SINCE)
        && last_modified > since
    {
        return Precondition::Failed;
    }

    let safe = request.method == Method::GET || request.method == Method::HEAD;

    if let Some(if_none_match) = header_str(headers, IF_NONE_MATCH) {
        if etag_list_matches(if_none_match, etag, Comparison::Weak) {
            return if safe {
                Precondition::NotModified
            } else {
                Precondition::Failed
            };
        }
    } else if safe
        && let Some(since) = header_date(headers, IF_MODIFIED_SINCE)
        && last_modified <= since
    {
        return Precondition::NotModified;
    }

    Precondition::Proceed
}

fn if_range_allows(request: &Parts, etag: Option<&str>, last_modified: SystemTime) -> bool {
    let Some(value) = header_str(&request.headers, IF_RANGE) else {
        return true;
    };

    match httpdate::parse_http_date(value) {
        Ok(date) => date == last_modified,
        Err(_) => etag_list_matches(value, etag, Comparison::Strong),
    }
}

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Strong,
    Weak,
}

/// Match a comma separated validator list against the current tag.
///
/// Quotes are ignored on both sides so bare and quoted forms compare equal.
fn etag_list_matches(list: &str, current: Option<&str>, comparison: Comparison) -> bool {
    let Some(current) = current else {
        return false;
    };
    let (current_weak, current_tag) = split_etag(current);

    list.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return true;
        }
        let (weak, tag) = split_etag(candidate);
        match comparison {
            Comparison::Strong => !weak && !current_weak && tag == current_tag,
            Comparison::Weak => tag == current_tag,
        }
    })
}

fn split_etag(raw: &str) -> (bool, &str) {
    let (weak, rest) = match raw.strip_prefix("W/") {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    (weak, rest.trim_matches('"'))
}

#[derive(Debug, PartialEq, Eq)]
enum RangeOutcome {
    /// Inclusive byte offsets.
    Single {
        start: u64,
        end: u64,
    },
    Unsatisfiable,
    /// Unknown unit or multiple ranges; send the full representation.
    Ignored,
}

fn parse_range(value: &str, total: u64) -> RangeOutcome {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Ignored;
    };
    if spec.contains(',') {
        return RangeOutcome::Ignored;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return RangeOutcome::Unsatisfiable;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeOutcome::Unsatisfiable;
        };
        if suffix == 0 || total == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Single {
            start: total - suffix.min(total),
            end: total - 1,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Unsatisfiable;
    };
    if start >= total {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if last.is_empty() {
        total - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(total - 1),
            _ => return RangeOutcome::Unsatisfiable,
        }
    };

    RangeOutcome::Single { start, end }
}

fn without_body(status: StatusCode, mut headers: HeaderMap) -> Response {
    headers.remove(CONTENT_TYPE);
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_ENCODING);
    build(status, headers, Body::empty())
}

fn with_body(
    status: StatusCode,
    mut headers: HeaderMap,
    payload: Bytes,
    request: &Parts,
) -> Response {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(payload.len()));
    let body = if request.method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(payload)
    };
    build(status, headers, body)
}

fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn header_date(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<SystemTime> {
    header_str(headers, name).and_then(|value| httpdate::parse_http_date(value).ok())
}

fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => UNIX_EPOCH + Duration::from_secs(elapsed.as_secs()),
        Err(_) => UNIX_EPOCH,
    }
}
