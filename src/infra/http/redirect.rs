use axum::{
    Router,
    body::Body,
    http::{
        HeaderValue, Request, StatusCode,
        header::{CONNECTION, HOST, LOCATION},
    },
    middleware as axum_middleware,
    response::{IntoResponse, Response},
};

use crate::application::error::ErrorReport;

use super::middleware::{log_responses, set_request_context};

/// Router that answers every request with a permanent redirect to HTTPS.
pub fn build_redirect_router() -> Router {
    Router::new()
        .fallback(redirect_to_https)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn redirect_to_https(request: Request<Body>) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()));

    let Some(host) = host else {
        let mut response = (StatusCode::BAD_REQUEST, "missing Host header").into_response();
        ErrorReport::from_message(
            "infra::http::redirect_to_https",
            StatusCode::BAD_REQUEST,
            "redirect request without Host",
        )
        .attach(&mut response);
        return response;
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("https://{host}{path_and_query}");

    let Ok(location) = HeaderValue::from_str(&target) else {
        let mut response = StatusCode::BAD_REQUEST.into_response();
        ErrorReport::from_message(
            "infra::http::redirect_to_https",
            StatusCode::BAD_REQUEST,
            format!("cannot build redirect target `{target}`"),
        )
        .attach(&mut response);
        return response;
    };

    let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
    let headers = response.headers_mut();
    headers.insert(LOCATION, location);
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn redirects_with_path_and_query() {
        let response = build_redirect_router()
            .oneshot(
                Request::builder()
                    .uri("/static/app.js?v=3")
                    .header(HOST, "example.org")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()[LOCATION],
            "https://example.org/static/app.js?v=3"
        );
        assert_eq!(response.headers()[CONNECTION], "close");
    }

    #[tokio::test]
    async fn missing_host_is_bad_request() {
        let response = build_redirect_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
