//! HTTP surface: asset routes, fixed pages, and the HTTPS redirect listener.

mod conditional;
pub mod delivery;
mod middleware;
pub mod negotiate;
mod redirect;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware as axum_middleware,
    response::Response,
    routing::get,
};

use crate::cache::CacheStore;
use crate::config::PageRoute;

pub use conditional::serve_bytes;
pub use delivery::{CachePolicy, deliver, not_found};
pub use negotiate::{Variant, select_variant};
pub use redirect::build_redirect_router;

#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<CacheStore>,
}

/// Router serving `{route_prefix}/{*path}` from the cache plus the fixed pages.
///
/// `route_prefix` must already be normalized (empty, or a leading `/` without
/// a trailing one).
pub fn build_router(state: HttpState, route_prefix: &str, pages: &[PageRoute]) -> Router {
    let asset_route = format!("{route_prefix}/{{*path}}");
    let mut router = Router::new().route(&asset_route, get(serve_asset));

    for page in pages {
        let asset = page.asset.clone();
        router = router.route(
            &page.route,
            get(move |State(state): State<HttpState>, request: Request<Body>| {
                let asset = asset.clone();
                async move { serve_page(state, asset, request) }
            }),
        );
    }

    router
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn serve_asset(
    State(state): State<HttpState>,
    Path(path): Path<String>,
    request: Request<Body>,
) -> Response {
    let (parts, _) = request.into_parts();
    match state.store.lookup(&path) {
        Some(entry) => deliver(&parts, &entry, CachePolicy::Static),
        None => not_found("infra::http::serve_asset", &path),
    }
}

fn serve_page(state: HttpState, asset: String, request: Request<Body>) -> Response {
    let (parts, _) = request.into_parts();
    match state.store.lookup(&asset) {
        Some(entry) => deliver(&parts, &entry, CachePolicy::NoStore),
        None => not_found("infra::http::serve_page", &asset),
    }
}
