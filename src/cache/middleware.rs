//! Response caching for listing pages.
//!
//! Wraps a route so that successful GET responses are stored in the page cache
//! under their [`PageKey`] and replayed verbatim until they expire or are
//! invalidated.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use super::{
    keys::PageKey,
    store::{CachedPage, PageCache},
};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for the middleware.
#[derive(Clone)]
pub struct PageCacheState {
    pub cache: Arc<dyn PageCache>,
    pub ttl: Duration,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(state): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = PageKey::from_uri(request.uri());

    if let Some(cached) = state.cache.get(&key) {
        debug!(cache = "page", outcome = "hit", key = %key, "serving cached page");
        return build_response(cached);
    }

    debug!(cache = "page", outcome = "miss", key = %key, "rendering page");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let page = CachedPage {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect(),
        body: bytes.clone(),
    };
    state.cache.set(key, page, state.ttl);

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedPage) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
