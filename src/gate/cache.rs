//! JSON response cache keyed by path and query.
//!
//! Only `GET` responses with status 200 and a JSON content type are stored. A hit is served without
//! invoking the handler. Requests carrying a credential bypass the cache in both directions, since
//! the key does not include the caller. A successful POST, PUT, PATCH or DELETE through the same
//! cache purges every entry on a related path (the mutated path itself, its parents, and its
//! children); entries otherwise only expire by time. HEAD and OPTIONS pass straight through.
//! Bodies over [`MAX_CACHEABLE_BODY`] are returned to the client intact but never stored.
//!
//! Keys use the original request URI, so a cache layered on a nested router still sees full paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{OriginalUri, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::GateError;
use crate::identity::Credential;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;
/// Bodies above this size are passed through uncached.
pub const MAX_CACHEABLE_BODY: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Bytes,
    captured_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries, entries: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.get_at(key, Instant::now())
    }

    /// Stale entries are dropped on read.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Bytes> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(e) if now.saturating_duration_since(e.captured_at) < self.ttl => Some(e.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, payload: Bytes) {
        self.put_at(key, payload, Instant::now())
    }

    pub fn put_at(&self, key: &str, payload: Bytes, now: Instant) {
        let ttl = self.ttl;
        let mut entries = self.entries.lock();
        entries.retain(|_, e| now.saturating_duration_since(e.captured_at) < ttl);
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            let oldest = entries.iter().min_by_key(|(_, e)| e.captured_at).map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            }
        }
        entries.insert(key.to_string(), CacheEntry { payload, captured_at: now });
    }

    /// Remove every entry whose path is `path`, an ancestor of it, or a descendant of it.
    pub fn invalidate_related(&self, path: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !paths_related(key_path(key), path));
        before - entries.len()
    }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

pub fn cache_key(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn request_uri(request: &Request) -> &Uri {
    match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri,
        None => request.uri(),
    }
}

fn key_path(key: &str) -> &str {
    key.split_once('?').map(|(p, _)| p).unwrap_or(key)
}

fn is_prefix_segment(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    prefix.is_empty() || path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

fn paths_related(a: &str, b: &str) -> bool {
    is_prefix_segment(a, b) || is_prefix_segment(b, a)
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn is_mutation(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

enum Buffered {
    Complete(Bytes),
    /// Over the cap; the body replays everything already read followed by the rest of the stream.
    Oversized(Body),
}

async fn buffer_capped(body: Body, cap: usize) -> Result<Buffered, axum::Error> {
    if body.size_hint().lower() > cap as u64 {
        return Ok(Buffered::Oversized(body));
    }
    let mut data = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0usize;
    while let Some(chunk) = data.next().await {
        let chunk = chunk?;
        total += chunk.len();
        chunks.push(chunk);
        if total > cap {
            let replay = stream::iter(chunks.into_iter().map(Ok::<Bytes, axum::Error>)).chain(data);
            return Ok(Buffered::Oversized(Body::from_stream(replay)));
        }
    }
    if chunks.len() == 1 {
        return Ok(Buffered::Complete(chunks.remove(0)));
    }
    let mut buf = Vec::with_capacity(total);
    for c in &chunks {
        buf.extend_from_slice(c);
    }
    Ok(Buffered::Complete(Bytes::from(buf)))
}

fn cached_response(payload: Bytes) -> Response {
    let mut response = Response::new(Body::from(payload));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response.headers_mut().insert("x-cache", HeaderValue::from_static("HIT"));
    response
}

pub async fn cache_json(State(cache): State<Arc<ResponseCache>>, request: Request, next: Next) -> Response {
    if is_mutation(request.method()) {
        let path = request_uri(&request).path().to_string();
        let response = next.run(request).await;
        if response.status().is_success() {
            let purged = cache.invalidate_related(&path);
            if purged > 0 {
                debug!(path = %path, purged, "cache invalidated by mutation");
            }
        }
        return response;
    }
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    if Credential::from_headers(request.headers()).is_some() {
        return next.run(request).await;
    }

    let key = cache_key(request_uri(&request));
    if let Some(payload) = cache.get(&key) {
        debug!(key = %key, "cache hit");
        return cached_response(payload);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || !is_json(&response) {
        return response;
    }
    let (parts, body) = response.into_parts();
    let bytes = match buffer_capped(body, MAX_CACHEABLE_BODY).await {
        Ok(Buffered::Complete(b)) => b,
        Ok(Buffered::Oversized(body)) => {
            debug!(key = %key, "response over cacheable size; passing through");
            return Response::from_parts(parts, body);
        }
        Err(e) => {
            warn!(key = %key, error = %e, "failed to buffer response for caching");
            return GateError::internal(anyhow::anyhow!("response body unreadable: {}", e)).into_response();
        }
    };
    cache.put(&key, bytes.clone());
    debug!(key = %key, bytes = bytes.len(), "cache store");
    Response::from_parts(parts, Body::from(bytes))
}
