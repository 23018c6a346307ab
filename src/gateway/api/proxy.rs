// SPDX-License-Identifier: EUPL-1.2

//! The catch-all reverse-proxy handler: buffer or stream the body
//! through the transformer on the way out and back, forwarding
//! everything else untouched.

use crate::error::GuardianError;
use crate::gateway::AppState;
use crate::providers::ProviderDescriptor;
use crate::transform::streaming::StreamingTransformer;
use crate::transform::Transformer;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::sync::OnceLock;

static CLIENT: OnceLock<Client> = OnceLock::new();

fn get_client() -> &'static Client {
    CLIENT.get_or_init(|| {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build reqwest client for proxy")
    })
}

const TARGET_OVERRIDE_HEADER: &str = "x-target-url";

/// Headers that describe the shape of the hop that just ended, not the
/// content itself — never forwarded in either direction.
const HOP_BY_HOP_REQUEST_HEADERS: &[&str] = &["host", "content-length"];
const HOP_BY_HOP_RESPONSE_HEADERS: &[&str] = &[
    "transfer-encoding",
    "connection",
    "keep-alive",
    "content-encoding",
    "content-length",
];

pub fn router() -> Router<AppState> {
    Router::new().route("/{*path}", any(proxy_handler))
}

struct Target {
    origin: String,
    provider: ProviderDescriptor,
}

/// Resolve where this request should actually go: an explicit override
/// header wins, then a `Host` header that matches a known provider, then
/// the configured default provider.
fn resolve_target(headers: &HeaderMap, state: &AppState) -> Option<Target> {
    if let Some(target_url) = headers
        .get(TARGET_OVERRIDE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        let url = reqwest::Url::parse(target_url).ok()?;
        let host = url.host_str()?.to_string();
        let port_part = url.port().map(|p| format!(":{p}")).unwrap_or_default();
        let origin = format!("{}://{}{}", url.scheme(), host, port_part);
        let provider = state
            .providers
            .resolve(&host)
            .cloned()
            .unwrap_or_else(|| fallback_provider(&host));
        return Some(Target { origin, provider });
    }

    if let Some(host) = headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok()) {
        if let Some(provider) = state.providers.resolve(host) {
            return Some(Target {
                origin: format!("https://{host}"),
                provider: provider.clone(),
            });
        }
    }

    let provider = state.providers.by_name(&state.config.default_provider)?;
    let domain = provider.domains.first()?;
    Some(Target {
        origin: format!("https://{domain}"),
        provider: provider.clone(),
    })
}

fn fallback_provider(host: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        name: "unknown",
        domains: &[],
        message_paths: &[],
        api_key_header: None,
        local: host == "localhost" || host == "127.0.0.1",
    }
}

async fn proxy_handler(State(state): State<AppState>, req: Request) -> Response {
    let headers = req.headers().clone();
    let method = req.method().clone();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let Some(target) = resolve_target(&headers, &state) else {
        return error_response(StatusCode::BAD_GATEWAY, "no target provider could be resolved");
    };

    let body_bytes = match to_bytes(req.into_body(), state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => return error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
    };

    let transformer = Transformer::new(&state.detector, &state.vault);
    let (outbound_body, wants_stream) = transform_outbound(&body_bytes, &target.provider, &transformer);

    let url = format!("{}{}", target.origin, path_and_query);
    let mut upstream_req = get_client().request(method, &url);
    for (name, value) in headers.iter() {
        let lname = name.as_str().to_ascii_lowercase();
        if HOP_BY_HOP_REQUEST_HEADERS.contains(&lname.as_str()) || lname == TARGET_OVERRIDE_HEADER {
            continue;
        }
        upstream_req = upstream_req.header(name, value);
    }
    upstream_req = upstream_req.body(outbound_body);

    let upstream_resp = match upstream_req.send().await {
        Ok(resp) => resp,
        Err(err) => {
            let err = GuardianError::UpstreamUnreachable(err);
            tracing::error!(error = %err, url = %url, "upstream unreachable");
            return error_response(StatusCode::BAD_GATEWAY, "upstream unreachable");
        }
    };

    let status = StatusCode::from_u16(upstream_resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = upstream_resp.headers().clone();

    // Pre-flight: an error status is always buffered and detokenized as a
    // plain response, even for a request that asked to stream, so a
    // provider's JSON error body gets the same treatment as a success body.
    if !status.is_success() || !wants_stream {
        let upstream_bytes = match upstream_resp.bytes().await {
            Ok(bytes) => bytes,
            Err(_) => return error_response(StatusCode::BAD_GATEWAY, "upstream closed before sending a body"),
        };
        return build_buffered_response(status, &response_headers, &upstream_bytes, &transformer);
    }

    build_streaming_response(status, &response_headers, upstream_resp, state)
}

/// Parse the outbound body as JSON and protect it, or fall back to plain
/// text if it does not parse. Returns the transformed body and whether
/// the caller asked for a streamed response.
fn transform_outbound(raw: &[u8], provider: &ProviderDescriptor, transformer: &Transformer) -> (Vec<u8>, bool) {
    match serde_json::from_slice::<Value>(raw) {
        Ok(mut value) => {
            let wants_stream = value.get("stream").and_then(Value::as_bool).unwrap_or(false);
            transformer.protect_request_json(&mut value, provider);
            let bytes = serde_json::to_vec(&value).unwrap_or_else(|_| raw.to_vec());
            (bytes, wants_stream)
        }
        Err(_) => {
            let text = String::from_utf8_lossy(raw);
            let protected = transformer.protect_request_text(&text, provider);
            (protected.into_bytes(), false)
        }
    }
}

fn build_buffered_response(
    status: StatusCode,
    upstream_headers: &reqwest::header::HeaderMap,
    body: &[u8],
    transformer: &Transformer,
) -> Response {
    let detokenized = match serde_json::from_slice::<Value>(body) {
        Ok(mut value) => {
            transformer.unprotect_response_json(&mut value);
            serde_json::to_vec(&value).unwrap_or_else(|_| body.to_vec())
        }
        Err(_) => transformer
            .unprotect_response_text(&String::from_utf8_lossy(body))
            .into_bytes(),
    };

    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        copy_response_headers(headers, upstream_headers);
    }
    response
        .body(Body::from(detokenized))
        .unwrap_or_else(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to build response"))
}

fn build_streaming_response(
    status: StatusCode,
    upstream_headers: &reqwest::header::HeaderMap,
    upstream_resp: reqwest::Response,
    state: AppState,
) -> Response {
    let streamer = std::sync::Arc::new(std::sync::Mutex::new(StreamingTransformer::new()));

    let detector = state.detector.clone();
    let vault = state.vault.clone();
    let body_streamer = streamer.clone();
    let body_stream = upstream_resp.bytes_stream().map(move |chunk| {
        let chunk = chunk.map_err(std::io::Error::other)?;
        let transformer = Transformer::new(&detector, &vault);
        let out = body_streamer
            .lock()
            .expect("stream transformer mutex poisoned")
            .process_chunk(&chunk, &transformer);
        Ok::<_, std::io::Error>(axum::body::Bytes::from(out))
    });

    // Flush whatever partial line the upstream left buffered once its
    // stream ends — otherwise a trailing unterminated line is silently lost.
    let tail_streamer = streamer.clone();
    let tail = futures_util::stream::once(async move {
        let transformer = Transformer::new(&state.detector, &state.vault);
        let out = tail_streamer
            .lock()
            .expect("stream transformer mutex poisoned")
            .finish(&transformer);
        Ok::<_, std::io::Error>(axum::body::Bytes::from(out))
    });

    let combined = body_stream.chain(tail);

    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        copy_response_headers(headers, upstream_headers);
    }
    response
        .body(Body::from_stream(combined))
        .unwrap_or_else(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to build response"))
}

fn copy_response_headers(dest: &mut HeaderMap, src: &reqwest::header::HeaderMap) {
    for (name, value) in src.iter() {
        let lname = name.as_str().to_ascii_lowercase();
        if HOP_BY_HOP_RESPONSE_HEADERS.contains(&lname.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            dest.append(name, value);
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}
