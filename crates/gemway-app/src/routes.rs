//! HTTP fetch boundary.
//!
//! `POST /api/gemini/fetch` with `{"url": "gemini://..."}` performs one
//! Gemini request and answers with JSON. Redirects are reported to the
//! caller, never followed here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use gemway_net::{FetchOutcome, Fetcher, GeminiStatus, QuotaStore, SecurityGate};
use gemway_types::GeminiUrl;

pub const FETCH_PATH: &str = "/api/gemini/fetch";

const MAX_REQUEST_BYTES: usize = 16 * 1024;
const URL_PREFIX: &str = "gemini://";

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SecurityGate>,
    pub quota: Arc<dyn QuotaStore>,
    pub fetcher: Arc<dyn Fetcher>,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageBody {
    success: bool,
    content: String,
    content_type: String,
    url: String,
    status_code: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RedirectBody {
    success: bool,
    redirect: String,
    status_code: u8,
    status_message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureBody {
    success: bool,
    error: String,
    meta: String,
    status_code: u8,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    error: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route(FETCH_PATH, post(fetch_gemini).fallback(method_not_allowed))
        .with_state(state)
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, None, "Method not allowed")
}

async fn fetch_gemini(State(state): State<AppState>, request: Request) -> Response {
    let client = client_id(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );
    if !state.quota.check_quota(&client) {
        return error_response(StatusCode::TOO_MANY_REQUESTS, None, "Too Many Requests");
    }

    let Some((raw, url)) = read_target(request.into_body()).await else {
        return error_response(StatusCode::BAD_REQUEST, None, "Invalid Gemini URL");
    };

    if let Err(e) = state.gate.check_url(&url) {
        return error_response(StatusCode::FORBIDDEN, Some(false), &e.to_string());
    }

    let fetcher = Arc::clone(&state.fetcher);
    let target = url.clone();
    let outcome = tokio::task::spawn_blocking(move || fetcher.fetch(&target))
        .await
        .unwrap_or_else(|e| FetchOutcome::TransportError {
            message: format!("fetch task failed: {e}"),
        });

    log::info!("{client} fetched {url}: {:?}", outcome.status());
    outcome_response(raw, outcome)
}

/// Pull the `url` field out of the JSON body and parse it.
async fn read_target(body: Body) -> Option<(String, GeminiUrl)> {
    let bytes = body::to_bytes(body, MAX_REQUEST_BYTES).await.ok()?;
    let FetchRequest { url } = serde_json::from_slice(&bytes).ok()?;
    if !url.starts_with(URL_PREFIX) {
        return None;
    }
    let parsed = GeminiUrl::parse(&url).ok()?;
    Some((url, parsed))
}

/// First `X-Forwarded-For` entry, else the peer address.
fn client_id(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn outcome_response(url: String, outcome: FetchOutcome) -> Response {
    match outcome {
        FetchOutcome::Success {
            status,
            mime_type,
            body,
        } => Json(PageBody {
            success: true,
            content: body,
            content_type: mime_type,
            url,
            status_code: status,
        })
        .into_response(),
        FetchOutcome::Redirect { status, target } => Json(RedirectBody {
            success: false,
            redirect: target,
            status_code: status,
            status_message: GeminiStatus::from_code(status).description(),
        })
        .into_response(),
        FetchOutcome::Failure { status, message } => Json(FailureBody {
            success: false,
            error: format!("{status} {}", GeminiStatus::from_code(status).description()),
            meta: message,
            status_code: status,
        })
        .into_response(),
        FetchOutcome::TransportError { message } => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(false),
            &format!("Failed to fetch content: {message}"),
        ),
    }
}

fn error_response(status: StatusCode, success: Option<bool>, error: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            success,
            error: error.to_string(),
        }),
    )
        .into_response()
}
