// SPDX-License-Identifier: EUPL-1.2

//! The `/__guardian__/*` control surface: read-only introspection into
//! what the proxy has tokenized, served over the same loopback listener
//! as the proxy itself.

use crate::gateway::AppState;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/__guardian__/stats", get(stats))
        .route("/__guardian__/activity", get(activity))
        .route("/__guardian__/health", get(health))
}

pub async fn root() -> &'static str {
    "privacyguardian is running. See /__guardian__/health for status."
}

#[derive(Serialize)]
struct StatsResponse {
    uptime_secs: u64,
    total_tokens: u64,
    total_uses: u64,
    by_kind: Vec<KindCount>,
    by_provider: Vec<ProviderCount>,
    providers: Vec<&'static str>,
}

#[derive(Serialize)]
struct KindCount {
    kind: String,
    count: u64,
}

#[derive(Serialize)]
struct ProviderCount {
    provider: String,
    count: u64,
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.vault.stats();
    Json(StatsResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        total_tokens: stats.total_tokens,
        total_uses: stats.total_uses,
        by_kind: stats
            .by_kind
            .into_iter()
            .map(|(kind, count)| KindCount {
                kind: kind.code().to_string(),
                count,
            })
            .collect(),
        by_provider: stats
            .by_provider
            .into_iter()
            .map(|(provider, count)| ProviderCount { provider, count })
            .collect(),
        providers: state.providers.all().iter().map(|p| p.name).collect(),
    })
}

#[derive(Serialize)]
struct ActivityEntry {
    token_id: String,
    kind: String,
    provider: String,
    masked_value: String,
    at: String,
}

const ACTIVITY_LIMIT: u32 = 50;

async fn activity(State(state): State<AppState>) -> Json<Vec<ActivityEntry>> {
    let entries = state
        .vault
        .recent_activity(ACTIVITY_LIMIT)
        .into_iter()
        .map(|record| ActivityEntry {
            token_id: record.token_id,
            kind: record.kind.code().to_string(),
            provider: record.provider,
            masked_value: record.masked_value,
            at: record.at.to_rfc3339(),
        })
        .collect();
    Json(entries)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
