// SPDX-License-Identifier: EUPL-1.2

pub mod control;
pub mod proxy;

use crate::gateway::AppState;
use axum::Router;

/// The `/__guardian__/*` control routes are merged before the catch-all
/// proxy route so the reserved prefix always shadows it — a request for
/// `/__guardian__/stats` must never be forwarded upstream.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(control::router())
        .merge(proxy::router())
}
