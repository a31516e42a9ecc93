//! Side-effect-free message preview.
//!
//! `GET /msg/{id}` shows what a given intervention's message looks like:
//! the HTML is fetched from the templating endpoint and inlined exactly
//! as the generator would, but no lifecycle flag moves and nothing is
//! written to disk.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::warn;

use super::AppState;
use crate::artifacts::inline_email_css;
use crate::types::InterventionId;

pub async fn message_handler(
    State(state): State<AppState>,
    Path(intervention_id): Path<u64>,
) -> Response {
    let url = {
        let store = state.store().read().await;
        match store.intervention_by_id(InterventionId(intervention_id)) {
            Some(intervention) => state.config().message_url(intervention.id),
            None => return StatusCode::NOT_FOUND.into_response(),
        }
    };

    let html = match state.preview_source().fetch(&url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(%url, error = %e, "preview fetch failed");
            return (StatusCode::BAD_GATEWAY, "message source unavailable").into_response();
        }
    };
    match inline_email_css(&html) {
        Ok(inlined) => Html(inlined).into_response(),
        Err(e) => {
            warn!(intervention_id, error = %e, "preview inlining failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "could not render message").into_response()
        }
    }
}
