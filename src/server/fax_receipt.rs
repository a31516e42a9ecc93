//! Fax provider callback endpoint.
//!
//! The provider POSTs a form-encoded delivery confirmation after each
//! attempt. Any callback that matches at least one intervention gets a
//! plain 200 `OK`; a destination we have never faxed gets a 404 so the
//! provider's logs show the mismatch.

use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;

use super::AppState;
use crate::receipts::{FaxCallback, FaxReceiptOutcome, apply_fax_callback};

pub async fn fax_receipt_handler(
    State(state): State<AppState>,
    Form(callback): Form<FaxCallback>,
) -> (StatusCode, &'static str) {
    let outcome = {
        let mut store = state.store().write().await;
        apply_fax_callback(&mut store, &callback)
    };
    match outcome {
        FaxReceiptOutcome::Updated { .. } => {
            state.persist().await;
            (StatusCode::OK, "OK")
        }
        FaxReceiptOutcome::Provisional { .. } => (StatusCode::OK, "OK"),
        FaxReceiptOutcome::NotFound => (StatusCode::NOT_FOUND, "no matching intervention"),
    }
}
