//! The public intervention links: hit tracking, the one-off
//! questionnaire, and the survey submission that comes back from it.

use axum::Form;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use super::AppState;
use crate::tracker::{HitOutcome, SurveyOutcome, record_hit, record_survey};
use crate::types::{ChannelCode, PracticeId, SurveyResponse};

/// The interstitial shown on a contact's very first click. Posts the
/// answer back to the path it was served from.
const QUESTIONNAIRE_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><title>One quick question</title></head>
  <body>
    <h1>Did the message we sent you contain information you didn't already know?</h1>
    <form method="post">
      <button name="survey_response" value="yes">Yes</button>
      <button name="survey_response" value="no">No</button>
    </form>
  </body>
</html>
"#;

#[derive(Debug, Deserialize)]
pub struct SurveyForm {
    survey_response: String,
}

fn parse_path(code: &str, practice_id: &str) -> Option<(ChannelCode, PracticeId)> {
    let code = ChannelCode::from_str(code).ok()?;
    Some((code, PracticeId::new(practice_id)))
}

/// GET on a public link: count the hit, then questionnaire or redirect.
pub async fn hit_handler(
    State(state): State<AppState>,
    Path((code, practice_id)): Path<(String, String)>,
) -> Response {
    let Some((code, practice_id)) = parse_path(&code, &practice_id) else {
        debug!(code, "unparseable channel code");
        return StatusCode::NOT_FOUND.into_response();
    };

    let outcome = {
        let mut store = state.store().write().await;
        record_hit(&mut store, state.config(), code, &practice_id)
    };
    match outcome {
        HitOutcome::Questionnaire => {
            state.persist().await;
            Html(QUESTIONNAIRE_HTML).into_response()
        }
        HitOutcome::Redirect(url) => {
            state.persist().await;
            Redirect::to(&url).into_response()
        }
        HitOutcome::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST from the questionnaire: store the answer, redirect onwards.
pub async fn survey_handler(
    State(state): State<AppState>,
    Path((code, practice_id)): Path<(String, String)>,
    Form(form): Form<SurveyForm>,
) -> Response {
    let Some((code, practice_id)) = parse_path(&code, &practice_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let response = match form.survey_response.to_lowercase().as_str() {
        "yes" => SurveyResponse::Yes,
        "no" => SurveyResponse::No,
        // Anything else leaves the stored answer alone but still sends
        // the visitor onwards.
        _ => SurveyResponse::Unanswered,
    };

    let outcome = {
        let mut store = state.store().write().await;
        record_survey(&mut store, state.config(), code, &practice_id, response)
    };
    match outcome {
        SurveyOutcome::Redirect(url) => {
            state.persist().await;
            Redirect::to(&url).into_response()
        }
        SurveyOutcome::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}
