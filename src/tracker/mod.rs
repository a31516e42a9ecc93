//! Click tracking and the one-off questionnaire gate.
//!
//! Every artifact carries a short public link (`/e/A83050`, `/f2/B11111`).
//! A GET on that link is a hit: the record's counter goes up and the
//! visitor is redirected to their practice's analytics page. The very
//! first hit across all of a contact's interventions is intercepted with
//! a one-question survey; its answer comes back as a POST on the same
//! path and is stored on the contact, after which they too are
//! redirected.

use tracing::{info, warn};

use crate::config::CampaignConfig;
use crate::store::Store;
use crate::types::{ChannelCode, InterventionKey, PracticeId, SurveyResponse};

/// Outcome of a GET on a public intervention path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitOutcome {
    /// First-ever touch from this contact: show the questionnaire.
    Questionnaire,
    /// Send the visitor on to their analytics page.
    Redirect(String),
    /// No such intervention.
    NotFound,
}

/// Outcome of a survey POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyOutcome {
    Redirect(String),
    NotFound,
}

fn resolve(code: ChannelCode, practice_id: &PracticeId) -> InterventionKey {
    InterventionKey::new(code.channel, code.wave, practice_id.clone())
}

/// Records a hit on a public link.
///
/// The questionnaire shows when the contact's hit total across every
/// intervention is exactly one, so each recipient sees it at most once
/// no matter how many links they were sent.
pub fn record_hit(
    store: &mut Store,
    config: &CampaignConfig,
    code: ChannelCode,
    practice_id: &PracticeId,
) -> HitOutcome {
    let key = resolve(code, practice_id);
    let Ok(hits) = store.record_hit(&key) else {
        warn!(%key, "hit on unknown intervention path");
        return HitOutcome::NotFound;
    };
    info!(intervention = %key, hits, "recorded hit");

    if store.total_hits(practice_id) == 1 {
        info!(practice = %practice_id, "first touch, showing questionnaire");
        return HitOutcome::Questionnaire;
    }

    // Resolved above, still present.
    match store.intervention(&key) {
        Some(intervention) => HitOutcome::Redirect(
            intervention.target_url(&config.analytics_host, &config.campaign),
        ),
        None => HitOutcome::NotFound,
    }
}

/// Records a questionnaire answer. Never counts as a hit.
pub fn record_survey(
    store: &mut Store,
    config: &CampaignConfig,
    code: ChannelCode,
    practice_id: &PracticeId,
    response: SurveyResponse,
) -> SurveyOutcome {
    let key = resolve(code, practice_id);
    let Some(target) = store
        .intervention(&key)
        .map(|i| i.target_url(&config.analytics_host, &config.campaign))
    else {
        warn!(%key, "survey for unknown intervention path");
        return SurveyOutcome::NotFound;
    };

    // A submission with no usable answer still redirects onwards.
    if response != SurveyResponse::Unanswered {
        if store.set_survey_response(practice_id, response).is_err() {
            // Intervention without a contact record; the answer has
            // nowhere to live but the redirect still works.
            warn!(practice = %practice_id, "survey answer for a contact we do not have");
        } else {
            info!(practice = %practice_id, ?response, "recorded survey answer");
        }
    }
    SurveyOutcome::Redirect(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewIntervention;
    use crate::types::{Arm, Channel, Contact, MeasureId, Wave};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn config() -> CampaignConfig {
        CampaignConfig::default()
            .with_campaign("nimodipine")
    }

    fn seeded() -> Store {
        let mut store = Store::new();
        store.replace_contacts(vec![
            Contact::new(PracticeId::new("A83050"), "SALTSCAR").with_email("a@nhs.net"),
        ]);
        let batch = Channel::ALL
            .into_iter()
            .map(|channel| NewIntervention {
                key: InterventionKey::new(channel, Wave::ONE, PracticeId::new("A83050")),
                arm: Arm::ContentRich,
                created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                measure_id: MeasureId::new("nimodipine"),
            })
            .collect();
        store.insert_interventions(batch).unwrap();
        store
    }

    fn code(s: &str) -> ChannelCode {
        ChannelCode::from_str(s).unwrap()
    }

    fn practice() -> PracticeId {
        PracticeId::new("A83050")
    }

    #[test]
    fn first_hit_shows_the_questionnaire() {
        let mut store = seeded();
        let outcome = record_hit(&mut store, &config(), code("e"), &practice());
        assert_eq!(outcome, HitOutcome::Questionnaire);
        assert_eq!(store.total_hits(&practice()), 1);
    }

    #[test]
    fn later_hits_redirect() {
        let mut store = seeded();
        record_hit(&mut store, &config(), code("e"), &practice());
        let outcome = record_hit(&mut store, &config(), code("e"), &practice());
        let HitOutcome::Redirect(url) = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        assert!(url.contains("/practice/A83050/"));
        assert!(url.contains("utm_medium=email"));
    }

    #[test]
    fn questionnaire_shows_once_per_contact_not_per_channel() {
        let mut store = seeded();
        // First touch arrives via the emailed link
        assert_eq!(
            record_hit(&mut store, &config(), code("e"), &practice()),
            HitOutcome::Questionnaire
        );
        // A later visit via the faxed link must not re-ask
        let outcome = record_hit(&mut store, &config(), code("f"), &practice());
        assert!(matches!(outcome, HitOutcome::Redirect(_)));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let mut store = seeded();
        let outcome = record_hit(&mut store, &config(), code("e2"), &practice());
        assert_eq!(outcome, HitOutcome::NotFound);
        assert_eq!(store.total_hits(&practice()), 0);
    }

    #[test]
    fn survey_answer_is_stored_without_counting_a_hit() {
        let mut store = seeded();
        let outcome = record_survey(
            &mut store,
            &config(),
            code("e"),
            &practice(),
            SurveyResponse::Yes,
        );
        assert!(matches!(outcome, SurveyOutcome::Redirect(_)));
        assert_eq!(store.total_hits(&practice()), 0);
        assert_eq!(
            store.contact(&practice()).unwrap().survey_response,
            SurveyResponse::Yes
        );
    }

    #[test]
    fn survey_for_unknown_intervention_is_not_found() {
        let mut store = seeded();
        let outcome = record_survey(
            &mut store,
            &config(),
            code("p3"),
            &practice(),
            SurveyResponse::No,
        );
        assert_eq!(outcome, SurveyOutcome::NotFound);
        assert_eq!(
            store.contact(&practice()).unwrap().survey_response,
            SurveyResponse::Unanswered
        );
    }
}
