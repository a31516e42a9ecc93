//! HTTP server for the campaign coordinator.
//!
//! This serves the outward-facing surface of a running campaign:
//! - Redirect links printed on every artifact, with hit tracking and the
//!   one-off questionnaire
//! - The fax provider's delivery callback
//! - Side-effect-free message previews
//! - Health checks for liveness probes
//!
//! # Endpoints
//!
//! - `GET /{code}/{practice_id}` - count a hit, questionnaire or redirect
//! - `POST /{code}/{practice_id}` - questionnaire answer submission
//! - `POST /fax_receipt` - fax provider delivery callback
//! - `GET /msg/{intervention_id}` - message preview
//! - `GET /health` - returns 200 if the server is running

use std::pin::Pin;
use std::sync::Arc;

pub mod fax_receipt;
pub mod health;
pub mod message;
pub mod redirect;

pub use fax_receipt::fax_receipt_handler;
pub use health::health_handler;
pub use message::message_handler;
pub use redirect::{hit_handler, survey_handler};

use crate::artifacts::MessageSource;
use crate::config::CampaignConfig;
use crate::store::{SharedStore, save_snapshot_atomic};

/// Object-safe view of a [`MessageSource`], so the server can hold one
/// without being generic over the implementation.
pub trait PreviewSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<String, Box<dyn std::error::Error + Send + Sync>>>
                + Send
                + 'a,
        >,
    >;
}

impl<M> PreviewSource for M
where
    M: MessageSource + Send + Sync,
{
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<String, Box<dyn std::error::Error + Send + Sync>>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(async move {
            MessageSource::fetch(self, url)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
    }
}

/// Shared application state, passed to all handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: SharedStore,
    config: CampaignConfig,
    preview: Arc<dyn PreviewSource>,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        config: CampaignConfig,
        preview: Arc<dyn PreviewSource>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                store,
                config,
                preview,
            }),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.inner.config
    }

    pub fn preview_source(&self) -> &dyn PreviewSource {
        self.inner.preview.as_ref()
    }

    /// Persists the ledger after a mutating request. Persistence failure
    /// is logged, not surfaced: the in-memory state is already updated
    /// and the next successful save will carry it.
    pub(crate) async fn persist(&self) {
        let store = self.inner.store.read().await;
        if let Err(e) = save_snapshot_atomic(&self.inner.config.snapshot_path, &store) {
            tracing::warn!(
                path = %self.inner.config.snapshot_path.display(),
                error = %e,
                "failed to persist ledger snapshot"
            );
        }
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/fax_receipt", post(fax_receipt_handler))
        .route("/msg/{intervention_id}", get(message_handler))
        .route("/health", get(health_handler))
        .route("/{code}/{practice_id}", get(hit_handler).post(survey_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::store::{NewIntervention, Store, shared};
    use crate::types::{
        Arm, Channel, Contact, InterventionKey, MeasureId, PracticeId, Receipt, SurveyResponse,
        Wave,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("templating endpoint down")]
    struct SourceDown;

    struct FakeSource {
        available: bool,
    }

    impl MessageSource for FakeSource {
        type Error = SourceDown;

        async fn fetch(&self, url: &str) -> Result<String, SourceDown> {
            if !self.available {
                return Err(SourceDown);
            }
            Ok(format!(
                "<html><style>p {{ color: red }}</style><p>message at {url}</p></html>"
            ))
        }
    }

    fn key(channel: Channel, practice: &str) -> InterventionKey {
        InterventionKey::new(channel, Wave::ONE, PracticeId::new(practice))
    }

    fn seeded_store() -> Store {
        let mut store = Store::new();
        store.replace_contacts(vec![
            Contact::new(PracticeId::new("A83050"), "SALTSCAR")
                .with_email("a@nhs.net")
                .with_fax("01642 260897"),
        ]);
        let batch = Channel::ALL
            .into_iter()
            .map(|channel| NewIntervention {
                key: key(channel, "A83050"),
                arm: Arm::ContentRich,
                created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                measure_id: MeasureId::new("nimodipine"),
            })
            .collect();
        store.insert_interventions(batch).unwrap();
        store
    }

    fn test_app(store: Store) -> (axum::Router, SharedStore, tempfile::TempDir) {
        test_app_with_source(store, FakeSource { available: true })
    }

    fn test_app_with_source(
        store: Store,
        source: FakeSource,
    ) -> (axum::Router, SharedStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let shared_store = shared(store);
        let config = CampaignConfig::default()
            .with_campaign("nimodipine")
            .with_snapshot_path(dir.path().join("ledger.json"));
        let state = AppState::new(shared_store.clone(), config, Arc::new(source));
        (build_router(state), shared_store, dir)
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|e| panic!("request build failed: {e}"))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // ─── Health ───

    #[tokio::test]
    async fn health_returns_200() {
        let (app, _store, _dir) = test_app(seeded_store());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    // ─── Redirect links ───

    #[tokio::test]
    async fn first_hit_serves_the_questionnaire() {
        let (app, store, _dir) = test_app(seeded_store());
        let request = Request::builder()
            .uri("/e/A83050")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("survey_response"));
        assert_eq!(
            store.read().await.total_hits(&PracticeId::new("A83050")),
            1
        );
    }

    #[tokio::test]
    async fn second_hit_redirects_to_the_analytics_page() {
        let (app, store, _dir) = test_app(seeded_store());
        store
            .write()
            .await
            .record_hit(&key(Channel::Fax, "A83050"))
            .unwrap();

        let request = Request::builder()
            .uri("/e/A83050")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.contains("/practice/A83050/"));
        assert!(location.contains("utm_medium=email"));
    }

    #[tokio::test]
    async fn unknown_code_is_404() {
        let (app, _store, _dir) = test_app(seeded_store());
        let request = Request::builder()
            .uri("/x/A83050")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_practice_is_404_and_counts_nothing() {
        let (app, store, _dir) = test_app(seeded_store());
        let request = Request::builder()
            .uri("/e/Z99999")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            store.read().await.total_hits(&PracticeId::new("Z99999")),
            0
        );
    }

    // ─── Questionnaire submission ───

    #[tokio::test]
    async fn survey_answer_is_stored_and_redirects() {
        let (app, store, _dir) = test_app(seeded_store());
        let request = form_post("/e/A83050", "survey_response=Yes");
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let store = store.read().await;
        assert_eq!(
            store.contact(&PracticeId::new("A83050")).unwrap().survey_response,
            SurveyResponse::Yes
        );
        // Submitting the form is not a click on the link
        assert_eq!(store.total_hits(&PracticeId::new("A83050")), 0);
    }

    // ─── Fax callbacks ───

    #[tokio::test]
    async fn fax_callback_confirms_delivery() {
        let (app, store, dir) = test_app(seeded_store());
        let request = form_post(
            "/fax_receipt",
            "DestinationFax=00441642260897&Subject=about+your+prescribing&Status=0",
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            store
                .read()
                .await
                .intervention(&key(Channel::Fax, "A83050"))
                .unwrap()
                .receipt,
            Receipt::Confirmed
        );
        // A confirmed receipt must survive a restart
        assert!(dir.path().join("ledger.json").exists());
    }

    #[tokio::test]
    async fn fax_callback_for_unknown_machine_is_404() {
        let (app, _store, _dir) = test_app(seeded_store());
        let request = form_post(
            "/fax_receipt",
            "DestinationFax=00449999999999&Subject=&Status=0",
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ─── Message preview ───

    #[tokio::test]
    async fn preview_returns_inlined_html_without_side_effects() {
        let (app, store, _dir) = test_app(seeded_store());
        let id = store
            .read()
            .await
            .intervention(&key(Channel::Email, "A83050"))
            .unwrap()
            .id;

        let request = Request::builder()
            .uri(format!("/msg/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("style="));

        let store = store.read().await;
        let intervention = store.intervention(&key(Channel::Email, "A83050")).unwrap();
        assert!(!intervention.generated);
        assert_eq!(intervention.hits, 0);
    }

    #[tokio::test]
    async fn preview_of_unknown_id_is_404() {
        let (app, _store, _dir) = test_app(seeded_store());
        let request = Request::builder()
            .uri("/msg/999999")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preview_with_source_down_is_502() {
        let (app, store, _dir) = test_app_with_source(seeded_store(), FakeSource { available: false });
        let id = store
            .read()
            .await
            .intervention(&key(Channel::Email, "A83050"))
            .unwrap()
            .id;
        let request = Request::builder()
            .uri(format!("/msg/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
