//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Trace + CORS + nosniff header (all routes)
//! 2. Auth validator → 3. Audit logger (protected routes only)

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/me", get(endpoints::directory::me))
        .route("/me/activity", get(endpoints::account::activity))
        .route("/logout", post(endpoints::account::logout))
        .route("/doctors", get(endpoints::directory::list_doctors))
        .route("/doctors/:id", get(endpoints::directory::get_doctor))
        .route("/patients/:id", get(endpoints::directory::get_patient))
        .route("/patients/:id/notes", get(endpoints::directory::patient_notes))
        .route("/patients/:id/referrals", get(endpoints::directory::patient_referrals))
        .route("/notes", post(endpoints::notes::create))
        .route(
            "/notes/:id",
            get(endpoints::notes::detail).put(endpoints::notes::update),
        )
        .route("/notes/:id/share", post(endpoints::notes::share))
        .route("/shared-notes", get(endpoints::shared_notes::inbox))
        .route("/shared-notes/:id/read", post(endpoints::shared_notes::mark_read))
        .route("/referrals", post(endpoints::referrals::create))
        .route("/referrals/sent", get(endpoints::referrals::sent))
        .route("/referrals/received", get(endpoints::referrals::received))
        .route("/referrals/open", get(endpoints::referrals::open))
        .route("/referrals/search", get(endpoints::referrals::search))
        .route("/referrals/stats", get(endpoints::referrals::stats))
        .route("/referrals/:id", get(endpoints::referrals::detail))
        .route("/referrals/:id/accept", post(endpoints::referrals::accept))
        .route("/referrals/:id/decline", post(endpoints::referrals::decline))
        .route("/referrals/:id/complete", post(endpoints::referrals::complete))
        .route("/referrals/:id/cancel", post(endpoints::referrals::cancel))
        .route("/notifications", get(endpoints::notifications::list))
        .route(
            "/notifications/unread-count",
            get(endpoints::notifications::unread_count),
        )
        .route("/notifications/read-all", post(endpoints::notifications::mark_all_read))
        .route("/notifications/:id/read", post(endpoints::notifications::mark_read))
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route("/appointments/:id/cancel", post(endpoints::appointments::cancel))
        .route("/appointments/:id/complete", post(endpoints::appointments::complete))
        .route("/relationships", get(endpoints::relationships::list))
        .route(
            "/prescriptions",
            get(endpoints::prescriptions::list).post(endpoints::prescriptions::create),
        )
        .route("/prescriptions/:id/dispense", post(endpoints::prescriptions::dispense))
        .route("/prescriptions/:id/cancel", post(endpoints::prescriptions::cancel))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/register/doctor", post(endpoints::registration::doctor))
        .route("/register/patient", post(endpoints::registration::patient))
        .route("/register/pharmacy", post(endpoints::registration::pharmacy))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", protected.merge(unprotected))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Router over a temp-file database. Keep the guard alive for the test.
    fn test_app() -> (Router, Arc<CoreState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(tmp.path().join("carelink.db")));
        core.initialize().unwrap();
        (api_router(core.clone()), core, tmp)
    }

    fn make_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> Value {
        let bytes = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(make_request(method, uri, token, body))
            .await
            .unwrap();
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Registers through the API; returns (id, token).
    async fn register(app: &Router, kind: &str, body: Value) -> (String, String) {
        let uri = format!("/api/register/{kind}");
        let (status, json) = call(app, "POST", &uri, None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        (
            json["record"]["id"].as_str().unwrap().to_string(),
            json["token"].as_str().unwrap().to_string(),
        )
    }

    async fn register_doctor(app: &Router, email: &str, specialty: &str) -> (String, String) {
        register(
            app,
            "doctor",
            json!({"name": format!("Dr. {email}"), "email": email, "specialty": specialty}),
        )
        .await
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _core, _tmp) = test_app();
        let (status, json) = call(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let (app, _core, _tmp) = test_app();
        let (status, json) = call(&app, "GET", "/api/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = call(&app, "GET", "/api/me", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_role_tagged_profile() {
        let (app, _core, _tmp) = test_app();
        let (id, token) = register_doctor(&app, "gp@clinic.test", "General Practice").await;

        let response = app
            .clone()
            .oneshot(make_request("GET", "/api/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        assert_eq!(response.headers().get("X-Content-Type-Options").unwrap(), "nosniff");
        let json = response_json(response).await;
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["id"], id);
    }

    #[tokio::test]
    async fn logout_revokes_token_and_activity_is_recorded() {
        let (app, _core, _tmp) = test_app();
        let (_, token) = register(
            &app,
            "pharmacy",
            json!({"name": "Corner Pharmacy"}),
        )
        .await;

        let (status, _) = call(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, activity) = call(&app, "GET", "/api/me/activity", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(activity[0]["action"], "GET /api/me");
        assert_eq!(activity[0]["entity"], "status:200");

        let (status, body) = call(&app, "POST", "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["revoked"], 1);

        let (status, _) = call(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (app, _core, _tmp) = test_app();
        register_doctor(&app, "gp@clinic.test", "General Practice").await;
        let (status, json) = call(
            &app,
            "POST",
            "/api/register/doctor",
            None,
            Some(json!({"name": "Other", "email": "GP@clinic.test", "specialty": "X"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn malformed_id_returns_400() {
        let (app, _core, _tmp) = test_app();
        let (_, token) = register_doctor(&app, "gp@clinic.test", "General Practice").await;
        let uri = "/api/referrals/not-a-uuid";
        let (status, json) = call(&app, "GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], "Invalid ID format");
    }

    #[tokio::test]
    async fn role_guard_rejects_patient_on_doctor_route() {
        let (app, _core, _tmp) = test_app();
        let (_, token) = register(
            &app,
            "patient",
            json!({"name": "Pat", "email": "pat@example.test"}),
        )
        .await;
        let (status, json) = call(&app, "GET", "/api/referrals/sent", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn referral_flow_end_to_end() {
        let (app, core, _tmp) = test_app();
        let (gp_id, gp) = register_doctor(&app, "gp@clinic.test", "General Practice").await;
        let (cardio_id, cardio) = register_doctor(&app, "heart@clinic.test", "Cardiology").await;
        let (patient_id, patient) = register(
            &app,
            "patient",
            json!({"name": "Pat Doe", "email": "pat@example.test", "date_of_birth": "1980-05-17"}),
        )
        .await;

        // Scheduling links the GP to the patient so a note can be written.
        let when = (chrono::Utc::now() + chrono::Duration::days(1))
            .naive_utc()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        let (status, _) = call(
            &app,
            "POST",
            "/api/appointments",
            Some(&gp),
            Some(json!({"doctor_id": gp_id, "patient_id": patient_id, "scheduled_at": when})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, note) = call(
            &app,
            "POST",
            "/api/notes",
            Some(&gp),
            Some(json!({
                "patient_id": patient_id,
                "title": "Chest pain",
                "subjective": "Tightness on stairs",
                "plan": "Refer to cardiology"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{note}");
        let note_id = note["id"].as_str().unwrap().to_string();

        let (status, referral) = call(
            &app,
            "POST",
            "/api/referrals",
            Some(&gp),
            Some(json!({
                "patient_id": patient_id,
                "receiving_doctor_id": cardio_id,
                "clinical_note_id": note_id,
                "specialty": "Cardiology",
                "urgency": "urgent",
                "reason": "Exertional chest pain"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{referral}");
        assert_eq!(referral["status"], "pending");
        let referral_id = referral["id"].as_str().unwrap().to_string();

        // Receiver sees it in their inbox with urgent priority mapping.
        let (_, unread) =
            call(&app, "GET", "/api/notifications/unread-count", Some(&cardio), None).await;
        assert_eq!(unread["unread"], 1);

        // Cardiologist cannot read the note before accepting.
        let (status, _) =
            call(&app, "GET", &format!("/api/notes/{note_id}"), Some(&cardio), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, accepted) = call(
            &app,
            "POST",
            &format!("/api/referrals/{referral_id}/accept"),
            Some(&cardio),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{accepted}");
        assert_eq!(accepted["status"], "accepted");

        let (_, shared) = call(&app, "GET", "/api/shared-notes", Some(&cardio), None).await;
        assert_eq!(shared.as_array().unwrap().len(), 1);
        assert_eq!(shared[0]["share_type"], "referral");
        assert_eq!(shared[0]["note"]["id"], note_id.as_str());

        let (status, _) =
            call(&app, "GET", &format!("/api/notes/{note_id}"), Some(&cardio), None).await;
        assert_eq!(status, StatusCode::OK);

        // Declining an accepted referral is rejected with the status message.
        let (status, err) = call(
            &app,
            "POST",
            &format!("/api/referrals/{referral_id}/decline"),
            Some(&cardio),
            Some(json!({"reason": "changed my mind"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["message"], "Referral is not in pending status");

        let (status, done) = call(
            &app,
            "POST",
            &format!("/api/referrals/{referral_id}/complete"),
            Some(&cardio),
            Some(json!({"notes": "Stress echo normal"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["completion_notes"], "Stress echo normal");

        let (status, err) = call(
            &app,
            "POST",
            &format!("/api/referrals/{referral_id}/cancel"),
            Some(&gp),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["message"], "Completed referrals cannot be cancelled");

        let (_, details) =
            call(&app, "GET", &format!("/api/referrals/{referral_id}"), Some(&patient), None).await;
        assert_eq!(details["status"], "completed");
        assert_eq!(details["receiving_doctor"]["id"], cardio_id.as_str());
        assert_eq!(details["clinical_note"]["id"], note_id.as_str());

        let (_, stats) = call(&app, "GET", "/api/referrals/stats", Some(&gp), None).await;
        assert_eq!(stats["sent"]["completed"], 1);
        assert_eq!(stats["sent"]["total"], 1);

        let (_, inbox) = call(&app, "GET", "/api/notifications", Some(&patient), None).await;
        let kinds: Vec<&str> = inbox
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["notification_type"].as_str())
            .collect();
        assert!(kinds.contains(&"referral_accepted"));
        assert!(kinds.contains(&"referral_completed"));

        // Audit entries were buffered for authenticated calls.
        assert!(core
            .audit_entries()
            .iter()
            .any(|e| e.action == format!("POST /api/referrals/{referral_id}/accept")));
    }

    #[tokio::test]
    async fn open_referral_claimed_by_specialist() {
        let (app, _core, _tmp) = test_app();
        let (_, gp) = register_doctor(&app, "gp@clinic.test", "General Practice").await;
        let (_, derm) = register_doctor(&app, "skin@clinic.test", "Dermatology").await;
        let (cardio_id, cardio) = register_doctor(&app, "heart@clinic.test", "Cardiology").await;
        let (patient_id, _) = register(
            &app,
            "patient",
            json!({"name": "Pat Doe", "email": "pat@example.test"}),
        )
        .await;

        let (status, referral) = call(
            &app,
            "POST",
            "/api/referrals",
            Some(&gp),
            Some(json!({"patient_id": patient_id, "specialty": "cardiology", "reason": "Murmur"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let referral_id = referral["id"].as_str().unwrap().to_string();

        let (_, open) = call(&app, "GET", "/api/referrals/open", Some(&cardio), None).await;
        assert_eq!(open.as_array().unwrap().len(), 1);
        let (_, open) = call(&app, "GET", "/api/referrals/open", Some(&derm), None).await;
        assert!(open.as_array().unwrap().is_empty());

        // Another specialty's open referrals stay hidden, notes included.
        let uri = "/api/referrals/open?specialty=Cardiology";
        let (status, err) = call(&app, "GET", uri, Some(&derm), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["error"]["code"], "FORBIDDEN");
        let (status, open) = call(&app, "GET", uri, Some(&cardio), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(open.as_array().unwrap().len(), 1);
        let (_, found) = call(&app, "GET", "/api/referrals/search", Some(&derm), None).await;
        assert!(found.as_array().unwrap().is_empty());

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/referrals/{referral_id}/accept"),
            Some(&derm),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, accepted) = call(
            &app,
            "POST",
            &format!("/api/referrals/{referral_id}/accept"),
            Some(&cardio),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["receiving_doctor_id"], cardio_id.as_str());

        let (_, received) = call(&app, "GET", "/api/referrals/received", Some(&cardio), None).await;
        assert_eq!(received.as_array().unwrap().len(), 1);

        let (_, panel) = call(&app, "GET", "/api/relationships", Some(&cardio), None).await;
        assert_eq!(panel[0]["relationship"]["source"], "referral");
    }

    #[tokio::test]
    async fn prescription_flow() {
        let (app, _core, _tmp) = test_app();
        let (gp_id, gp) = register_doctor(&app, "gp@clinic.test", "General Practice").await;
        let (patient_id, patient) = register(
            &app,
            "patient",
            json!({"name": "Pat Doe", "email": "pat@example.test"}),
        )
        .await;
        let (pharmacy_id, pharmacy) = register(
            &app,
            "pharmacy",
            json!({"name": "Corner Pharmacy", "address": "1 Main St"}),
        )
        .await;

        let rx_body = json!({
            "patient_id": patient_id,
            "pharmacy_id": pharmacy_id,
            "medication": "Amoxicillin",
            "dosage": "500 mg",
            "frequency": "Three times daily",
            "quantity": 21
        });
        let (status, _) =
            call(&app, "POST", "/api/prescriptions", Some(&gp), Some(rx_body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Patient books with the GP, creating the relationship.
        let when = (chrono::Utc::now() + chrono::Duration::hours(2))
            .naive_utc()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        let (status, _) = call(
            &app,
            "POST",
            "/api/appointments",
            Some(&patient),
            Some(json!({
                "doctor_id": gp_id,
                "patient_id": patient_id,
                "scheduled_at": when,
                "duration_minutes": 15
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, rx) =
            call(&app, "POST", "/api/prescriptions", Some(&gp), Some(rx_body)).await;
        assert_eq!(status, StatusCode::CREATED, "{rx}");
        let rx_id = rx["id"].as_str().unwrap().to_string();

        let uri = "/api/prescriptions?status=active";
        let (_, queue) = call(&app, "GET", uri, Some(&pharmacy), None).await;
        assert_eq!(queue.as_array().unwrap().len(), 1);

        let (status, dispensed) = call(
            &app,
            "POST",
            &format!("/api/prescriptions/{rx_id}/dispense"),
            Some(&pharmacy),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dispensed["status"], "dispensed");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/prescriptions/{rx_id}/cancel"),
            Some(&gp),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, read_all) =
            call(&app, "POST", "/api/notifications/read-all", Some(&patient), None).await;
        assert_eq!(read_all["updated"], 2);
    }
}
