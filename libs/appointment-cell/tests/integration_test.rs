use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

// 2024-01-01 was a Monday; the standard test doctor works Mon-Fri, 9-5.
const MONDAY_10AM: &str = "2024-01-01T10:00:00Z";
const MONDAY_5PM: &str = "2024-01-01T17:00:00Z";
const SATURDAY_10AM: &str = "2024-01-06T10:00:00Z";

fn test_config(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_store_url(&mock_server.uri()).to_app_config()
}

fn create_test_app(config: AppConfig) -> Router {
    appointment_routes(Arc::new(config))
}

async fn mock_patient_profile(mock_server: &MockServer, user: &TestUser, patient_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::patient_row(patient_id, user.id, 1)
        ])))
        .mount(mock_server)
        .await;
}

async fn mock_doctor_profile(mock_server: &MockServer, doctor_id: Uuid, availability: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(doctor_id, Uuid::new_v4(), "Cardiology", availability)
        ])))
        .mount(mock_server)
        .await;
}

async fn mock_doctor_owned_by(mock_server: &MockServer, user: &TestUser, doctor_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(doctor_id, user.id, "Cardiology", "Mon-Fri, 9 AM - 5 PM")
        ])))
        .mount(mock_server)
        .await;
}

async fn mock_appointment(
    mock_server: &MockServer,
    appointment_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    status: &str,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(appointment_id, patient_id, doctor_id, MONDAY_10AM, status)
        ])))
        .mount(mock_server)
        .await;
}

fn authed_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json");

    match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ==============================================================================
// CREATE
// ==============================================================================

#[tokio::test]
async fn book_appointment_inside_availability_succeeds() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, patient_id).await;
    mock_doctor_profile(&mock_server, doctor_id, "Mon-Fri, 9 AM - 5 PM").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::appointment_row(appointment_id, patient_id, doctor_id, MONDAY_10AM, "Scheduled")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            "/",
            &token,
            Some(json!({
                "doctor_id": doctor_id,
                "appointment_date": MONDAY_10AM,
                "notes": "First visit"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "Scheduled");
}

#[tokio::test]
async fn slot_at_closing_hour_books_nothing() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, Uuid::new_v4()).await;
    mock_doctor_profile(&mock_server, doctor_id, "Mon-Fri, 9 AM - 5 PM").await;

    // An out-of-hours slot must never reach the store.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            "/",
            &token,
            Some(json!({
                "doctor_id": doctor_id,
                "appointment_date": MONDAY_5PM,
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("working hours"));
}

#[tokio::test]
async fn slot_on_weekend_reports_the_day_not_the_time() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, Uuid::new_v4()).await;
    mock_doctor_profile(&mock_server, doctor_id, "Mon-Fri, 9 AM - 5 PM").await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            "/",
            &token,
            Some(json!({
                "doctor_id": doctor_id,
                "appointment_date": SATURDAY_10AM,
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("working days"));
    assert!(!message.contains("working hours"));
}

#[tokio::test]
async fn unparseable_doctor_schedule_is_its_own_error() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, Uuid::new_v4()).await;
    mock_doctor_profile(&mock_server, doctor_id, "whenever suits").await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            "/",
            &token,
            Some(json!({
                "doctor_id": doctor_id,
                "appointment_date": MONDAY_10AM,
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Unparseable availability rule"));
}

#[tokio::test]
async fn doctors_cannot_book_appointments() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            "/",
            &token,
            Some(json!({
                "doctor_id": Uuid::new_v4(),
                "appointment_date": MONDAY_10AM,
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn exclusive_slot_policy_rejects_identical_booking() {
    let mock_server = MockServer::start().await;
    let mut config = test_config(&mock_server);
    config.exclusive_slots = true;

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, Uuid::new_v4()).await;
    mock_doctor_profile(&mock_server, doctor_id, "Mon-Fri, 9 AM - 5 PM").await;

    // Someone already holds the identical slot.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("appointment_date", format!("eq.{}", MONDAY_10AM)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(Uuid::new_v4(), Uuid::new_v4(), doctor_id, MONDAY_10AM, "Scheduled")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            "/",
            &token,
            Some(json!({
                "doctor_id": doctor_id,
                "appointment_date": MONDAY_10AM,
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ==============================================================================
// RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn reschedule_by_non_owner_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("other@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    // The caller owns a different patient profile than the appointment.
    mock_patient_profile(&mock_server, &user, Uuid::new_v4()).await;
    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), doctor_id, "Scheduled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/{}/reschedule", appointment_id),
            &token,
            Some(json!({ "appointment_date": MONDAY_10AM })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reschedule_ignores_status_but_revalidates_live_availability() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, patient_id).await;
    mock_doctor_profile(&mock_server, doctor_id, "Mon-Fri, 9 AM - 5 PM").await;
    // Completed appointments may still be moved; the reference workflow
    // never gated reschedule on status.
    mock_appointment(&mock_server, appointment_id, patient_id, doctor_id, "Completed").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(appointment_id, patient_id, doctor_id, MONDAY_10AM, "Completed")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/{}/reschedule", appointment_id),
            &token,
            Some(json!({ "appointment_date": MONDAY_10AM })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reschedule_to_an_unavailable_slot_is_refused() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, patient_id).await;
    // The doctor has since tightened their week to Mon-Wed.
    mock_doctor_profile(&mock_server, doctor_id, "Mon-Wed, 9 AM - 5 PM").await;
    mock_appointment(&mock_server, appointment_id, patient_id, doctor_id, "Scheduled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    // 2024-01-04 is a Thursday.
    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/{}/reschedule", appointment_id),
            &token,
            Some(json!({ "appointment_date": "2024-01-04T10:00:00Z" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("working days"));
}

// ==============================================================================
// CANCEL / MARK-STATUS
// ==============================================================================

#[tokio::test]
async fn cancel_by_non_owner_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("other@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    mock_patient_profile(&mock_server, &user, Uuid::new_v4()).await;
    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), Uuid::new_v4(), "Scheduled").await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/cancel", appointment_id),
            &token,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_can_cancel_any_scheduled_appointment() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::admin("admin@clinic.local");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mock_appointment(&mock_server, appointment_id, patient_id, doctor_id, "Scheduled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(appointment_id, patient_id, doctor_id, MONDAY_10AM, "Cancelled")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/cancel", appointment_id),
            &token,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "Cancelled");
}

#[tokio::test]
async fn cancelling_a_completed_appointment_is_a_no_op() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::admin("admin@clinic.local");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), Uuid::new_v4(), "Completed").await;

    // No write may happen; the record is returned unchanged.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/cancel", appointment_id),
            &token,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "Completed");
}

#[tokio::test]
async fn owning_doctor_can_mark_completed() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mock_doctor_owned_by(&mock_server, &user, doctor_id).await;
    mock_appointment(&mock_server, appointment_id, patient_id, doctor_id, "Scheduled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(appointment_id, patient_id, doctor_id, MONDAY_10AM, "Completed")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/{}/status", appointment_id),
            &token,
            Some(json!({ "status": "Completed" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mark_status_ignores_a_scheduled_target() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mock_doctor_owned_by(&mock_server, &user, doctor_id).await;
    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), doctor_id, "Scheduled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/{}/status", appointment_id),
            &token,
            Some(json!({ "status": "Scheduled" })),
        ))
        .await
        .unwrap();

    // Treated as a no-op, not an error.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn doctor_cannot_mark_someone_elses_appointment() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    mock_doctor_owned_by(&mock_server, &user, Uuid::new_v4()).await;
    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), Uuid::new_v4(), "Scheduled").await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/{}/status", appointment_id),
            &token,
            Some(json!({ "status": "Completed" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ==============================================================================
// TREATMENT / PAYMENT
// ==============================================================================

#[tokio::test]
async fn save_treatment_rejects_patient_callers() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), Uuid::new_v4(), "Scheduled").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/record_treatment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/treatment", appointment_id),
            &token,
            Some(json!({
                "diagnosis": "Hypertension",
                "prescription": "Take 1 pill twice daily",
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn save_treatment_is_one_store_transaction() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mock_doctor_owned_by(&mock_server, &user, doctor_id).await;
    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), doctor_id, "Scheduled").await;

    // The treatment upsert, the status advance and the payment flip all
    // ride in this single call.
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/record_treatment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "treatment": MockStoreResponses::treatment_row(appointment_id, "Hypertension", "Take 1 pill twice daily"),
            "appointment_status": "Completed",
            "payment_status": "paid"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/treatment", appointment_id),
            &token,
            Some(json!({
                "diagnosis": "Hypertension",
                "prescription": "Take 1 pill twice daily",
                "notes": "Review in two weeks"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment_status"], "Completed");
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["treatment"]["diagnosis"], "Hypertension");
}

#[tokio::test]
async fn failed_treatment_transaction_changes_nothing_else() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mock_doctor_owned_by(&mock_server, &user, doctor_id).await;
    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), doctor_id, "Scheduled").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/record_treatment"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "deadlock" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // No compensating writes are attempted; the transaction either landed
    // in full or not at all.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/treatment", appointment_id),
            &token,
            Some(json!({
                "diagnosis": "Hypertension",
                "prescription": "Take 1 pill twice daily",
                "notes": null
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn recording_a_payment_is_admin_only() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/payment", appointment_id),
            &token,
            Some(json!({ "amount": 120.0 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_records_a_pending_payment() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let user = TestUser::admin("admin@clinic.local");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    mock_appointment(&mock_server, appointment_id, Uuid::new_v4(), Uuid::new_v4(), "Scheduled").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::payment_row(appointment_id, 120.0, "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/payment", appointment_id),
            &token,
            Some(json!({ "amount": 120.0 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["payment"]["status"], "pending");
}

#[tokio::test]
async fn requests_without_a_token_are_refused() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);

    let app = create_test_app(config);
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
