use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{DirectorySearchQuery, PatientError};
use crate::services::patient::PatientService;

fn map_patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::Unauthorized => {
            AppError::Unauthorized("Not authorized to access this patient profile".to_string())
        }
        PatientError::Database(msg) => AppError::Database(msg),
    }
}

/// Admin-only patient directory search for the dashboard.
#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DirectorySearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Unauthorized(
            "Only admin can browse the patient roster".to_string(),
        ));
    }

    let service = PatientService::new(&state);

    let patients = service
        .search_patients(&query.q, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "patients": patients,
        "count": patients.len()
    })))
}

/// A patient may fetch their own profile; admin may fetch any.
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let patient = service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    if !user.is_admin() && patient.user_id != user.user_id {
        return Err(AppError::Unauthorized(
            "Not authorized to access this patient profile".to_string(),
        ));
    }

    Ok(Json(json!({ "patient": patient })))
}

/// Admin roster management: removing a patient deletes the owning
/// account and cascades through the profile and its appointments.
#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Unauthorized(
            "Only admin can manage the patient roster".to_string(),
        ));
    }

    let service = PatientService::new(&state);
    service
        .delete_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient removed"
    })))
}
