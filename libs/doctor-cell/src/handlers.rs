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

use crate::models::{DirectorySearchQuery, DoctorError, SetAvailabilityRequest};
use crate::services::doctor::DoctorService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::InvalidSchedule(err) => AppError::BadRequest(err.to_string()),
        DoctorError::Unauthorized => {
            AppError::Unauthorized("Not authorized to modify this doctor profile".to_string())
        }
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}

/// Public doctor directory search used by the booking flow.
#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DirectorySearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctors = service
        .search_doctors(&query.q, &state.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "count": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service
        .get_doctor(doctor_id, &state.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "doctor": doctor })))
}

/// Replace a doctor's availability rule string. Owning doctor or admin.
#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service
        .set_availability(&user, doctor_id, &request.availability, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Availability updated"
    })))
}

/// Admin roster management: removing a doctor deletes the owning account
/// and cascades through the profile and its appointments.
#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Unauthorized(
            "Only admin can manage the doctor roster".to_string(),
        ));
    }

    let service = DoctorService::new(&state);
    service
        .delete_doctor(doctor_id, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor removed"
    })))
}
