use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, TokenResponse};
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;

use crate::models::{AuthError, CreateDoctorAccountRequest, LoginRequest, RegisterPatientRequest};
use crate::services::account::AccountService;

fn map_auth_error(e: AuthError) -> AppError {
    match e {
        AuthError::DuplicateEmail => AppError::Conflict("Email already registered".to_string()),
        AuthError::Validation { field, message } => AppError::Validation { field, message },
        AuthError::InvalidCredentials => {
            AppError::Unauthorized("Invalid email or password".to_string())
        }
        AuthError::InvalidSchedule(err) => AppError::BadRequest(err.to_string()),
        AuthError::Database(msg) => AppError::Database(msg),
    }
}

// Helper function to extract token
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ));
    }

    Ok(auth_value[7..].to_string())
}

/// Public patient self-registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    let account = service
        .register_patient(request)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "account": account,
        "message": "Registration successful"
    })))
}

/// Admin-only: add a doctor to the roster.
#[axum::debug_handler]
pub async fn create_doctor_account(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateDoctorAccountRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Unauthorized(
            "Only admin can create doctor accounts".to_string(),
        ));
    }

    let service = AccountService::new(&state);

    let account = service
        .create_doctor_account(request)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "account": account,
        "message": "Doctor account created"
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    let session = service.authenticate(request).await.map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    match validate_token(&token, &config.jwt_secret) {
        Ok(user) => {
            let response = TokenResponse {
                valid: true,
                user_id: user.user_id.to_string(),
                email: user.email,
                role: Some(user.role),
            };

            Ok(Json(response))
        }
        Err(err) => Err(AppError::Unauthorized(err)),
    }
}
