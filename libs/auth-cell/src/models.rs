use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::services::schedule::ScheduleFormatError;
use shared_models::auth::Role;

/// The 8 standard ABO/Rh combinations accepted at registration.
pub const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPatientRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: i32,
    pub gender: String,
    pub blood_group: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub specialization: String,
    pub phone: String,
    pub availability: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Outcome of the account + profile registration transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredAccount {
    pub user_id: Uuid,
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleFormatError),

    #[error("Database error: {0}")]
    Database(String),
}

impl AuthError {
    pub fn validation(field: &str, message: &str) -> Self {
        AuthError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}
