use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, Role};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub exclusive_slots: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            exclusive_slots: false,
        }
    }
}

impl TestConfig {
    pub fn with_store_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            admin_email: "admin@clinic.local".to_string(),
            admin_password: "admin-test-password".to_string(),
            exclusive_slots: self.exclusive_slots,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            user_id: self.id,
            email: Some(self.email.clone()),
            role: self.role,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock-backed tests, shaped like the store
/// tables and directory views the services read.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn user_row(user_id: Uuid, email: &str, name: &str, role: Role, password_hash: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "name": name,
            "email": email,
            "password_hash": password_hash,
            "role": role,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_row(doctor_id: Uuid, user_id: Uuid, specialization: &str, availability: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "specialization": specialization,
            "phone": "0851234567",
            "availability": availability
        })
    }

    pub fn doctor_directory_row(
        doctor_id: Uuid,
        user_id: Uuid,
        name: &str,
        specialization: &str,
        availability: &str,
    ) -> serde_json::Value {
        json!({
            "doctor_id": doctor_id,
            "user_id": user_id,
            "name": name,
            "email": "doctor@example.com",
            "specialization": specialization,
            "phone": "0851234567",
            "availability": availability
        })
    }

    pub fn patient_row(patient_id: Uuid, user_id: Uuid, medical_record_number: i64) -> serde_json::Value {
        json!({
            "id": patient_id,
            "user_id": user_id,
            "medical_record_number": medical_record_number,
            "age": 34,
            "gender": "Female",
            "blood_group": "O+",
            "phone": "0861234567",
            "address": "12 Harbour Road"
        })
    }

    pub fn patient_directory_row(
        patient_id: Uuid,
        user_id: Uuid,
        medical_record_number: i64,
        name: &str,
        phone: &str,
    ) -> serde_json::Value {
        json!({
            "patient_id": patient_id,
            "user_id": user_id,
            "medical_record_number": medical_record_number,
            "name": name,
            "email": "patient@example.com",
            "age": 34,
            "gender": "Female",
            "blood_group": "O+",
            "phone": phone,
            "address": "12 Harbour Road"
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        appointment_date: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": appointment_date,
            "status": status,
            "notes": null
        })
    }

    pub fn treatment_row(appointment_id: Uuid, diagnosis: &str, prescription: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "diagnosis": diagnosis,
            "prescription": prescription,
            "notes": null,
            "record_date": "2024-01-01T00:00:00Z"
        })
    }

    pub fn payment_row(appointment_id: Uuid, amount: f64, status: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "amount": amount,
            "status": status,
            "billing_date": "2024-01-01T00:00:00Z"
        })
    }
}
