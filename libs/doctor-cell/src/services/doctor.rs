use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::AuthUser;

use crate::models::{Doctor, DoctorDirectoryEntry, DoctorError};
use crate::services::schedule::AvailabilityRule;

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    /// Resolve the doctor profile owned by an account. Used for ownership
    /// checks; the profile id always comes from this lookup, never from
    /// the request.
    pub async fn get_doctor_by_user(&self, user_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    /// Replace a doctor's availability rule. The string must parse before
    /// it is stored; only the owning doctor or an admin may change it.
    pub async fn set_availability(
        &self,
        actor: &AuthUser,
        doctor_id: Uuid,
        availability: &str,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let rule = AvailabilityRule::parse(availability)?;

        let doctor = self.get_doctor(doctor_id, auth_token).await?;

        if !actor.is_admin() && doctor.user_id != actor.user_id {
            return Err(DoctorError::Unauthorized);
        }

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "availability": availability })),
                Some(headers),
            )
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        let updated: Doctor =
            serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))?;

        info!("Availability for doctor {} set to '{}'", doctor_id, rule);
        Ok(updated)
    }

    /// Remove a doctor from the roster by deleting the owning account.
    /// The store cascades to the profile, its appointments and their
    /// treatments and payments.
    pub async fn delete_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), DoctorError> {
        let doctor = self.get_doctor(doctor_id, auth_token).await?;

        let path = format!("/rest/v1/users?id=eq.{}", doctor.user_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        info!("Doctor {} removed from roster", doctor_id);
        Ok(())
    }

    /// Filtered doctor directory. The full view is fetched and the query
    /// predicate applied in memory; an empty query is the unfiltered
    /// listing.
    pub async fn search_doctors(
        &self,
        query: &str,
        auth_token: &str,
    ) -> Result<Vec<DoctorDirectoryEntry>, DoctorError> {
        debug!("Searching doctor directory with query '{}'", query);

        let path = "/rest/v1/doctor_directory?order=name.asc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let entries: Vec<DoctorDirectoryEntry> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.matches(query))
            .collect())
    }
}
