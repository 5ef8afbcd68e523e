use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Patient, PatientDirectoryEntry, PatientError};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        serde_json::from_value(row).map_err(|e| PatientError::Database(e.to_string()))
    }

    /// Resolve the patient profile owned by an account. Ownership checks
    /// always derive the profile id from this lookup, never from ids in
    /// the request body.
    pub async fn get_patient_by_user(&self, user_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        serde_json::from_value(row).map_err(|e| PatientError::Database(e.to_string()))
    }

    /// Remove a patient from the roster by deleting the owning account.
    /// The store cascades to the profile, its appointments and their
    /// treatments and payments.
    pub async fn delete_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let patient = self.get_patient(patient_id, auth_token).await?;

        let path = format!("/rest/v1/users?id=eq.{}", patient.user_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        info!("Patient {} removed from roster", patient_id);
        Ok(())
    }

    /// Filtered patient directory. The full view is fetched and the query
    /// predicate applied in memory; an empty query is the unfiltered
    /// listing.
    pub async fn search_patients(
        &self,
        query: &str,
        auth_token: &str,
    ) -> Result<Vec<PatientDirectoryEntry>, PatientError> {
        debug!("Searching patient directory with query '{}'", query);

        let path = "/rest/v1/patient_directory?order=medical_record_number.asc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let entries: Vec<PatientDirectoryEntry> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| PatientError::Database(e.to_string()))?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.matches(query))
            .collect())
    }
}
