use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Server-assigned sequential record number, the human-facing patient
    /// identifier used by directory search.
    pub medical_record_number: i64,
    pub age: i32,
    pub gender: String,
    pub blood_group: String,
    pub phone: String,
    pub address: String,
}

/// Row of the `patient_directory` store view: the patient profile joined
/// with its account name and email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDirectoryEntry {
    pub patient_id: Uuid,
    pub user_id: Uuid,
    pub medical_record_number: i64,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub gender: String,
    pub blood_group: String,
    pub phone: String,
    pub address: String,
}

impl PatientDirectoryEntry {
    /// Case-insensitive substring match against name OR phone, plus an
    /// exact record-number match when the query parses as an integer.
    /// One OR pass per row, so a patient matching several predicates
    /// still appears once. Empty or whitespace queries match everything.
    pub fn matches(&self, query: &str) -> bool {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return true;
        }

        let lowered = trimmed.to_lowercase();
        if self.name.to_lowercase().contains(&lowered) || self.phone.contains(trimmed) {
            return true;
        }

        trimmed
            .parse::<i64>()
            .map(|number| number == self.medical_record_number)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Not authorized to access this patient profile")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}
