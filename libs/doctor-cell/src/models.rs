use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::schedule::ScheduleFormatError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub phone: String,
    /// Free-text weekly availability rule, e.g. "Mon-Fri, 9 AM - 5 PM".
    /// Always written through `AvailabilityRule::parse`, so a stored value
    /// is expected to parse; a row edited out-of-band may still fail.
    pub availability: String,
}

/// Row of the `doctor_directory` store view: the doctor profile joined
/// with its account name and email, used by dashboards and booking flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDirectoryEntry {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub phone: String,
    pub availability: String,
}

impl DoctorDirectoryEntry {
    /// Case-insensitive substring match against name OR specialization.
    /// An empty or whitespace query matches every entry. Plain OR of
    /// independent predicates, no ranking.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        self.name.to_lowercase().contains(&query)
            || self.specialization.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub availability: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleFormatError),

    #[error("Not authorized to modify this doctor profile")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}
