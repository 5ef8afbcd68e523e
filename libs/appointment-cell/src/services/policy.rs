use tracing::debug;
use uuid::Uuid;

use doctor_cell::services::doctor::DoctorService;
use patient_cell::services::patient::PatientService;
use shared_config::AppConfig;
use shared_models::auth::{AuthUser, Role};

use crate::models::{Appointment, AppointmentError};

/// Which roles may invoke an operation, before any ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AdminOnly,
    PatientOnly,
    DoctorOnly,
    AdminOrPatient,
    SelfOrAdmin,
}

impl Capability {
    pub fn permits(&self, role: Role) -> bool {
        match self {
            Capability::AdminOnly => role == Role::Admin,
            Capability::PatientOnly => role == Role::Patient,
            Capability::DoctorOnly => role == Role::Doctor,
            Capability::AdminOrPatient => matches!(role, Role::Admin | Role::Patient),
            Capability::SelfOrAdmin => true, // narrowed by the ownership check
        }
    }
}

/// Role and ownership checks gating the lifecycle operations. Profile ids
/// are always resolved from the actor's authenticated user id against the
/// store; ids supplied by the caller are never trusted for authorization.
pub struct AccessPolicy {
    doctor_service: DoctorService,
    patient_service: PatientService,
}

impl AccessPolicy {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            doctor_service: DoctorService::new(config),
            patient_service: PatientService::new(config),
        }
    }

    pub fn require(&self, capability: Capability, actor: &AuthUser) -> Result<(), AppointmentError> {
        if capability.permits(actor.role) {
            Ok(())
        } else {
            debug!("Role {} refused by capability {:?}", actor.role, capability);
            Err(AppointmentError::Unauthorized)
        }
    }

    /// The patient profile owned by the acting account.
    pub async fn acting_patient(
        &self,
        actor: &AuthUser,
        auth_token: &str,
    ) -> Result<Uuid, AppointmentError> {
        self.require(Capability::PatientOnly, actor)?;

        self.patient_service
            .get_patient_by_user(actor.user_id, auth_token)
            .await
            .map(|patient| patient.id)
            .map_err(|e| match e {
                patient_cell::models::PatientError::NotFound => AppointmentError::PatientNotFound,
                other => AppointmentError::Database(other.to_string()),
            })
    }

    /// The doctor profile owned by the acting account.
    pub async fn acting_doctor(
        &self,
        actor: &AuthUser,
        auth_token: &str,
    ) -> Result<Uuid, AppointmentError> {
        self.require(Capability::DoctorOnly, actor)?;

        self.doctor_service
            .get_doctor_by_user(actor.user_id, auth_token)
            .await
            .map(|doctor| doctor.id)
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::Database(other.to_string()),
            })
    }

    /// Only the patient who booked the appointment.
    pub async fn require_owning_patient(
        &self,
        actor: &AuthUser,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let patient_id = self.acting_patient(actor, auth_token).await?;
        if appointment.patient_id != patient_id {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(())
    }

    /// The booking patient or an administrator.
    pub async fn require_owning_patient_or_admin(
        &self,
        actor: &AuthUser,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        self.require(Capability::AdminOrPatient, actor)?;
        if actor.is_admin() {
            return Ok(());
        }
        self.require_owning_patient(actor, appointment, auth_token).await
    }

    /// Only the doctor the appointment is booked with.
    pub async fn require_owning_doctor(
        &self,
        actor: &AuthUser,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let doctor_id = self.acting_doctor(actor, auth_token).await?;
        if appointment.doctor_id != doctor_id {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(())
    }

    /// Either side of the appointment, or an administrator. Gates reads.
    pub async fn require_participant_or_admin(
        &self,
        actor: &AuthUser,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Patient => self.require_owning_patient(actor, appointment, auth_token).await,
            Role::Doctor => self.require_owning_doctor(actor, appointment, auth_token).await,
        }
    }
}
