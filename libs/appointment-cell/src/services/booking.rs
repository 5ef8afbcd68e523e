use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::doctor::DoctorService;
use doctor_cell::services::schedule::AvailabilityRule;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{AuthUser, Role};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
};
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionPlan};
use crate::services::policy::AccessPolicy;

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctor_service: DoctorService,
    lifecycle: AppointmentLifecycleService,
    policy: AccessPolicy,
    exclusive_slots: bool,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctor_service: DoctorService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            policy: AccessPolicy::new(config),
            exclusive_slots: config.exclusive_slots,
        }
    }

    /// Book a new appointment for the acting patient. The requested slot
    /// is validated against the doctor's current availability rule; an
    /// invalid slot never persists a Scheduled row.
    pub async fn create_appointment(
        &self,
        actor: &AuthUser,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = self.policy.acting_patient(actor, auth_token).await?;

        info!(
            "Booking appointment for patient {} with doctor {} at {}",
            patient_id, request.doctor_id, request.appointment_date
        );

        self.validate_slot(request.doctor_id, request.appointment_date, auth_token)
            .await?;

        if self.exclusive_slots {
            self.reject_taken_slot(request.doctor_id, request.appointment_date, auth_token)
                .await?;
        }

        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date,
            "status": AppointmentStatus::Scheduled,
            "notes": request.notes,
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Failed to create appointment".to_string()))?;

        let appointment: Appointment =
            serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Move an appointment to a new slot. Only the booking patient may
    /// reschedule, and the new slot is re-validated against the doctor's
    /// availability as it stands now, not as it was at booking time. The
    /// current status is deliberately not consulted.
    pub async fn reschedule_appointment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        new_date: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_owning_patient(actor, &appointment, auth_token)
            .await?;

        self.validate_slot(appointment.doctor_id, new_date, auth_token)
            .await?;

        if self.exclusive_slots {
            self.reject_taken_slot(appointment.doctor_id, new_date, auth_token)
                .await?;
        }

        let updated = self
            .patch_appointment(appointment_id, json!({ "appointment_date": new_date }), auth_token)
            .await?;

        info!("Appointment {} rescheduled to {}", appointment_id, new_date);
        Ok(updated)
    }

    /// Cancel an appointment. Booking patient or admin. Cancelling an
    /// appointment that is already terminal leaves it untouched and
    /// reports success.
    pub async fn cancel_appointment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_owning_patient_or_admin(actor, &appointment, auth_token)
            .await?;

        match self
            .lifecycle
            .plan_transition(&appointment.status, &AppointmentStatus::Cancelled)
        {
            TransitionPlan::Apply(next) => {
                let updated = self
                    .patch_appointment(appointment_id, json!({ "status": next }), auth_token)
                    .await?;
                info!("Appointment {} cancelled", appointment_id);
                Ok(updated)
            }
            TransitionPlan::NoOp => {
                info!(
                    "Cancel of appointment {} in status {} is a no-op",
                    appointment_id, appointment.status
                );
                Ok(appointment)
            }
            TransitionPlan::Rejected => {
                warn!(
                    "Refusing cancel of appointment {} in status {}",
                    appointment_id, appointment.status
                );
                Err(AppointmentError::InvalidTransition(
                    appointment.status,
                    AppointmentStatus::Cancelled,
                ))
            }
        }
    }

    /// Doctor-driven status update for their own appointment. Targets
    /// other than Completed or Cancelled are ignored, as is any change to
    /// an appointment already in a terminal state.
    pub async fn mark_status(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        target: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_owning_doctor(actor, &appointment, auth_token)
            .await?;

        if !matches!(target, AppointmentStatus::Completed | AppointmentStatus::Cancelled) {
            debug!(
                "Ignoring status target {} for appointment {}",
                target, appointment_id
            );
            return Ok(appointment);
        }

        match self.lifecycle.plan_transition(&appointment.status, &target) {
            TransitionPlan::Apply(next) => {
                let updated = self
                    .patch_appointment(appointment_id, json!({ "status": next }), auth_token)
                    .await?;
                info!("Appointment {} marked {}", appointment_id, next);
                Ok(updated)
            }
            TransitionPlan::NoOp | TransitionPlan::Rejected => {
                info!(
                    "Status {} left unchanged for appointment {} (was {})",
                    target, appointment_id, appointment.status
                );
                Ok(appointment)
            }
        }
    }

    pub async fn get_appointment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_participant_or_admin(actor, &appointment, auth_token)
            .await?;

        Ok(appointment)
    }

    /// Role-scoped listing: admin sees the full roster, a doctor or a
    /// patient only their own appointments.
    pub async fn list_appointments(
        &self,
        actor: &AuthUser,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = match actor.role {
            Role::Admin => "/rest/v1/appointments?order=appointment_date.desc".to_string(),
            Role::Doctor => {
                let doctor_id = self.policy.acting_doctor(actor, auth_token).await?;
                format!(
                    "/rest/v1/appointments?doctor_id=eq.{}&order=appointment_date.desc",
                    doctor_id
                )
            }
            Role::Patient => {
                let patient_id = self.policy.acting_patient(actor, auth_token).await?;
                format!(
                    "/rest/v1/appointments?patient_id=eq.{}&order=appointment_date.desc",
                    patient_id
                )
            }
        };

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }

    // Private helpers

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Check a candidate slot against the doctor's availability rule as
    /// currently stored.
    async fn validate_slot(
        &self,
        doctor_id: Uuid,
        when: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let doctor = self
            .doctor_service
            .get_doctor(doctor_id, auth_token)
            .await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::Database(other.to_string()),
            })?;

        let rule = AvailabilityRule::parse(&doctor.availability)?;

        rule.check_slot(when).map_err(|rejection| {
            warn!("Slot {} refused for doctor {}: {}", when, doctor_id, rejection);
            AppointmentError::SlotUnavailable(rejection)
        })
    }

    /// Optional exclusivity policy: refuse a second Scheduled appointment
    /// at the identical doctor and timestamp. Off by default to match the
    /// walk-in style overlap the clinic runs with.
    async fn reject_taken_slot(
        &self,
        doctor_id: Uuid,
        when: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=eq.Scheduled",
            doctor_id,
            when.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if !existing.is_empty() {
            return Err(AppointmentError::SlotTaken);
        }

        Ok(())
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }
}
