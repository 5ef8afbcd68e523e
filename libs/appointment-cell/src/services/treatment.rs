use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::AuthUser;

use crate::models::{
    Appointment, AppointmentError, Payment, PaymentStatus, RecordPaymentRequest,
    SaveTreatmentRequest, Treatment, TreatmentOutcome,
};
use crate::services::policy::{AccessPolicy, Capability};

pub struct TreatmentService {
    supabase: SupabaseClient,
    policy: AccessPolicy,
}

impl TreatmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            policy: AccessPolicy::new(config),
        }
    }

    /// Create or update the single treatment record of an appointment.
    /// Only the doctor the appointment is booked with may write it.
    ///
    /// The store procedure upserts the treatment, advances a Scheduled
    /// appointment to Completed and flips a pending payment to paid in
    /// one transaction: all three changes land or none do.
    pub async fn save_treatment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        request: SaveTreatmentRequest,
        auth_token: &str,
    ) -> Result<TreatmentOutcome, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_owning_doctor(actor, &appointment, auth_token)
            .await?;

        if request.diagnosis.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "diagnosis must not be empty".to_string(),
            ));
        }

        let params = json!({
            "appointment_id": appointment_id,
            "diagnosis": request.diagnosis,
            "prescription": request.prescription,
            "notes": request.notes,
        });

        let outcome: TreatmentOutcome = self
            .supabase
            .rpc("record_treatment", params, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Treatment saved for appointment {}; appointment now {}, payment {:?}",
            appointment_id, outcome.appointment_status, outcome.payment_status
        );
        Ok(outcome)
    }

    pub async fn get_treatment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Treatment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_participant_or_admin(actor, &appointment, auth_token)
            .await?;

        let path = format!("/rest/v1/treatments?appointment_id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or(AppointmentError::TreatmentNotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Admin billing: open the single payment record of an appointment in
    /// pending state. Save-treatment later flips it to paid.
    pub async fn record_payment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        request: RecordPaymentRequest,
        auth_token: &str,
    ) -> Result<Payment, AppointmentError> {
        self.policy.require(Capability::AdminOnly, actor)?;

        if request.amount <= 0.0 {
            return Err(AppointmentError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        // The appointment must exist; the 0..1 payment invariant is also
        // enforced by a unique constraint in the store.
        self.fetch_appointment(appointment_id, auth_token).await?;

        let existing = self.find_payment(appointment_id, auth_token).await?;
        if existing.is_some() {
            return Err(AppointmentError::PaymentAlreadyRecorded);
        }

        let payment_data = json!({
            "appointment_id": appointment_id,
            "amount": request.amount,
            "status": PaymentStatus::Pending,
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
                "/rest/v1/payments",
                Some(auth_token),
                Some(payment_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Failed to record payment".to_string()))?;

        let payment: Payment =
            serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Payment of {} recorded for appointment {}",
            payment.amount, appointment_id
        );
        Ok(payment)
    }

    pub async fn get_payment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Payment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.policy
            .require_owning_patient_or_admin(actor, &appointment, auth_token)
            .await?;

        self.find_payment(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::PaymentNotFound)
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

    async fn find_payment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Payment>, AppointmentError> {
        debug!("Fetching payment for appointment {}", appointment_id);

        let path = format!("/rest/v1/payments?appointment_id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AppointmentError::Database(e.to_string())),
            None => Ok(None),
        }
    }
}
