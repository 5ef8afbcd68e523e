use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use doctor_cell::services::schedule::AvailabilityRule;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{LoginResponse, Role};
use shared_utils::jwt::sign_token;

use crate::models::{
    AuthError, CreateDoctorAccountRequest, LoginRequest, RegisterPatientRequest,
    RegisteredAccount, UserRecord,
};
use crate::services::password::{hash_password, verify_password};
use crate::services::validation::{
    require_non_empty, validate_blood_group, validate_email, validate_phone,
};

pub struct AccountService {
    supabase: SupabaseClient,
    jwt_secret: String,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    /// Public patient self-registration. Account and profile are created
    /// by one store procedure so a failure partway leaves neither row.
    pub async fn register_patient(
        &self,
        request: RegisterPatientRequest,
    ) -> Result<RegisteredAccount, AuthError> {
        require_non_empty("name", &request.name)?;
        require_non_empty("password", &request.password)?;
        validate_email(&request.email)?;
        validate_phone(&request.phone)?;
        validate_blood_group(&request.blood_group)?;
        if request.age <= 0 {
            return Err(AuthError::validation("age", "must be a positive number"));
        }

        self.reject_duplicate_email(&request.email).await?;

        let password_hash =
            hash_password(&request.password).map_err(|e| AuthError::Database(e.to_string()))?;

        let account = self
            .register_account(
                &request.name,
                &request.email,
                &password_hash,
                Role::Patient,
                json!({
                    "age": request.age,
                    "gender": request.gender,
                    "blood_group": request.blood_group,
                    "phone": request.phone,
                    "address": request.address,
                }),
            )
            .await?;

        info!("Registered patient account {}", account.user_id);
        Ok(account)
    }

    /// Admin roster management: create a doctor account with its profile.
    /// The availability rule must parse before anything is stored.
    pub async fn create_doctor_account(
        &self,
        request: CreateDoctorAccountRequest,
    ) -> Result<RegisteredAccount, AuthError> {
        require_non_empty("name", &request.name)?;
        require_non_empty("password", &request.password)?;
        require_non_empty("specialization", &request.specialization)?;
        validate_email(&request.email)?;
        validate_phone(&request.phone)?;
        AvailabilityRule::parse(&request.availability)?;

        self.reject_duplicate_email(&request.email).await?;

        let password_hash =
            hash_password(&request.password).map_err(|e| AuthError::Database(e.to_string()))?;

        let account = self
            .register_account(
                &request.name,
                &request.email,
                &password_hash,
                Role::Doctor,
                json!({
                    "specialization": request.specialization,
                    "phone": request.phone,
                    "availability": request.availability,
                }),
            )
            .await?;

        info!("Registered doctor account {}", account.user_id);
        Ok(account)
    }

    pub async fn authenticate(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        debug!("Authenticating {}", request.email);

        // Unknown email and wrong password are indistinguishable to the
        // caller.
        let user = match self.find_user_by_email(&request.email).await? {
            Some(user) => user,
            None => return Err(AuthError::InvalidCredentials),
        };

        let verified = verify_password(&request.password, &user.password_hash)
            .map_err(|e| AuthError::Database(e.to_string()))?;
        if !verified {
            return Err(AuthError::InvalidCredentials);
        }

        let token = sign_token(user.id, &user.email, user.role, &self.jwt_secret)
            .map_err(AuthError::Database)?;

        Ok(LoginResponse {
            token,
            user_id: user.id,
            name: user.name,
            role: user.role,
        })
    }

    /// Startup seeding: make sure the configured admin account exists.
    /// A no-op when it is already present.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if self.find_user_by_email(email).await?.is_some() {
            debug!("Admin account already exists");
            return Ok(());
        }

        let password_hash =
            hash_password(password).map_err(|e| AuthError::Database(e.to_string()))?;

        self.register_account("Admin", email, &password_hash, Role::Admin, Value::Null)
            .await?;

        info!("Admin account seeded");
        Ok(())
    }

    async fn reject_duplicate_email(&self, email: &str) -> Result<(), AuthError> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let path = format!("/rest/v1/users?email=eq.{}", email);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AuthError::Database(e.to_string())),
            None => Ok(None),
        }
    }

    /// One transaction in the store: the user row plus its role profile,
    /// or neither.
    async fn register_account(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        profile: Value,
    ) -> Result<RegisteredAccount, AuthError> {
        let params = json!({
            "name": name,
            "email": email,
            "password_hash": password_hash,
            "role": role,
            "profile": profile,
        });

        self.supabase
            .rpc("register_user", params, None)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }
}
