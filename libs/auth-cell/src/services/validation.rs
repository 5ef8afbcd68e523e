use regex::Regex;

use crate::models::{AuthError, BLOOD_GROUPS};

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::validation(field, "must not be empty"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is valid");

    if !email_regex.is_match(email) || email.len() > 254 {
        return Err(AuthError::validation("email", "is not a valid email address"));
    }
    Ok(())
}

/// Phone numbers are stored as exactly 10 characters.
pub fn validate_phone(phone: &str) -> Result<(), AuthError> {
    if phone.len() != 10 {
        return Err(AuthError::validation("phone", "must be exactly 10 characters"));
    }
    Ok(())
}

pub fn validate_blood_group(blood_group: &str) -> Result<(), AuthError> {
    if !BLOOD_GROUPS.contains(&blood_group) {
        return Err(AuthError::validation(
            "blood_group",
            "must be one of the 8 ABO/Rh combinations",
        ));
    }
    Ok(())
}
