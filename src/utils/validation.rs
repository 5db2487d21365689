use regex::Regex;
use serde::Serialize;

use crate::models::{RegisterDto, Role};

pub const MIN_PASSWORD_LENGTH: usize = 4;

/// Stand-in for a full common-password corpus; the check is a single
/// function so a bigger list can be dropped in.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "passw0rd", "letmein", "welcome", "qwerty", "abc123", "iloveyou", "admin",
    "dragon", "monkey", "football", "baseball", "sunshine", "princess", "shadow", "master",
];

/// One violated field with a human-readable reason. Validation reports every
/// violation, not just the first.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldViolation {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_phone(phone: &str) -> bool {
    let re = Regex::new(r"^(07|01)\d{8}$").unwrap();
    re.is_match(phone)
}

pub fn validate_username(username: &str) -> bool {
    let re = Regex::new(r"^[A-Za-z]+$").unwrap();
    re.is_match(username)
}

pub fn validate_id_number(id_number: &str) -> bool {
    let re = Regex::new(r"^\d{1,9}$").unwrap();
    re.is_match(id_number)
}

/// Password policy: minimum length, not purely numeric, not a well-known
/// password.
pub fn validate_new_password(password: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(FieldViolation::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        violations.push(FieldViolation::new(
            "password",
            "Password cannot be entirely numeric",
        ));
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        violations.push(FieldViolation::new("password", "Password is too common"));
    }
    violations
}

pub fn validate_registration(dto: &RegisterDto) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if !validate_username(&dto.username) {
        violations.push(FieldViolation::new(
            "username",
            "Username must contain letters only",
        ));
    }
    if !validate_phone(&dto.phone) {
        violations.push(FieldViolation::new(
            "phone",
            "Enter a valid Kenyan phone number (07XXXXXXXX or 01XXXXXXXX)",
        ));
    }

    let role = dto.role.unwrap_or(Role::Member);
    match &dto.id_number {
        Some(id_number) => {
            if !validate_id_number(id_number) {
                violations.push(FieldViolation::new(
                    "id_number",
                    "ID number must be numeric and not exceed 9 digits",
                ));
            }
        }
        None => {
            if role != Role::Admin {
                violations.push(FieldViolation::new(
                    "id_number",
                    "ID number is required",
                ));
            }
        }
    }

    violations.extend(validate_new_password(&dto.password));
    violations
}
