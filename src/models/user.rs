use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

pub const MAX_FAILED_ATTEMPTS: i32 = 5;
pub const LOCKOUT_MINUTES: i64 = 15;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Blocked,
}

/// One registered identity. `phone` is the login key and is stored in
/// local Kenyan format (07XXXXXXXX / 01XXXXXXXX).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub phone: String,
    pub username: String,
    pub id_number: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    /// Login gate — false until the account is OTP-verified.
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn is_locked(&self, now: DateTime) -> bool {
        match self.locked_until {
            Some(until) => now.timestamp_millis() < until.timestamp_millis(),
            None => false,
        }
    }

    /// Whole minutes until the lock expires, rounded up. Zero when unlocked.
    pub fn lock_remaining_minutes(&self, now: DateTime) -> i64 {
        match self.locked_until {
            Some(until) => {
                let remaining_ms = until.timestamp_millis() - now.timestamp_millis();
                if remaining_ms <= 0 {
                    0
                } else {
                    (remaining_ms + 59_999) / 60_000
                }
            }
            None => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterDto {
    pub username: String,
    pub phone: String,
    pub id_number: Option<String>,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginDto {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordDto {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordDto {
    pub phone: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub phone: String,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            phone: user.phone,
            username: user.username,
            role: user.role,
            status: user.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_locked_until(until_ms: i64) -> User {
        User {
            id: None,
            phone: "0712345678".into(),
            username: "alice".into(),
            id_number: None,
            password_hash: String::new(),
            role: Role::Member,
            status: AccountStatus::Pending,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: Some(DateTime::from_millis(until_ms)),
            created_at: DateTime::from_millis(0),
            updated_at: DateTime::from_millis(0),
        }
    }

    #[test]
    fn lock_expires_exactly_at_locked_until() {
        let user = user_locked_until(600_000);
        assert!(user.is_locked(DateTime::from_millis(599_999)));
        assert!(!user.is_locked(DateTime::from_millis(600_000)));
    }

    #[test]
    fn remaining_minutes_round_up() {
        let user = user_locked_until(15 * 60_000);
        // Full 15 minutes left.
        assert_eq!(user.lock_remaining_minutes(DateTime::from_millis(0)), 15);
        // One millisecond in, still reported as 15.
        assert_eq!(user.lock_remaining_minutes(DateTime::from_millis(1)), 15);
        // One second left rounds up to a minute.
        assert_eq!(
            user.lock_remaining_minutes(DateTime::from_millis(15 * 60_000 - 1_000)),
            1
        );
        assert_eq!(
            user.lock_remaining_minutes(DateTime::from_millis(15 * 60_000)),
            0
        );
    }
}
