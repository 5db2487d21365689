use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// OTPs are valid for five minutes from issuance.
pub const OTP_VALIDITY_MS: i64 = 5 * 60 * 1000;

/// A single issued one-time code. Records are append-only: a code is never
/// deleted, only marked used or superseded by a newer issue for the phone.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Otp {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub phone: String,
    pub code: String,
    pub created_at: DateTime,
    pub is_used: bool,
}

impl Otp {
    /// Expired once the code is five full minutes old (valid at 4:59,
    /// rejected at 5:00).
    pub fn is_expired(&self, now: DateTime) -> bool {
        now.timestamp_millis() - self.created_at.timestamp_millis() >= OTP_VALIDITY_MS
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpDto {
    pub phone: String,
    pub otp: String,
}
