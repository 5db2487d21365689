//! Authentication engine — registration, OTP lifecycle, login with
//! lockout, password reset, and KYC intake.
//!
//! Generic over the store traits so the engine has no dependency on the
//! database driver; the notifier, clock and code source are injected at
//! startup.

use std::sync::Arc;

use log::warn;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::models::{
    AccountStatus, KycDocuments, KycProfile, LoginDto, RegisterDto, ResetPasswordDto, Role,
    SubmitKycDto, User, LOCKOUT_MINUTES, MAX_FAILED_ATTEMPTS,
};
use crate::store::{AccountStore, KycStore, OtpLedger};
use crate::utils::{normalize_kenyan_phone, validate_new_password, validate_registration};

use super::clock::{Clock, CodeSource};
use super::error::AuthError;
use super::jwt::{JwtService, TokenPair};
use super::sms::Notifier;

pub const OTP_COOLDOWN_MS: i64 = 60 * 1000;
pub const OTP_MAX_PER_HOUR: u64 = 5;
const HOUR_MS: i64 = 60 * 60 * 1000;

const INVALID_LOGIN: &str = "Invalid phone or password";
const INVALID_OTP: &str = "Invalid or expired OTP";

enum OtpPurpose {
    Registration,
    PasswordReset,
}

impl OtpPurpose {
    fn message(&self, code: &str) -> String {
        match self {
            OtpPurpose::Registration => {
                format!("Your verification code is {code}. Valid for 5 minutes.")
            }
            OtpPurpose::PasswordReset => {
                format!("Your password reset OTP is {code}. Valid for 5 minutes.")
            }
        }
    }
}

/// Successful login / password reset payload.
#[derive(Debug)]
pub struct LoginOutput {
    pub tokens: TokenPair,
    pub role: Role,
    pub status: AccountStatus,
}

pub struct AuthService<A, L, K> {
    accounts: A,
    otps: L,
    kyc: K,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeSource>,
}

impl<A, L, K> AuthService<A, L, K>
where
    A: AccountStore,
    L: OtpLedger,
    K: KycStore,
{
    pub fn new(
        accounts: A,
        otps: L,
        kyc: K,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeSource>,
    ) -> Self {
        Self {
            accounts,
            otps,
            kyc,
            notifier,
            clock,
            codes,
        }
    }

    /// Issue a fresh code for the phone and dispatch it. Delivery failure
    /// is logged, never propagated.
    async fn issue_and_send(&self, phone: &str, purpose: OtpPurpose) -> Result<(), AuthError> {
        let code = self.codes.six_digits();
        self.otps.issue(phone, &code, self.clock.now()).await?;

        let message = purpose.message(&code);
        if let Err(e) = self
            .notifier
            .send(&normalize_kenyan_phone(phone), &message)
            .await
        {
            warn!("SMS delivery failed for {phone}: {e}");
        }
        Ok(())
    }

    /// Create an inactive, pending account and send the activation code.
    /// No token is returned — the user must verify first.
    pub async fn register(&self, dto: RegisterDto) -> Result<User, AuthError> {
        let violations = validate_registration(&dto);
        if !violations.is_empty() {
            return Err(AuthError::Validation(violations));
        }

        let password_hash = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let now = self.clock.now();
        let user = User {
            id: None,
            phone: dto.phone,
            username: dto.username,
            id_number: dto.id_number,
            password_hash,
            role: dto.role.unwrap_or(Role::Member),
            status: AccountStatus::Pending,
            is_active: false,
            failed_login_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.accounts.create(user).await?;
        self.issue_and_send(&created.phone, OtpPurpose::Registration)
            .await?;
        Ok(created)
    }

    /// Match the most recent unused code for the phone and activate the
    /// account. Consumption is a compare-and-set, so a code activates at
    /// most once even under concurrent verification.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<(), AuthError> {
        let otp = self
            .otps
            .find_valid(phone, code)
            .await?
            .ok_or(AuthError::NotFound(INVALID_OTP))?;

        if otp.is_expired(self.clock.now()) {
            // Left unused; the client must request a fresh code.
            return Err(AuthError::OtpExpired);
        }

        let otp_id = otp.id.ok_or_else(|| {
            AuthError::Internal("OTP record missing id".into())
        })?;
        if !self.otps.consume(otp_id).await? {
            // Lost the race to a concurrent verification.
            return Err(AuthError::NotFound(INVALID_OTP));
        }

        let user = self
            .accounts
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::NotFound(INVALID_OTP))?;
        let user_id = user
            .id
            .ok_or_else(|| AuthError::Internal("user record missing id".into()))?;
        self.accounts.activate(user_id).await?;
        Ok(())
    }

    /// Credential check with lockout policy. Unknown phone and wrong
    /// password produce the same error.
    pub async fn login(&self, dto: LoginDto) -> Result<LoginOutput, AuthError> {
        let user = self
            .accounts
            .find_by_phone(&dto.phone)
            .await?
            .ok_or(AuthError::NotFound(INVALID_LOGIN))?;
        let user_id = user
            .id
            .ok_or_else(|| AuthError::Internal("user record missing id".into()))?;

        if user.status == AccountStatus::Blocked {
            return Err(AuthError::Blocked);
        }
        if !user.is_active {
            return Err(AuthError::NotActivated);
        }

        let now = self.clock.now();
        if user.is_locked(now) {
            return Err(AuthError::Locked {
                minutes: user.lock_remaining_minutes(now),
            });
        }

        let password_ok = bcrypt::verify(&dto.password, &user.password_hash)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !password_ok {
            let count = self.accounts.record_failed_attempt(user_id).await?;
            if count >= MAX_FAILED_ATTEMPTS {
                let until =
                    DateTime::from_millis(now.timestamp_millis() + LOCKOUT_MINUTES * 60_000);
                self.accounts.lock_until(user_id, until).await?;
                return Err(AuthError::Locked {
                    minutes: LOCKOUT_MINUTES,
                });
            }
            return Err(AuthError::InvalidCredentials {
                remaining: MAX_FAILED_ATTEMPTS - count,
            });
        }

        self.accounts.clear_login_failures(user_id).await?;
        let tokens =
            JwtService::issue_pair(&user).map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(LoginOutput {
            tokens,
            role: user.role,
            status: user.status,
        })
    }

    /// Issue a password-reset code, subject to the per-phone cooldown and
    /// hourly cap. The throttled message never reveals which limit hit.
    pub async fn request_password_reset(&self, phone: &str) -> Result<(), AuthError> {
        self.accounts
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::NotFound("User with this phone does not exist"))?;

        let now = self.clock.now();
        if let Some(last) = self.otps.most_recent(phone).await? {
            if now.timestamp_millis() - last.created_at.timestamp_millis() < OTP_COOLDOWN_MS {
                return Err(AuthError::RateLimited);
            }
        }

        let hour_ago = DateTime::from_millis(now.timestamp_millis() - HOUR_MS);
        if self.otps.count_since(phone, hour_ago).await? >= OTP_MAX_PER_HOUR {
            return Err(AuthError::RateLimited);
        }

        self.issue_and_send(phone, OtpPurpose::PasswordReset).await
    }

    /// OTP-gated credential replacement. The code is consumed before the
    /// account row is rewritten, so a crash in between can never leave a
    /// new password alongside a reusable OTP. Reset doubles as
    /// re-verification: the account comes out active and unlocked.
    pub async fn reset_password(&self, dto: ResetPasswordDto) -> Result<LoginOutput, AuthError> {
        let violations = validate_new_password(&dto.new_password);
        if !violations.is_empty() {
            return Err(AuthError::Validation(violations));
        }

        let user = self
            .accounts
            .find_by_phone(&dto.phone)
            .await?
            .ok_or(AuthError::NotFound(INVALID_OTP))?;
        let user_id = user
            .id
            .ok_or_else(|| AuthError::Internal("user record missing id".into()))?;

        let otp = self
            .otps
            .find_valid(&dto.phone, &dto.otp)
            .await?
            .ok_or(AuthError::NotFound(INVALID_OTP))?;
        if otp.is_expired(self.clock.now()) {
            return Err(AuthError::OtpExpired);
        }
        let otp_id = otp
            .id
            .ok_or_else(|| AuthError::Internal("OTP record missing id".into()))?;
        if !self.otps.consume(otp_id).await? {
            return Err(AuthError::NotFound(INVALID_OTP));
        }

        let password_hash = bcrypt::hash(&dto.new_password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        self.accounts
            .replace_password(user_id, &password_hash)
            .await?;

        let tokens =
            JwtService::issue_pair(&user).map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(LoginOutput {
            tokens,
            role: user.role,
            status: user.status,
        })
    }

    /// Mint a fresh access token from a refresh token, re-checking the
    /// account's gates.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = JwtService::verify_token(refresh_token, true)
            .map_err(|_| AuthError::NotFound("Invalid refresh token"))?;
        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AuthError::NotFound("Invalid refresh token"))?;

        let user = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound("Invalid refresh token"))?;
        if user.status == AccountStatus::Blocked {
            return Err(AuthError::Blocked);
        }
        if !user.is_active {
            return Err(AuthError::NotActivated);
        }

        JwtService::generate_access_token(&user_id, &user.phone, user.role)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Record a KYC submission for the authenticated identity. A repeat
    /// submission overwrites the previous one and resets the status.
    pub async fn submit_kyc(
        &self,
        user_id: ObjectId,
        dto: SubmitKycDto,
    ) -> Result<KycProfile, AuthError> {
        self.accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound("Account not found"))?;

        let documents = KycDocuments {
            passport_photo: dto.passport_photo,
            id_front: dto.id_front,
            id_back: dto.id_back,
        };
        Ok(self
            .kyc
            .upsert_submission(user_id, documents, self.clock.now())
            .await?)
    }

    pub async fn kyc_status(&self, user_id: ObjectId) -> Result<Option<KycProfile>, AuthError> {
        Ok(self.kyc.find_by_user(user_id).await?)
    }
}
