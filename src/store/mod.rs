//! Storage seams for the authentication core.
//!
//! The engine only ever talks to these traits; `mongo` backs them in
//! production and `memory` backs them in tests and local development.
//! Operations that race on the same record (OTP consumption, the
//! failed-attempt counter) are expressed as atomic compare-and-update
//! methods so no implementation can introduce lost updates.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use thiserror::Error;

use crate::models::{KycDocuments, KycProfile, Otp, User};

pub use memory::MemoryStore;
pub use mongo::{MongoAccountStore, MongoKycStore, MongoOtpLedger};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation on the named field.
    #[error("{field} already registered")]
    Conflict { field: &'static str },

    /// Record disappeared between lookup and update.
    #[error("record not found")]
    Missing,

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identity records, keyed by phone. Uniqueness of phone, username and
/// id_number is enforced at this boundary.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create(&self, user: User) -> StoreResult<User>;
    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: ObjectId) -> StoreResult<Option<User>>;

    /// Flip `is_active` on (OTP verified).
    async fn activate(&self, id: ObjectId) -> StoreResult<()>;

    /// Atomically increment the failed-attempt counter, returning the new
    /// count. Concurrent callers each observe a distinct count.
    async fn record_failed_attempt(&self, id: ObjectId) -> StoreResult<i32>;

    /// Set `locked_until` and zero the counter in one write.
    async fn lock_until(&self, id: ObjectId, until: DateTime) -> StoreResult<()>;

    /// Zero the counter and clear any lock (successful login).
    async fn clear_login_failures(&self, id: ObjectId) -> StoreResult<()>;

    /// Single-document commit of a password reset: new hash, activation,
    /// counter and lock cleared.
    async fn replace_password(&self, id: ObjectId, password_hash: &str) -> StoreResult<()>;
}

/// Append-only ledger of issued codes.
#[async_trait]
pub trait OtpLedger: Send + Sync {
    async fn issue(&self, phone: &str, code: &str, now: DateTime) -> StoreResult<Otp>;

    /// Most recently issued unused record matching phone and code exactly.
    async fn find_valid(&self, phone: &str, code: &str) -> StoreResult<Option<Otp>>;

    /// Compare-and-set `is_used` from false to true. Returns false when a
    /// concurrent verification already consumed the record.
    async fn consume(&self, id: ObjectId) -> StoreResult<bool>;

    /// Number of codes issued for the phone at or after `since`.
    async fn count_since(&self, phone: &str, since: DateTime) -> StoreResult<u64>;

    /// Latest issued record for the phone, used or not.
    async fn most_recent(&self, phone: &str) -> StoreResult<Option<Otp>>;
}

/// One KYC submission per identity, overwritten on re-submission.
#[async_trait]
pub trait KycStore: Send + Sync {
    async fn upsert_submission(
        &self,
        user_id: ObjectId,
        documents: KycDocuments,
        now: DateTime,
    ) -> StoreResult<KycProfile>;

    async fn find_by_user(&self, user_id: ObjectId) -> StoreResult<Option<KycProfile>>;
}
