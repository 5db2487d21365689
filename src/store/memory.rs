//! In-memory store used by the test suite and for running the server
//! without a database. One mutex over the whole dataset — every
//! read-modify-write is serialised, which is exactly the guarantee the
//! store traits promise.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::models::{KycDocuments, KycProfile, KycStatus, Otp, User};

use super::{AccountStore, KycStore, OtpLedger, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    otps: Vec<Otp>,
    kyc: Vec<KycProfile>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-update; tests should fail loudly.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mutate a stored user in place. Stands in for the external admin
    /// actions (approval, blocking) that are out of the engine's scope.
    pub fn modify_user<F: FnOnce(&mut User)>(&self, phone: &str, f: F) -> bool {
        let mut inner = self.lock();
        match inner.users.iter_mut().find(|u| u.phone == phone) {
            Some(user) => {
                f(user);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.phone == user.phone) {
            return Err(StoreError::Conflict { field: "phone" });
        }
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict { field: "username" });
        }
        if let Some(ref id_number) = user.id_number {
            if inner
                .users
                .iter()
                .any(|u| u.id_number.as_deref() == Some(id_number))
            {
                return Err(StoreError::Conflict { field: "id_number" });
            }
        }
        let mut created = user;
        created.id = Some(ObjectId::new());
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn find_by_id(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == Some(id)).cloned())
    }

    async fn activate(&self, id: ObjectId) -> StoreResult<()> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == Some(id))
            .ok_or(StoreError::Missing)?;
        user.is_active = true;
        Ok(())
    }

    async fn record_failed_attempt(&self, id: ObjectId) -> StoreResult<i32> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == Some(id))
            .ok_or(StoreError::Missing)?;
        user.failed_login_attempts += 1;
        Ok(user.failed_login_attempts)
    }

    async fn lock_until(&self, id: ObjectId, until: DateTime) -> StoreResult<()> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == Some(id))
            .ok_or(StoreError::Missing)?;
        user.locked_until = Some(until);
        user.failed_login_attempts = 0;
        Ok(())
    }

    async fn clear_login_failures(&self, id: ObjectId) -> StoreResult<()> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == Some(id))
            .ok_or(StoreError::Missing)?;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        Ok(())
    }

    async fn replace_password(&self, id: ObjectId, password_hash: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == Some(id))
            .ok_or(StoreError::Missing)?;
        user.password_hash = password_hash.to_string();
        user.is_active = true;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        Ok(())
    }
}

#[async_trait]
impl OtpLedger for MemoryStore {
    async fn issue(&self, phone: &str, code: &str, now: DateTime) -> StoreResult<Otp> {
        let otp = Otp {
            id: Some(ObjectId::new()),
            phone: phone.to_string(),
            code: code.to_string(),
            created_at: now,
            is_used: false,
        };
        self.lock().otps.push(otp.clone());
        Ok(otp)
    }

    async fn find_valid(&self, phone: &str, code: &str) -> StoreResult<Option<Otp>> {
        Ok(self
            .lock()
            .otps
            .iter()
            .filter(|o| o.phone == phone && o.code == code && !o.is_used)
            .max_by_key(|o| o.created_at.timestamp_millis())
            .cloned())
    }

    async fn consume(&self, id: ObjectId) -> StoreResult<bool> {
        let mut inner = self.lock();
        match inner.otps.iter_mut().find(|o| o.id == Some(id)) {
            Some(otp) if !otp.is_used => {
                otp.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_since(&self, phone: &str, since: DateTime) -> StoreResult<u64> {
        let since_ms = since.timestamp_millis();
        Ok(self
            .lock()
            .otps
            .iter()
            .filter(|o| o.phone == phone && o.created_at.timestamp_millis() >= since_ms)
            .count() as u64)
    }

    async fn most_recent(&self, phone: &str) -> StoreResult<Option<Otp>> {
        Ok(self
            .lock()
            .otps
            .iter()
            .filter(|o| o.phone == phone)
            .max_by_key(|o| o.created_at.timestamp_millis())
            .cloned())
    }
}

#[async_trait]
impl KycStore for MemoryStore {
    async fn upsert_submission(
        &self,
        user_id: ObjectId,
        documents: KycDocuments,
        now: DateTime,
    ) -> StoreResult<KycProfile> {
        let mut inner = self.lock();
        if let Some(existing) = inner.kyc.iter_mut().find(|k| k.user_id == user_id) {
            existing.documents = documents;
            existing.status = KycStatus::Submitted;
            existing.submitted_at = now;
            return Ok(existing.clone());
        }
        let profile = KycProfile {
            id: Some(ObjectId::new()),
            user_id,
            documents,
            status: KycStatus::Submitted,
            submitted_at: now,
        };
        inner.kyc.push(profile.clone());
        Ok(profile)
    }

    async fn find_by_user(&self, user_id: ObjectId) -> StoreResult<Option<KycProfile>> {
        Ok(self.lock().kyc.iter().find(|k| k.user_id == user_id).cloned())
    }
}
