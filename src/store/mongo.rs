//! MongoDB-backed stores. Compare-and-update methods are built on
//! `find_one_and_update` so the unused flag and the failed-attempt counter
//! are mutated atomically server-side.

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, to_bson, Bson, DateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOneOptions, ReturnDocument};
use mongodb::Database;

use crate::models::{KycDocuments, KycProfile, KycStatus, Otp, User};

use super::{AccountStore, KycStore, OtpLedger, StoreError, StoreResult};

const USERS: &str = "users";
const OTPS: &str = "otps";
const KYC: &str = "kyc_profiles";

const DUPLICATE_KEY: i32 = 11000;

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Name the field behind an E11000 from the index named in the message,
/// e.g. "... index: username_1 dup key ...".
fn conflict_field(message: &str) -> &'static str {
    if message.contains("username") {
        "username"
    } else if message.contains("id_number") {
        "id_number"
    } else {
        "phone"
    }
}

#[derive(Clone)]
pub struct MongoAccountStore {
    db: Database,
}

impl MongoAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for MongoAccountStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        let users = self.db.collection::<User>(USERS);

        // Deployment carries unique indexes as a backstop; the lookups give
        // us the violating field name for the error message.
        if users
            .find_one(doc! { "phone": &user.phone }, None)
            .await
            .map_err(backend)?
            .is_some()
        {
            return Err(StoreError::Conflict { field: "phone" });
        }
        if users
            .find_one(doc! { "username": &user.username }, None)
            .await
            .map_err(backend)?
            .is_some()
        {
            return Err(StoreError::Conflict { field: "username" });
        }
        if let Some(ref id_number) = user.id_number {
            if users
                .find_one(doc! { "id_number": id_number }, None)
                .await
                .map_err(backend)?
                .is_some()
            {
                return Err(StoreError::Conflict { field: "id_number" });
            }
        }

        // The pre-insert lookups race under concurrent registration; when
        // the unique index catches the loser, surface it as a conflict too.
        let result = users.insert_one(&user, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                StoreError::Conflict {
                    field: conflict_field(&e.to_string()),
                }
            } else {
                backend(e)
            }
        })?;
        let mut created = user;
        created.id = result.inserted_id.as_object_id();
        Ok(created)
    }

    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        self.db
            .collection::<User>(USERS)
            .find_one(doc! { "phone": phone }, None)
            .await
            .map_err(backend)
    }

    async fn find_by_id(&self, id: ObjectId) -> StoreResult<Option<User>> {
        self.db
            .collection::<User>(USERS)
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend)
    }

    async fn activate(&self, id: ObjectId) -> StoreResult<()> {
        let result = self
            .db
            .collection::<User>(USERS)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "is_active": true, "updated_at": DateTime::now() } },
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn record_failed_attempt(&self, id: ObjectId) -> StoreResult<i32> {
        let updated = self
            .db
            .collection::<User>(USERS)
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$inc": { "failed_login_attempts": 1 },
                    "$set": { "updated_at": DateTime::now() },
                },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(backend)?
            .ok_or(StoreError::Missing)?;
        Ok(updated.failed_login_attempts)
    }

    async fn lock_until(&self, id: ObjectId, until: DateTime) -> StoreResult<()> {
        let result = self
            .db
            .collection::<User>(USERS)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "locked_until": until,
                    "failed_login_attempts": 0,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn clear_login_failures(&self, id: ObjectId) -> StoreResult<()> {
        let result = self
            .db
            .collection::<User>(USERS)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "failed_login_attempts": 0,
                    "locked_until": Bson::Null,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn replace_password(&self, id: ObjectId, password_hash: &str) -> StoreResult<()> {
        let result = self
            .db
            .collection::<User>(USERS)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "is_active": true,
                    "failed_login_attempts": 0,
                    "locked_until": Bson::Null,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoOtpLedger {
    db: Database,
}

impl MongoOtpLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtpLedger for MongoOtpLedger {
    async fn issue(&self, phone: &str, code: &str, now: DateTime) -> StoreResult<Otp> {
        let otp = Otp {
            id: None,
            phone: phone.to_string(),
            code: code.to_string(),
            created_at: now,
            is_used: false,
        };
        let result = self
            .db
            .collection::<Otp>(OTPS)
            .insert_one(&otp, None)
            .await
            .map_err(backend)?;
        let mut created = otp;
        created.id = result.inserted_id.as_object_id();
        Ok(created)
    }

    async fn find_valid(&self, phone: &str, code: &str) -> StoreResult<Option<Otp>> {
        self.db
            .collection::<Otp>(OTPS)
            .find_one(
                doc! { "phone": phone, "code": code, "is_used": false },
                FindOneOptions::builder()
                    .sort(doc! { "created_at": -1 })
                    .build(),
            )
            .await
            .map_err(backend)
    }

    async fn consume(&self, id: ObjectId) -> StoreResult<bool> {
        let updated = self
            .db
            .collection::<Otp>(OTPS)
            .find_one_and_update(
                doc! { "_id": id, "is_used": false },
                doc! { "$set": { "is_used": true } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(updated.is_some())
    }

    async fn count_since(&self, phone: &str, since: DateTime) -> StoreResult<u64> {
        self.db
            .collection::<Otp>(OTPS)
            .count_documents(
                doc! { "phone": phone, "created_at": { "$gte": since } },
                None,
            )
            .await
            .map_err(backend)
    }

    async fn most_recent(&self, phone: &str) -> StoreResult<Option<Otp>> {
        self.db
            .collection::<Otp>(OTPS)
            .find_one(
                doc! { "phone": phone },
                FindOneOptions::builder()
                    .sort(doc! { "created_at": -1 })
                    .build(),
            )
            .await
            .map_err(backend)
    }
}

#[derive(Clone)]
pub struct MongoKycStore {
    db: Database,
}

impl MongoKycStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KycStore for MongoKycStore {
    async fn upsert_submission(
        &self,
        user_id: ObjectId,
        documents: KycDocuments,
        now: DateTime,
    ) -> StoreResult<KycProfile> {
        let documents_bson = to_bson(&documents).map_err(|e| StoreError::Backend(e.to_string()))?;
        let status_bson = to_bson(&KycStatus::Submitted).map_err(|e| StoreError::Backend(e.to_string()))?;

        self.db
            .collection::<KycProfile>(KYC)
            .find_one_and_update(
                doc! { "user_id": user_id },
                doc! { "$set": {
                    "documents": documents_bson,
                    "status": status_bson,
                    "submitted_at": now,
                } },
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(backend)?
            .ok_or(StoreError::Missing)
    }

    async fn find_by_user(&self, user_id: ObjectId) -> StoreResult<Option<KycProfile>> {
        self.db
            .collection::<KycProfile>(KYC)
            .find_one(doc! { "user_id": user_id }, None)
            .await
            .map_err(backend)
    }
}
