use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Submitted,
    Approved,
    Rejected,
}

/// References to the three identity documents held in external storage.
/// The core records the pointers; document content never passes through it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KycDocuments {
    pub passport_photo: String,
    pub id_front: String,
    pub id_back: String,
}

/// At most one submission per identity. A re-submission overwrites the
/// documents and resets the status to `submitted`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KycProfile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub documents: KycDocuments,
    pub status: KycStatus,
    pub submitted_at: DateTime,
}

#[derive(Debug, Deserialize)]
pub struct SubmitKycDto {
    pub passport_photo: String,
    pub id_front: String,
    pub id_back: String,
}
