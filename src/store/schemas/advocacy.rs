//! Advocacy message schema.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::store::schemas::IntoIndexes;

/// Collection name for advocacy messages
pub const ADVOCACY_COLLECTION: &str = "advocacies";

/// Review status of an advocacy message. Transitions are admin-driven on the
/// server; this layer only writes the initial `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvocacyStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
}

impl AdvocacyStatus {
    /// Wire representation, matching the serde rename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvocacyDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub user_id: String,

    pub user_name: String,

    pub user_email: String,

    pub message: String,

    /// 1-3 tags, selection order preserved
    pub tags: Vec<String>,

    #[serde(default)]
    pub status: AdvocacyStatus,

    /// Whether the message came in through the voice flow
    #[serde(default)]
    pub is_voice_recording: bool,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl AdvocacyDoc {
    pub fn id_hex(&self) -> Option<String> {
        self.id.map(|id| id.to_hex())
    }
}

impl IntoIndexes for AdvocacyDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "userId": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("user_created_index".to_string()).build()),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
            (
                doc! { "tags": 1 },
                Some(IndexOptions::builder().name("tags_index".to_string()).build()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&AdvocacyStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&AdvocacyStatus::Reviewed).unwrap(), "\"reviewed\"");
        assert_eq!(
            serde_json::from_str::<AdvocacyStatus>("\"resolved\"").unwrap(),
            AdvocacyStatus::Resolved
        );
    }
}
