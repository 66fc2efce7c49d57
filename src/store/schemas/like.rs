//! Like relation schema.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::store::schemas::IntoIndexes;

/// Collection name for post likes
pub const LIKE_COLLECTION: &str = "post_likes";

/// Relation entity keyed by `(postId, userId)`.
///
/// Existence of this record is the sole source of truth for "liked"; the
/// post's like counter is a derived value adjusted alongside it, never
/// recomputed from these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub post_id: String,

    pub user_id: String,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl IntoIndexes for LikeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One like per user per post
            (
                doc! { "postId": 1, "userId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("post_user_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "postId": 1 },
                Some(IndexOptions::builder().name("post_id_index".to_string()).build()),
            ),
        ]
    }
}
