//! Community post schema.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::store::schemas::IntoIndexes;

/// Collection name for community posts
pub const POST_COLLECTION: &str = "posts";

/// A community content item.
///
/// `likes` and `comments` are derived counters maintained through the
/// gateway's atomic increment; the Like and Comment records are the primary
/// data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Display name shown on the post
    pub author: String,

    /// Id of the authoring user
    pub author_id: String,

    /// Avatar glyph or image reference
    #[serde(default)]
    pub avatar: String,

    pub content: String,

    /// Tag-style set; order is not significant
    #[serde(default)]
    pub tags: Vec<String>,

    /// Derived like counter
    #[serde(default)]
    pub likes: i64,

    /// Derived comment counter
    #[serde(default)]
    pub comments: i64,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl PostDoc {
    /// Store-assigned id as a hex string, once persisted.
    pub fn id_hex(&self) -> Option<String> {
        self.id.map(|id| id.to_hex())
    }
}

impl IntoIndexes for PostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "createdAt": -1 },
                Some(IndexOptions::builder().name("created_at_desc".to_string()).build()),
            ),
            (
                doc! { "authorId": 1 },
                Some(IndexOptions::builder().name("author_id_index".to_string()).build()),
            ),
            (
                doc! { "tags": 1 },
                Some(IndexOptions::builder().name("tags_index".to_string()).build()),
            ),
        ]
    }
}
