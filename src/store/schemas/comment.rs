//! Post comment schema.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::store::schemas::IntoIndexes;

/// Collection name for post comments
pub const COMMENT_COLLECTION: &str = "post_comments";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub post_id: String,

    pub author: String,

    pub author_id: String,

    pub content: String,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "postId": 1, "createdAt": -1 },
            Some(IndexOptions::builder().name("post_created_index".to_string()).build()),
        )]
    }
}
