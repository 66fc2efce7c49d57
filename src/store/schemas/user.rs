//! User profile document schema.
//!
//! Written by the managed auth backend so community and advocacy features can
//! attribute content by display name. Keyed by the identity provider's user
//! id, not the store-assigned document id.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::store::schemas::IntoIndexes;

/// Collection name for user profiles
pub const USER_COLLECTION: &str = "users";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Identity provider user id
    pub uid: String,

    pub email: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl IntoIndexes for UserProfileDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "uid": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("uid_unique".to_string())
                    .build(),
            ),
        )]
    }
}
