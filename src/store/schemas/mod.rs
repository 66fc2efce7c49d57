//! Document schemas for the community collections.
//!
//! Likes and comments live in child collections keyed by a `postId` field
//! with a compound index, rather than nested under their post.

pub mod advocacy;
pub mod comment;
pub mod like;
pub mod post;
pub mod user;

pub use advocacy::{AdvocacyDoc, AdvocacyStatus, ADVOCACY_COLLECTION};
pub use comment::{CommentDoc, COMMENT_COLLECTION};
pub use like::{LikeDoc, LIKE_COLLECTION};
pub use post::{PostDoc, POST_COLLECTION};
pub use user::{UserProfileDoc, USER_COLLECTION};

use bson::Document;
use mongodb::options::IndexOptions;

/// Trait for schemas that provide index definitions.
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}
