//! Community posts and comments.
//!
//! Typed wrappers over the document gateway for the posts feed: creation,
//! filtered listing, live subscription, and comments with derived-counter
//! maintenance.

use std::sync::Arc;

use bson::doc;
use tracing::info;

use crate::session::AuthUser;
use crate::store::gateway::SnapshotCallback;
use crate::store::schemas::{CommentDoc, PostDoc, COMMENT_COLLECTION, POST_COLLECTION};
use crate::store::{DocumentGateway, ListFilter, Subscription};
use crate::types::{Result, WayrestError};

/// Filters for the posts feed. All clauses are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    /// Only posts authored by this user
    pub author_id: Option<String>,
    /// Posts carrying any of these tags
    pub tags: Vec<String>,
    pub limit: Option<i64>,
}

impl PostQuery {
    fn to_filter(&self) -> ListFilter {
        let mut filter = ListFilter::new();
        if let Some(author_id) = &self.author_id {
            filter = filter.eq("authorId", author_id.clone());
        }
        if !self.tags.is_empty() {
            filter = filter.contains_any("tags", self.tags.clone());
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        filter
    }
}

/// Community feed service.
pub struct CommunityService {
    documents: Arc<DocumentGateway>,
}

impl CommunityService {
    pub fn new(documents: Arc<DocumentGateway>) -> Self {
        Self { documents }
    }

    /// Create a post. Counters start at zero; the store assigns the id.
    pub async fn create_post(
        &self,
        author: &AuthUser,
        content: &str,
        tags: &[String],
        avatar: Option<&str>,
    ) -> Result<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(WayrestError::Validation("Post content is required".into()));
        }

        let display_name = display_name(author);
        let avatar = avatar
            .map(str::to_string)
            .unwrap_or_else(|| default_avatar(&display_name));

        let fields = doc! {
            "author": display_name,
            "authorId": &author.id,
            "avatar": avatar,
            "content": content,
            "tags": tags,
            "likes": 0_i64,
            "comments": 0_i64,
        };

        let id = self.documents.create(POST_COLLECTION, fields).await?;
        info!(post_id = %id, author_id = %author.id, "Post created");
        Ok(id)
    }

    /// Posts matching the query, most recent first.
    pub async fn posts(&self, query: &PostQuery) -> Result<Vec<PostDoc>> {
        self.documents.list(POST_COLLECTION, &query.to_filter()).await
    }

    pub async fn post(&self, post_id: &str) -> Result<Option<PostDoc>> {
        self.documents.get(POST_COLLECTION, post_id).await
    }

    /// Live feed: the callback receives the full matching result set on
    /// every remote change. The caller owns the teardown.
    pub fn subscribe_posts(
        &self,
        query: &PostQuery,
        on_snapshot: SnapshotCallback<PostDoc>,
    ) -> Subscription {
        self.documents
            .subscribe(POST_COLLECTION, query.to_filter(), on_snapshot)
    }

    /// Author-initiated edit; refreshes `updatedAt`.
    pub async fn update_post(&self, post_id: &str, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(WayrestError::Validation("Post content is required".into()));
        }
        self.documents
            .update(POST_COLLECTION, post_id, doc! { "content": content })
            .await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.documents.delete(POST_COLLECTION, post_id).await
    }

    /// Add a comment and bump the post's derived counter.
    pub async fn add_comment(
        &self,
        post_id: &str,
        author: &AuthUser,
        content: &str,
    ) -> Result<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(WayrestError::Validation("Comment content is required".into()));
        }

        let fields = doc! {
            "postId": post_id,
            "author": display_name(author),
            "authorId": &author.id,
            "content": content,
        };

        let id = self.documents.create(COMMENT_COLLECTION, fields).await?;
        self.documents
            .increment(POST_COLLECTION, post_id, "comments", 1)
            .await?;
        Ok(id)
    }

    /// Comments for a post, most recent first.
    pub async fn comments(&self, post_id: &str) -> Result<Vec<CommentDoc>> {
        let filter = ListFilter::new().eq("postId", post_id);
        self.documents.list(COMMENT_COLLECTION, &filter).await
    }
}

fn display_name(author: &AuthUser) -> String {
    if author.name.is_empty() {
        author.email.clone()
    } else {
        author.name.clone()
    }
}

/// Fallback avatar: the author's initial.
fn default_avatar(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "D".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use mongodb::Client;

    async fn offline_service() -> CommunityService {
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        CommunityService::new(Arc::new(DocumentGateway::new(client.database("wayrest-test"))))
    }

    fn author() -> AuthUser {
        AuthUser {
            id: "user-1".into(),
            email: "dana@example.com".into(),
            name: "Dana".into(),
            email_verified: true,
        }
    }

    #[tokio::test]
    async fn test_empty_content_rejected_before_store() {
        let service = offline_service().await;
        let result = service.create_post(&author(), "   ", &[], None).await;
        assert!(matches!(result, Err(WayrestError::Validation(_))));

        let result = service.add_comment("abc", &author(), "").await;
        assert!(matches!(result, Err(WayrestError::Validation(_))));
    }

    #[test]
    fn test_query_builds_conjunctive_filter() {
        let query = PostQuery {
            author_id: Some("user-1".into()),
            tags: vec!["parking".into()],
            limit: Some(10),
        };
        let filter = query.to_filter();
        assert_eq!(
            filter.to_document(),
            doc! { "authorId": "user-1", "tags": { "$in": ["parking"] } }
        );
        assert_eq!(filter.limit_value(), Some(10));
        assert_eq!(filter.sort_document(), doc! { "createdAt": -1 });
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut user = author();
        assert_eq!(display_name(&user), "Dana");
        user.name.clear();
        assert_eq!(display_name(&user), "dana@example.com");
    }

    #[test]
    fn test_default_avatar_is_initial() {
        assert_eq!(default_avatar("dana"), "D");
        assert_eq!(default_avatar(""), "D");
    }
}
