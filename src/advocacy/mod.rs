//! Advocacy message submission.
//!
//! Drivers submit feedback messages categorized by one to three tags.
//! Validation happens client-side before any network call. Deletion removes
//! the remote record before the caller may prune its local list; a failed
//! delete has no rollback path, so it is never optimistic.

use std::sync::Arc;

use bson::doc;
use tracing::info;

use crate::session::AuthUser;
use crate::store::schemas::{AdvocacyDoc, AdvocacyStatus, ADVOCACY_COLLECTION};
use crate::store::{DocumentGateway, ListFilter};
use crate::types::{Result, WayrestError};

/// Most tags a message can carry.
pub const MAX_TAGS: usize = 3;

/// Bounded tag picker. Selection order is preserved; a fourth selection is
/// rejected with the selection unchanged.
#[derive(Debug, Clone, Default)]
pub struct TagSelection {
    tags: Vec<String>,
}

impl TagSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a tag's membership. Returns whether the selection changed; the
    /// only refusal is adding a tag beyond [`MAX_TAGS`].
    pub fn toggle(&mut self, tag: &str) -> bool {
        if let Some(position) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(position);
            return true;
        }
        if self.tags.len() >= MAX_TAGS {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

/// Filters for the admin-side listing.
#[derive(Debug, Clone, Default)]
pub struct AdvocacyQuery {
    pub status: Option<AdvocacyStatus>,
    pub tags: Vec<String>,
    pub limit: Option<i64>,
}

/// Advocacy submission service.
pub struct AdvocacyService {
    documents: Arc<DocumentGateway>,
}

impl AdvocacyService {
    pub fn new(documents: Arc<DocumentGateway>) -> Self {
        Self { documents }
    }

    /// Submit a message. Validation rejects before any network call; new
    /// messages always start as `pending`.
    pub async fn submit(
        &self,
        user: &AuthUser,
        message: &str,
        tags: &[String],
        is_voice_recording: bool,
    ) -> Result<String> {
        let message = validate_submission(message, tags)?;

        let user_name = if user.name.is_empty() {
            user.email.clone()
        } else {
            user.name.clone()
        };

        let fields = doc! {
            "userId": &user.id,
            "userName": user_name,
            "userEmail": &user.email,
            "message": message,
            "tags": tags,
            "status": AdvocacyStatus::Pending.as_str(),
            "isVoiceRecording": is_voice_recording,
        };

        let id = self.documents.create(ADVOCACY_COLLECTION, fields).await?;
        info!(advocacy_id = %id, user_id = %user.id, "Advocacy message submitted");
        Ok(id)
    }

    /// The user's own submissions, most recent first.
    pub async fn mine(&self, user_id: &str) -> Result<Vec<AdvocacyDoc>> {
        let filter = ListFilter::new().eq("userId", user_id);
        self.documents.list(ADVOCACY_COLLECTION, &filter).await
    }

    /// All submissions matching the query (admin view).
    pub async fn all(&self, query: &AdvocacyQuery) -> Result<Vec<AdvocacyDoc>> {
        let mut filter = ListFilter::new();
        if let Some(status) = query.status {
            filter = filter.eq("status", status.as_str());
        }
        if !query.tags.is_empty() {
            filter = filter.contains_any("tags", query.tags.clone());
        }
        if let Some(limit) = query.limit {
            filter = filter.limit(limit);
        }
        self.documents.list(ADVOCACY_COLLECTION, &filter).await
    }

    /// Delete a submission. The remote record is removed first; only a
    /// successful return permits pruning any local copy.
    pub async fn delete(&self, advocacy_id: &str) -> Result<()> {
        self.documents.delete(ADVOCACY_COLLECTION, advocacy_id).await
    }
}

/// Client-side submission checks. Returns the trimmed message.
fn validate_submission<'a>(message: &'a str, tags: &[String]) -> Result<&'a str> {
    let message = message.trim();
    if message.is_empty() {
        return Err(WayrestError::Validation(
            "Please add a message before submitting".into(),
        ));
    }
    if tags.is_empty() {
        return Err(WayrestError::Validation(
            "Please select at least one tag to categorize your feedback".into(),
        ));
    }
    if tags.len() > MAX_TAGS {
        return Err(WayrestError::Validation(format!(
            "You can select up to {MAX_TAGS} tags only"
        )));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::Client;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zero_tags_rejected() {
        assert!(matches!(
            validate_submission("message", &[]),
            Err(WayrestError::Validation(_))
        ));
    }

    #[test]
    fn test_three_tags_accepted_four_rejected() {
        let three = tags(&["safety", "parking", "pay"]);
        assert_eq!(validate_submission(" message ", &three).unwrap(), "message");

        let four = tags(&["safety", "parking", "pay", "hours"]);
        assert!(matches!(
            validate_submission("message", &four),
            Err(WayrestError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_message_rejected() {
        let one = tags(&["safety"]);
        assert!(matches!(
            validate_submission("   ", &one),
            Err(WayrestError::Validation(_))
        ));
    }

    #[test]
    fn test_fourth_tag_selection_leaves_selection_unchanged() {
        let mut selection = TagSelection::new();
        assert!(selection.toggle("safety"));
        assert!(selection.toggle("parking"));
        assert!(selection.toggle("pay"));

        // Fourth selection is refused and nothing changes
        assert!(!selection.toggle("hours"));
        assert_eq!(selection.tags(), &["safety", "parking", "pay"]);

        // Deselecting always works, and order is preserved
        assert!(selection.toggle("parking"));
        assert_eq!(selection.tags(), &["safety", "pay"]);
        assert!(selection.toggle("hours"));
        assert_eq!(selection.tags(), &["safety", "pay", "hours"]);
    }

    #[tokio::test]
    async fn test_invalid_submission_never_reaches_the_store() {
        // The gateway points at nothing; an attempted write would error, so
        // an immediate Validation return proves no call was made.
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let service =
            AdvocacyService::new(Arc::new(DocumentGateway::new(client.database("wayrest-test"))));

        let user = AuthUser {
            id: "user-1".into(),
            email: "dana@example.com".into(),
            name: "Dana".into(),
            email_verified: true,
        };

        let result = service.submit(&user, "message", &[], false).await;
        assert!(matches!(result, Err(WayrestError::Validation(_))));
    }
}
