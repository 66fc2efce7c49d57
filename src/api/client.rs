//! Authenticated client for the secondary REST backend.
//!
//! Every call attaches the stored API key as `x-api-key`. When no key is
//! cached the client attempts a one-time read from the secure store before
//! failing with `Unconfigured`. Non-success responses surface the
//! server-provided message, falling back to the HTTP status.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::types::{
    ApiPost, FatigueCheckRecord, NewApiComment, NewApiPost, NewFatigueCheck, NewParkingLocation,
    NewParkingReview, NewWellnessCompletion, ParkingLocation, ProfileUpdate, QueryOptions,
    UserProfile, WellnessActivity, WellnessCompletion, WellnessStats,
};
use crate::secure::{SecureStore, API_KEY_KEY};
use crate::types::{Result, WayrestError};

/// Path prefix for the mobile API surface.
const MOBILE_PREFIX: &str = "/api/mobile";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    error: String,
}

/// Authenticated JSON-over-HTTP client for the secondary backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    secure: Arc<SecureStore>,
    api_key: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64, secure: Arc<SecureStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into(),
            secure,
            api_key: RwLock::new(None),
        }
    }

    /// Store a new API key and use it for subsequent calls.
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        self.secure.set(API_KEY_KEY, key)?;
        let mut cached = self.api_key.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(key.to_string());
        Ok(())
    }

    /// The cached key, initialized once from the secure store.
    fn api_key(&self) -> Result<String> {
        {
            let cached = self.api_key.read().unwrap_or_else(|e| e.into_inner());
            if let Some(key) = cached.as_ref() {
                return Ok(key.clone());
            }
        }

        let stored = self.secure.get(API_KEY_KEY)?.ok_or_else(|| {
            WayrestError::Unconfigured("API key is absent; call set_api_key first".into())
        })?;

        let mut cached = self.api_key.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(stored.clone());
        Ok(stored)
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&impl Serialize>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if self.base_url.is_empty() {
            return Err(WayrestError::Unconfigured("API base URL is absent".into()));
        }
        let api_key = self.api_key()?;

        let url = format!("{}{}{}", self.base_url.trim_end_matches('/'), MOBILE_PREFIX, path);
        debug!(method = %method, url = %url, "API request");

        let mut builder = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WayrestError::RemoteUnavailable(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            let message = if body.error.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body.error
            };
            warn!(status = %status, url = %url, "API request rejected");
            return Err(WayrestError::Http(message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WayrestError::Http(format!("Malformed response: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.request(Method::GET, path, query, None::<&()>).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    async fn patch<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        self.request(Method::PATCH, path, &[], Some(body)).await
    }

    // ----- Profile -----

    pub async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.get(&format!("/profile/{user_id}"), &[]).await
    }

    pub async fn create_user_profile(&self, profile: &UserProfile) -> Result<UserProfile> {
        self.post("/profile", profile).await
    }

    pub async fn update_user_profile(
        &self,
        user_id: &str,
        updates: &ProfileUpdate,
    ) -> Result<UserProfile> {
        self.patch(&format!("/profile/{user_id}"), updates).await
    }

    // ----- Fatigue checks -----

    pub async fn submit_fatigue_check(&self, check: &NewFatigueCheck) -> Result<FatigueCheckRecord> {
        self.post("/fatigue-check", check).await
    }

    pub async fn fatigue_check_history(
        &self,
        user_id: &str,
        options: &QueryOptions,
    ) -> Result<Vec<FatigueCheckRecord>> {
        self.get(&format!("/fatigue-check/history/{user_id}"), &options.to_query_pairs())
            .await
    }

    // ----- Wellness -----

    pub async fn wellness_activities(&self, options: &QueryOptions) -> Result<Vec<WellnessActivity>> {
        self.get("/wellness/activities", &options.to_query_pairs()).await
    }

    pub async fn complete_wellness_activity(
        &self,
        completion: &NewWellnessCompletion,
    ) -> Result<WellnessCompletion> {
        self.post("/wellness/complete", completion).await
    }

    /// Server-aggregated stats for a user. The returned numbers are
    /// authoritative; callers must not recompute them from completions.
    pub async fn wellness_stats(&self, user_id: &str, period: &str) -> Result<WellnessStats> {
        let query = [("period", period.to_string())];
        self.get(&format!("/wellness/stats/{user_id}"), &query).await
    }

    // ----- Community (secondary store) -----

    pub async fn community_posts(&self, options: &QueryOptions) -> Result<Vec<ApiPost>> {
        self.get("/community/posts", &options.to_query_pairs()).await
    }

    pub async fn create_community_post(&self, post: &NewApiPost) -> Result<ApiPost> {
        self.post("/community/posts", post).await
    }

    pub async fn community_post(&self, post_id: &str) -> Result<ApiPost> {
        self.get(&format!("/community/posts/{post_id}"), &[]).await
    }

    pub async fn add_community_comment(
        &self,
        post_id: &str,
        comment: &NewApiComment,
    ) -> Result<ApiPost> {
        self.post(&format!("/community/posts/{post_id}"), comment).await
    }

    // ----- Parking -----

    pub async fn parking_locations(&self, options: &QueryOptions) -> Result<Vec<ParkingLocation>> {
        self.get("/parking/locations", &options.to_query_pairs()).await
    }

    pub async fn create_parking_location(
        &self,
        location: &NewParkingLocation,
    ) -> Result<ParkingLocation> {
        self.post("/parking/locations", location).await
    }

    pub async fn parking_location(&self, location_id: &str) -> Result<ParkingLocation> {
        self.get(&format!("/parking/locations/{location_id}"), &[]).await
    }

    pub async fn add_parking_review(
        &self,
        location_id: &str,
        review: &NewParkingReview,
    ) -> Result<ParkingLocation> {
        self.post(&format!("/parking/locations/{location_id}"), review).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> (ApiClient, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("wayrest-api-{}", uuid::Uuid::new_v4()));
        let secure = Arc::new(SecureStore::open(&dir, [8u8; 32]).unwrap());
        (ApiClient::new(base_url, 1_000, secure), dir)
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unconfigured() {
        let (client, dir) = test_client("http://localhost:1");
        let result = client.wellness_stats("user-1", "all").await;
        assert!(matches!(result, Err(WayrestError::Unconfigured(_))));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_base_url_is_unconfigured() {
        let (client, dir) = test_client("");
        client.set_api_key("sk-test").unwrap();
        let result = client.get_user_profile("user-1").await;
        assert!(matches!(result, Err(WayrestError::Unconfigured(_))));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_stored_key_initializes_client_once() {
        let dir = std::env::temp_dir().join(format!("wayrest-api-{}", uuid::Uuid::new_v4()));
        let secure = Arc::new(SecureStore::open(&dir, [8u8; 32]).unwrap());
        secure.set(API_KEY_KEY, "sk-stored").unwrap();

        let client = ApiClient::new("http://localhost:1", 1_000, secure);
        assert_eq!(client.api_key().unwrap(), "sk-stored");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_remote_unavailable() {
        let (client, dir) = test_client("http://127.0.0.1:1");
        client.set_api_key("sk-test").unwrap();
        let result = client.wellness_stats("user-1", "all").await;
        assert!(matches!(result, Err(WayrestError::RemoteUnavailable(_))));
        let _ = std::fs::remove_dir_all(dir);
    }
}
