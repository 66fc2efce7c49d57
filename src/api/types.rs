//! Wire types for the secondary REST backend.
//!
//! The server aggregates wellness completions into the stats projection;
//! this client treats those numbers as authoritative and never recomputes
//! them locally.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Options bag for query-style endpoints. Absent keys are omitted from the
/// URL rather than sent empty.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
}

impl QueryOptions {
    /// Serialize the recognized keys that are present.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(lat) = self.lat {
            pairs.push(("lat", lat.to_string()));
        }
        if let Some(lng) = self.lng {
            pairs.push(("lng", lng.to_string()));
        }
        if let Some(radius) = self.radius {
            pairs.push(("radius", radius.to_string()));
        }
        pairs
    }
}

/// User profile in the secondary store. Independent lifecycle from the
/// document store's entities; nothing enforces integrity between the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quick_dial_number: Option<String>,
    #[serde(default)]
    pub preferences: Option<JsonValue>,
    #[serde(default)]
    pub streak_count: i64,
    #[serde(default)]
    pub total_points: i64,
}

/// Partial profile update; only present fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_dial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<JsonValue>,
}

/// Self-assessed fatigue level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatigueLevel {
    Low,
    Medium,
    High,
}

/// Fatigue self-assessment submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFatigueCheck {
    pub user_id: String,
    pub alertness_score: i32,
    pub fatigue_level: FatigueLevel,
    pub symptoms: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lng: Option<f64>,
}

/// A stored fatigue check, as returned by the history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueCheckRecord {
    pub id: String,
    pub user_id: String,
    pub alertness_score: i32,
    pub fatigue_level: FatigueLevel,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A wellness activity available for completion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessActivity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub points: i64,
}

/// Completion submission for a wellness activity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWellnessCompletion {
    pub user_id: String,
    pub activity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Append-only completion record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessCompletion {
    pub activity_id: String,
    pub user_id: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub points_awarded: i64,
}

/// Server-side stats projection; authoritative, never recomputed here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessStats {
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub streak_count: i64,
}

/// Community post in the secondary store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPost {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub author: Option<String>,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApiPost {
    pub user_id: String,
    pub author: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApiComment {
    pub user_id: String,
    pub author: String,
    pub content: String,
}

/// Parking location returned by the discovery endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingLocation {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub available_spots: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParkingLocation {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParkingReview {
    pub user_id: String,
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
