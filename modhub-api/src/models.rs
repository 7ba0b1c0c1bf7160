use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    categories, collections, dlcs, download_links, download_logs, forum_categories, forum_posts,
    game_versions, mod_images, mod_versions, moderation_actions, mods, notifications,
    password_resets, reports, reviews, threads, tutorials, users,
};

// --- User ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub modder_status: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub country: String,
    pub website: String,
    pub discord_handle: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct ProfileChanges {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub discord_handle: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = password_resets)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- Catalog ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = game_versions)]
pub struct GameVersion {
    pub id: Uuid,
    pub version: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = dlcs)]
pub struct Dlc {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = tutorials)]
pub struct Tutorial {
    pub id: Uuid,
    pub title: String,
    pub video_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// --- Mod ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModStatus {
    Draft,
    Pending,
    Published,
    Rejected,
}

impl ModStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModStatus::Draft => "draft",
            ModStatus::Pending => "pending",
            ModStatus::Published => "published",
            ModStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ModStatus::Draft),
            "pending" => Some(ModStatus::Pending),
            "published" => Some(ModStatus::Published),
            "rejected" => Some(ModStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = mods)]
pub struct Mod {
    pub id: Uuid,
    pub author_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub version: String,
    pub min_game_version: String,
    pub file_location: Option<String>,
    pub file_url: Option<String>,
    pub file_size: String,
    pub status: String,
    pub is_approved: bool,
    pub approved_by: Option<Uuid>,
    pub download_count: i64,
    pub view_count: i64,
    pub average_rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mod {
    /// The status column is constrained to the four known values.
    pub fn status(&self) -> ModStatus {
        ModStatus::parse(&self.status).unwrap_or(ModStatus::Pending)
    }

    pub fn is_published(&self) -> bool {
        self.status() == ModStatus::Published
    }
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = mods)]
pub struct ModChanges {
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub min_game_version: Option<String>,
    pub file_location: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = mods, treat_none_as_null = true)]
pub struct StatusChange {
    pub status: String,
    pub is_approved: bool,
    pub approved_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = mod_images)]
pub struct ModImage {
    pub id: Uuid,
    pub mod_id: Uuid,
    pub image_url: String,
    pub is_cover: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = download_links)]
pub struct DownloadLink {
    pub id: Uuid,
    pub mod_id: Uuid,
    pub name: String,
    pub url: String,
    pub file_size: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = mod_versions)]
pub struct ModVersion {
    pub id: Uuid,
    pub mod_id: Uuid,
    pub version_number: String,
    pub changelog: String,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = download_logs)]
pub struct DownloadLog {
    pub id: Uuid,
    pub mod_id: Uuid,
    pub user_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

// --- Review ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = reviews)]
pub struct Review {
    pub id: Uuid,
    pub mod_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Moderation ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = reports)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Option<Uuid>,
    pub target_type: String,
    pub mod_id: Option<Uuid>,
    pub review_id: Option<Uuid>,
    pub reason: String,
    pub details: String,
    pub resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = moderation_actions)]
pub struct ModerationAction {
    pub id: Uuid,
    pub moderator_id: Uuid,
    pub action: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// --- Forums ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = forum_categories)]
pub struct ForumCategory {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = threads)]
pub struct Thread {
    pub id: Uuid,
    pub category_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = forum_posts)]
pub struct ForumPost {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// --- Notification ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// --- Collection ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = collections)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}
