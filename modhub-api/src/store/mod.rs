//! Persistence seam. Services only ever see `&dyn Store`; the PostgreSQL
//! backend is used in deployments and the in-memory backend in tests and
//! local development.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use modhub_shared::errors::{AppError, ErrorCode};

use crate::models::*;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("duplicate value violates {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_duplicate_of(&self, constraint: &str) -> bool {
        matches!(self, StoreError::Duplicate(name) if name == constraint)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::not_found("resource not found"),
            StoreError::Duplicate(constraint) => AppError::with_details(
                ErrorCode::Conflict,
                "resource already exists",
                serde_json::json!({ "constraint": constraint }),
            ),
            StoreError::Backend(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Unique constraint names, shared by both backends.
pub mod constraints {
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const MODS_SLUG: &str = "mods_slug_key";
    pub const THREADS_SLUG: &str = "threads_slug_key";
    pub const CATEGORIES_SLUG: &str = "categories_slug_key";
    pub const FORUM_CATEGORIES_SLUG: &str = "forum_categories_slug_key";
    pub const DLCS_SLUG: &str = "dlcs_slug_key";
    pub const GAME_VERSIONS_VERSION: &str = "game_versions_version_key";
    pub const REVIEWS_USER_MOD: &str = "reviews_user_id_mod_id_key";
    pub const PASSWORD_RESETS_TOKEN: &str = "password_resets_token_hash_key";
}

/// Tables whose rows carry a unique slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugScope {
    Mods,
    Threads,
    Categories,
    ForumCategories,
    Dlcs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    Published,
    PublishedOrAuthor(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOrderField {
    CreatedAt,
    DownloadCount,
    AverageRating,
    ViewCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModOrdering {
    pub field: ModOrderField,
    pub descending: bool,
}

impl Default for ModOrdering {
    fn default() -> Self {
        Self { field: ModOrderField::CreatedAt, descending: true }
    }
}

impl ModOrdering {
    /// `created_at`, `-download_count`, ... Unknown fields yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let (descending, name) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let field = match name {
            "created_at" => ModOrderField::CreatedAt,
            "download_count" => ModOrderField::DownloadCount,
            "average_rating" => ModOrderField::AverageRating,
            "view_count" => ModOrderField::ViewCount,
            _ => return None,
        };
        Some(Self { field, descending })
    }
}

#[derive(Debug, Clone)]
pub struct ModQuery {
    pub visibility: Visibility,
    pub category_id: Option<Uuid>,
    pub game_version_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub min_rating: Option<f64>,
    pub status: Option<ModStatus>,
    pub search: Option<String>,
    pub ordering: ModOrdering,
    pub offset: u64,
    pub limit: u64,
}

impl ModQuery {
    pub fn new(visibility: Visibility) -> Self {
        Self {
            visibility,
            category_id: None,
            game_version_id: None,
            author_id: None,
            min_rating: None,
            status: None,
            search: None,
            ordering: ModOrdering::default(),
            offset: 0,
            limit: modhub_shared::types::pagination::DEFAULT_PER_PAGE,
        }
    }
}

/// A mod row plus the relation rows written with it in one transaction.
#[derive(Debug, Clone)]
pub struct NewModRecord {
    pub record: Mod,
    pub game_version_ids: Vec<Uuid>,
    pub dlc_ids: Vec<Uuid>,
    pub links: Vec<DownloadLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedDownload {
    pub download_count: i64,
    pub counted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingStats {
    pub sum: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyDownloads {
    pub day: NaiveDate,
    pub downloads: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryModCount {
    pub category: String,
    pub mod_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorStats {
    pub username: String,
    pub total_downloads: i64,
    pub mod_count: i64,
}

pub trait Store: Send + Sync {
    fn ping(&self) -> StoreResult<()>;

    // --- Users ---

    fn insert_user(&self, user: &User) -> StoreResult<()>;
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn usernames(&self, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, String>>;
    fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<User>;
    fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    fn insert_password_reset(&self, reset: &PasswordReset) -> StoreResult<()>;
    fn find_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>>;
    /// Returns false when the token had already been used.
    fn consume_password_reset(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    // --- Catalog ---

    fn list_categories(&self) -> StoreResult<Vec<Category>>;
    fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    fn find_category_by_slug(&self, slug: &str) -> StoreResult<Option<Category>>;
    fn insert_category(&self, category: &Category) -> StoreResult<()>;
    fn list_game_versions(&self) -> StoreResult<Vec<GameVersion>>;
    fn insert_game_version(&self, version: &GameVersion) -> StoreResult<()>;
    fn list_dlcs(&self) -> StoreResult<Vec<Dlc>>;
    fn insert_dlc(&self, dlc: &Dlc) -> StoreResult<()>;
    fn list_tutorials(&self) -> StoreResult<Vec<Tutorial>>;
    fn insert_tutorial(&self, tutorial: &Tutorial) -> StoreResult<()>;

    fn slug_taken(&self, scope: SlugScope, slug: &str, exclude: Option<Uuid>) -> StoreResult<bool>;

    // --- Mods ---

    fn insert_mod(&self, new: &NewModRecord) -> StoreResult<()>;
    fn find_mod(&self, id: Uuid) -> StoreResult<Option<Mod>>;
    fn find_mods(&self, ids: &[Uuid]) -> StoreResult<Vec<Mod>>;
    fn list_mods(&self, query: &ModQuery) -> StoreResult<(Vec<Mod>, u64)>;
    fn update_mod(&self, id: Uuid, changes: &ModChanges) -> StoreResult<Mod>;
    fn set_mod_status(&self, id: Uuid, change: &StatusChange) -> StoreResult<Mod>;
    /// Removes the mod and everything it owns.
    fn delete_mod(&self, id: Uuid) -> StoreResult<()>;
    /// Atomic `view_count = view_count + 1`; returns the new value.
    fn increment_mod_views(&self, id: Uuid) -> StoreResult<i64>;
    fn suggest_mod_titles(&self, fragment: &str, limit: usize) -> StoreResult<Vec<String>>;

    fn mod_game_versions(&self, mod_id: Uuid) -> StoreResult<Vec<GameVersion>>;
    fn mod_required_dlcs(&self, mod_id: Uuid) -> StoreResult<Vec<Dlc>>;
    fn mod_conflicts(&self, mod_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// Idempotent; the pair is unordered.
    fn add_mod_conflict(&self, a: Uuid, b: Uuid) -> StoreResult<()>;
    fn remove_mod_conflict(&self, a: Uuid, b: Uuid) -> StoreResult<bool>;

    fn mod_images(&self, mod_id: Uuid) -> StoreResult<Vec<ModImage>>;
    /// Cover image url per mod, falling back to the oldest image.
    fn cover_images(&self, mod_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, String>>;
    /// A cover insert clears the previous cover in the same transaction.
    fn insert_mod_image(&self, image: &ModImage) -> StoreResult<()>;
    fn set_cover_image(&self, mod_id: Uuid, image_id: Uuid) -> StoreResult<()>;
    fn delete_mod_image(&self, mod_id: Uuid, image_id: Uuid) -> StoreResult<()>;

    fn download_links(&self, mod_id: Uuid) -> StoreResult<Vec<DownloadLink>>;
    fn mod_versions(&self, mod_id: Uuid) -> StoreResult<Vec<ModVersion>>;
    /// Appends a history entry and sets the mod's current version.
    fn insert_mod_version(&self, version: &ModVersion) -> StoreResult<Mod>;

    /// Appends the log row and bumps `download_count` as one unit. With
    /// `dedupe_by_ip` the counter stays put when the address already has a row
    /// for this mod.
    fn record_download(&self, log: &DownloadLog, dedupe_by_ip: bool) -> StoreResult<RecordedDownload>;

    // --- Reviews ---

    fn insert_review(&self, review: &Review) -> StoreResult<()>;
    fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>>;
    fn list_reviews(&self, mod_id: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Review>, u64)>;
    fn update_review(&self, id: Uuid, rating: i16, content: &str, at: DateTime<Utc>) -> StoreResult<Review>;
    fn delete_review(&self, id: Uuid) -> StoreResult<()>;
    /// Sum and count of ratings above zero.
    fn rating_stats(&self, mod_id: Uuid) -> StoreResult<RatingStats>;
    fn set_mod_rating(&self, mod_id: Uuid, average: f64, count: i64) -> StoreResult<()>;
    /// Returns true when the vote was added, false when removed.
    fn toggle_helpful_vote(&self, review_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    fn helpful_counts(&self, review_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>>;
    fn helpful_voted_by(&self, review_ids: &[Uuid], user_id: Uuid) -> StoreResult<HashSet<Uuid>>;

    // --- Reports and moderation log ---

    fn insert_report(&self, report: &Report) -> StoreResult<()>;
    fn find_report(&self, id: Uuid) -> StoreResult<Option<Report>>;
    fn list_reports(&self, resolved: Option<bool>, offset: u64, limit: u64) -> StoreResult<(Vec<Report>, u64)>;
    /// `None` when the report was already resolved.
    fn resolve_report(&self, id: Uuid, by: Uuid, at: DateTime<Utc>) -> StoreResult<Option<Report>>;
    fn insert_moderation_action(&self, action: &ModerationAction) -> StoreResult<()>;
    fn list_moderation_actions(&self, offset: u64, limit: u64) -> StoreResult<(Vec<ModerationAction>, u64)>;

    // --- Forums ---

    fn list_forum_categories(&self) -> StoreResult<Vec<ForumCategory>>;
    fn find_forum_category(&self, id: Uuid) -> StoreResult<Option<ForumCategory>>;
    fn find_forum_category_by_slug(&self, slug: &str) -> StoreResult<Option<ForumCategory>>;
    fn insert_forum_category(&self, category: &ForumCategory) -> StoreResult<()>;

    fn insert_thread(&self, thread: &Thread) -> StoreResult<()>;
    fn find_thread(&self, id: Uuid) -> StoreResult<Option<Thread>>;
    fn find_thread_by_slug(&self, slug: &str) -> StoreResult<Option<Thread>>;
    /// Pinned first, then newest.
    fn list_threads(&self, category_id: Option<Uuid>, offset: u64, limit: u64) -> StoreResult<(Vec<Thread>, u64)>;
    fn update_thread_flags(&self, id: Uuid, is_pinned: Option<bool>, is_locked: Option<bool>) -> StoreResult<Thread>;
    fn increment_thread_views(&self, id: Uuid) -> StoreResult<i64>;
    fn post_counts(&self, thread_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>>;

    fn insert_post(&self, post: &ForumPost) -> StoreResult<()>;
    fn find_post(&self, id: Uuid) -> StoreResult<Option<ForumPost>>;
    /// Every post of the thread, oldest first.
    fn thread_posts(&self, thread_id: Uuid) -> StoreResult<Vec<ForumPost>>;
    /// Removes the post and its replies.
    fn delete_post(&self, id: Uuid) -> StoreResult<()>;
    /// Returns true when the like was added, false when removed.
    fn toggle_post_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    fn post_like_counts(&self, post_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>>;
    fn posts_liked_by(&self, post_ids: &[Uuid], user_id: Uuid) -> StoreResult<HashSet<Uuid>>;

    // --- Notifications ---

    fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;
    fn list_notifications(&self, recipient_id: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Notification>, u64)>;
    fn unread_notification_count(&self, recipient_id: Uuid) -> StoreResult<i64>;
    /// Only the recipient's own notification is touched; false otherwise.
    fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<bool>;
    fn mark_all_notifications_read(&self, recipient_id: Uuid) -> StoreResult<u64>;

    // --- Collections ---

    fn insert_collection(&self, collection: &Collection) -> StoreResult<()>;
    fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>>;
    fn list_collections(&self, user_id: Uuid, public_only: bool) -> StoreResult<Vec<Collection>>;
    fn delete_collection(&self, id: Uuid) -> StoreResult<()>;
    /// Idempotent.
    fn add_collection_mod(&self, collection_id: Uuid, mod_id: Uuid) -> StoreResult<()>;
    fn remove_collection_mod(&self, collection_id: Uuid, mod_id: Uuid) -> StoreResult<bool>;
    fn collection_mod_ids(&self, collection_id: Uuid) -> StoreResult<Vec<Uuid>>;

    // --- Analytics ---

    fn downloads_per_day(&self, since: DateTime<Utc>) -> StoreResult<Vec<DailyDownloads>>;
    fn mods_per_category(&self) -> StoreResult<Vec<CategoryModCount>>;
    fn top_authors(&self, limit: u64) -> StoreResult<Vec<AuthorStats>>;
}

/// Conflict pairs are stored with the smaller id first.
pub(crate) fn conflict_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b { (a, b) } else { (b, a) }
}
