//! Response shapes. Each operation picks the shape it returns; rows are never
//! serialized straight from storage where a view exists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use modhub_shared::types::auth::AuthUser;

use crate::models::*;
use crate::services::mods;
use crate::store::{Store, StoreResult};

const DELETED_USER: &str = "[deleted]";

fn name_of(names: &HashMap<Uuid, String>, id: Uuid) -> String {
    names.get(&id).cloned().unwrap_or_else(|| DELETED_USER.to_string())
}

// --- Mods ---

#[derive(Debug, Serialize)]
pub struct ModListItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub category: String,
    pub cover_image: Option<String>,
    pub version: String,
    pub status: ModStatus,
    pub download_count: i64,
    pub view_count: i64,
    pub average_rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConflictRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct ModDetail {
    #[serde(flatten)]
    pub summary: ModListItem,
    pub description: String,
    pub min_game_version: String,
    pub file_size: String,
    pub file_url: Option<String>,
    pub has_hosted_file: bool,
    pub is_approved: bool,
    pub approved_by: Option<Uuid>,
    pub images: Vec<ModImage>,
    pub download_links: Vec<DownloadLink>,
    pub versions: Vec<ModVersion>,
    pub game_versions: Vec<String>,
    pub required_dlcs: Vec<Dlc>,
    pub conflicts: Vec<ConflictRef>,
    pub updated_at: DateTime<Utc>,
}

fn list_item(
    m: Mod,
    authors: &HashMap<Uuid, String>,
    categories: &HashMap<Uuid, String>,
    covers: &mut HashMap<Uuid, String>,
) -> ModListItem {
    ModListItem {
        author: name_of(authors, m.author_id),
        category: categories.get(&m.category_id).cloned().unwrap_or_default(),
        cover_image: covers.remove(&m.id),
        status: m.status(),
        id: m.id,
        title: m.title,
        slug: m.slug,
        version: m.version,
        download_count: m.download_count,
        view_count: m.view_count,
        average_rating: m.average_rating,
        rating_count: m.rating_count,
        created_at: m.created_at,
    }
}

fn category_names(store: &dyn Store) -> StoreResult<HashMap<Uuid, String>> {
    Ok(store
        .list_categories()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

pub fn mod_list_items(store: &dyn Store, mods: Vec<Mod>) -> StoreResult<Vec<ModListItem>> {
    if mods.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = mods.iter().map(|m| m.id).collect();
    let author_ids: Vec<Uuid> = mods.iter().map(|m| m.author_id).collect();

    let authors = store.usernames(&author_ids)?;
    let categories = category_names(store)?;
    let mut covers = store.cover_images(&ids)?;

    Ok(mods
        .into_iter()
        .map(|m| list_item(m, &authors, &categories, &mut covers))
        .collect())
}

/// Conflict partners the caller is allowed to see.
pub fn conflict_refs(store: &dyn Store, mod_id: Uuid, caller: Option<&AuthUser>) -> StoreResult<Vec<ConflictRef>> {
    let ids = store.mod_conflicts(mod_id)?;
    Ok(store
        .find_mods(&ids)?
        .into_iter()
        .filter(|c| mods::can_view(c, caller))
        .map(|c| ConflictRef { id: c.id, title: c.title, slug: c.slug })
        .collect())
}

pub fn mod_detail(store: &dyn Store, m: Mod, caller: Option<&AuthUser>) -> StoreResult<ModDetail> {
    let conflicts = conflict_refs(store, m.id, caller)?;

    let images = store.mod_images(m.id)?;
    let download_links = store.download_links(m.id)?;
    let versions = store.mod_versions(m.id)?;
    let game_versions = store
        .mod_game_versions(m.id)?
        .into_iter()
        .map(|v| v.version)
        .collect();
    let required_dlcs = store.mod_required_dlcs(m.id)?;

    let description = m.description.clone();
    let min_game_version = m.min_game_version.clone();
    let file_size = m.file_size.clone();
    let file_url = m.file_url.clone();
    let has_hosted_file = m.file_location.is_some();
    let is_approved = m.is_approved;
    let approved_by = m.approved_by;
    let updated_at = m.updated_at;

    let mut summary = mod_list_items(store, vec![m])?;
    let summary = summary.pop().ok_or(crate::store::StoreError::NotFound)?;

    Ok(ModDetail {
        summary,
        description,
        min_game_version,
        file_size,
        file_url,
        has_hosted_file,
        is_approved,
        approved_by,
        images,
        download_links,
        versions,
        game_versions,
        required_dlcs,
        conflicts,
        updated_at,
    })
}

// --- Reviews ---

#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub id: Uuid,
    pub mod_id: Uuid,
    pub user: String,
    pub rating: i16,
    pub content: String,
    pub helpful_count: i64,
    pub is_helpful: bool,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn review_views(
    store: &dyn Store,
    reviews: Vec<Review>,
    caller: Option<&AuthUser>,
) -> StoreResult<Vec<ReviewView>> {
    let ids: Vec<Uuid> = reviews.iter().map(|r| r.id).collect();
    let user_ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();

    let names = store.usernames(&user_ids)?;
    let counts = store.helpful_counts(&ids)?;
    let voted = match caller {
        Some(user) => store.helpful_voted_by(&ids, user.id)?,
        None => Default::default(),
    };

    Ok(reviews
        .into_iter()
        .map(|r| ReviewView {
            user: name_of(&names, r.user_id),
            helpful_count: counts.get(&r.id).copied().unwrap_or(0),
            is_helpful: voted.contains(&r.id),
            is_owner: caller.is_some_and(|u| u.id == r.user_id),
            id: r.id,
            mod_id: r.mod_id,
            rating: r.rating,
            content: r.content,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
        .collect())
}

// --- Users ---

/// The caller's own profile.
#[derive(Debug, Serialize)]
pub struct PrivateProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub modder_status: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub country: String,
    pub website: String,
    pub discord_handle: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PrivateProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            modder_status: u.modder_status,
            bio: u.bio,
            avatar_url: u.avatar_url,
            country: u.country,
            website: u.website,
            discord_handle: u.discord_handle,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub modder_status: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub country: String,
    pub website: String,
    pub discord_handle: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            modder_status: u.modder_status,
            bio: u.bio,
            avatar_url: u.avatar_url,
            country: u.country,
            website: u.website,
            discord_handle: u.discord_handle,
            created_at: u.created_at,
        }
    }
}

// --- Forums ---

#[derive(Debug, Serialize)]
pub struct ThreadListItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub view_count: i64,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

pub fn thread_list_items(store: &dyn Store, threads: Vec<Thread>) -> StoreResult<Vec<ThreadListItem>> {
    let ids: Vec<Uuid> = threads.iter().map(|t| t.id).collect();
    let author_ids: Vec<Uuid> = threads.iter().map(|t| t.author_id).collect();
    let names = store.usernames(&author_ids)?;
    let counts = store.post_counts(&ids)?;

    Ok(threads
        .into_iter()
        .map(|t| ThreadListItem {
            author: name_of(&names, t.author_id),
            post_count: counts.get(&t.id).copied().unwrap_or(0),
            id: t.id,
            title: t.title,
            slug: t.slug,
            is_pinned: t.is_pinned,
            is_locked: t.is_locked,
            view_count: t.view_count,
            created_at: t.created_at,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct PostNode {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    pub depth: usize,
    pub like_count: i64,
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<PostNode>,
}

#[derive(Debug, Serialize)]
pub struct ThreadDetail {
    pub id: Uuid,
    pub category: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author: String,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub posts: Vec<PostNode>,
}
