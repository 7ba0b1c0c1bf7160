//! Mod submissions: browsing, the status workflow, downloads and the
//! owner-maintained relations (images, versions, conflicts).

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};

use crate::extract::ClientInfo;
use crate::models::*;
use crate::services::compatibility::{self, CompatibilityReport, GameState, Requirements};
use crate::services::{moderation, slug};
use crate::store::{ModOrdering, ModQuery, NewModRecord, SlugScope, Store, StoreError, Visibility};
use crate::views::{self, ConflictRef, ModDetail, ModListItem};

pub const SUGGESTION_LIMIT: usize = 5;
const MIN_SUGGESTION_LEN: usize = 2;
const DEFAULT_SEARCH_LIMIT: u64 = 5;
const MAX_SEARCH_LIMIT: u64 = 20;

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct DownloadLinkInput {
    #[validate(length(min = 1, max = 100, message = "link name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(url(message = "link url must be a valid URL"))]
    pub url: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "file size must be at most 20 characters"))]
    pub file_size: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateModInput {
    #[validate(length(min = 3, max = 200, message = "title must be between 3 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    /// Category slug.
    pub category: String,
    #[serde(default = "default_version")]
    #[validate(length(min = 1, max = 20, message = "version must be between 1 and 20 characters"))]
    pub version: String,
    #[serde(default = "default_version")]
    #[validate(length(min = 1, max = 20, message = "minimum game version must be between 1 and 20 characters"))]
    pub min_game_version: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "file size must be at most 20 characters"))]
    pub file_size: String,
    #[validate(url(message = "file_url must be a valid URL"))]
    pub file_url: Option<String>,
    #[validate(url(message = "file_location must be a valid URL"))]
    pub file_location: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    /// DLC slugs.
    #[serde(default)]
    pub required_dlcs: Vec<String>,
    #[serde(default)]
    #[validate]
    pub download_links: Vec<DownloadLinkInput>,
    #[validate(length(max = 255, message = "slug must be at most 255 characters"))]
    pub slug: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateModInput {
    #[validate(length(min = 3, max = 200, message = "title must be between 3 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "description cannot be empty"))]
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20, message = "version must be between 1 and 20 characters"))]
    pub version: Option<String>,
    #[validate(length(min = 1, max = 20, message = "minimum game version must be between 1 and 20 characters"))]
    pub min_game_version: Option<String>,
    #[validate(length(max = 20, message = "file size must be at most 20 characters"))]
    pub file_size: Option<String>,
    #[validate(url(message = "file_url must be a valid URL"))]
    pub file_url: Option<String>,
    #[validate(url(message = "file_location must be a valid URL"))]
    pub file_location: Option<String>,
    #[validate(length(max = 255, message = "slug must be at most 255 characters"))]
    pub slug: Option<String>,
}

/// Query string of `GET /mods`.
#[derive(Debug, Default, Deserialize)]
pub struct ModFilters {
    pub category: Option<String>,
    pub game_version: Option<String>,
    pub author: Option<String>,
    pub min_rating: Option<f64>,
    pub status: Option<String>,
    pub q: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddImageInput {
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: String,
    #[serde(default)]
    pub is_cover: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewVersionInput {
    #[validate(length(min = 1, max = 20, message = "version number must be between 1 and 20 characters"))]
    pub version_number: String,
    #[serde(default)]
    pub changelog: String,
    #[validate(url(message = "file_url must be a valid URL"))]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictInput {
    pub mod_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// File in object storage; served as a redirect.
    Hosted(String),
    External(String),
}

#[derive(Debug, Serialize)]
pub struct TrackedDownload {
    pub download_count: i64,
    pub counted: bool,
}

// --- Access ---

pub fn visibility_for(caller: Option<&AuthUser>) -> Visibility {
    match caller {
        Some(user) if user.is_staff() => Visibility::All,
        Some(user) => Visibility::PublishedOrAuthor(user.id),
        None => Visibility::Published,
    }
}

pub fn can_view(m: &Mod, caller: Option<&AuthUser>) -> bool {
    m.is_published() || caller.is_some_and(|u| u.is_staff() || u.id == m.author_id)
}

fn mod_not_found() -> AppError {
    AppError::new(ErrorCode::ModNotFound, "mod not found")
}

fn find(store: &dyn Store, id: Uuid) -> AppResult<Mod> {
    store.find_mod(id)?.ok_or_else(mod_not_found)
}

/// Hidden mods look exactly like missing ones.
pub fn load_visible(store: &dyn Store, id: Uuid, caller: Option<&AuthUser>) -> AppResult<Mod> {
    let m = find(store, id)?;
    if can_view(&m, caller) {
        Ok(m)
    } else {
        Err(mod_not_found())
    }
}

fn load_editable(store: &dyn Store, id: Uuid, caller: &AuthUser) -> AppResult<Mod> {
    let m = load_visible(store, id, Some(caller))?;
    if m.author_id != caller.id && !caller.is_staff() {
        return Err(AppError::forbidden("only the author or staff can change this mod"));
    }
    Ok(m)
}

// --- Catalog references ---

fn category_by_slug(store: &dyn Store, slug: &str) -> AppResult<Category> {
    store.find_category_by_slug(slug)?.ok_or_else(|| {
        AppError::with_details(
            ErrorCode::ValidationError,
            "validation failed",
            serde_json::json!({ "category": [format!("unknown category '{slug}'")] }),
        )
    })
}

fn game_version_ids(store: &dyn Store, requested: &[String]) -> AppResult<Vec<Uuid>> {
    let known: HashMap<String, Uuid> = store
        .list_game_versions()?
        .into_iter()
        .map(|v| (v.version, v.id))
        .collect();

    let mut ids = Vec::with_capacity(requested.len());
    for version in requested {
        let id = known.get(version.trim()).copied().ok_or_else(|| {
            AppError::with_details(
                ErrorCode::UnknownGameVersion,
                format!("unknown game version '{version}'"),
                serde_json::json!({ "game_version": version }),
            )
        })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn dlc_ids(store: &dyn Store, requested: &[String]) -> AppResult<Vec<Uuid>> {
    let known: HashMap<String, Uuid> = store.list_dlcs()?.into_iter().map(|d| (d.slug, d.id)).collect();

    let mut ids = Vec::with_capacity(requested.len());
    for dlc in requested {
        let id = known.get(dlc.trim()).copied().ok_or_else(|| {
            AppError::with_details(
                ErrorCode::UnknownDlc,
                format!("unknown DLC '{dlc}'"),
                serde_json::json!({ "dlc": dlc }),
            )
        })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

// --- Browsing ---

pub fn list_mods(
    store: &dyn Store,
    caller: Option<&AuthUser>,
    filters: &ModFilters,
    page: &PaginationParams,
) -> AppResult<Paginated<ModListItem>> {
    let empty = || Ok(Paginated::new(Vec::new(), 0, page));
    let mut query = ModQuery::new(visibility_for(caller));

    if let Some(ordering) = filters.ordering.as_deref().filter(|o| !o.is_empty()) {
        query.ordering = ModOrdering::parse(ordering)
            .ok_or_else(|| AppError::bad_request(format!("unknown ordering '{ordering}'")))?;
    }
    if let Some(status) = filters.status.as_deref().filter(|s| !s.is_empty()) {
        query.status = Some(
            ModStatus::parse(status)
                .ok_or_else(|| AppError::bad_request(format!("unknown status '{status}'")))?,
        );
    }

    // Unknown references match nothing.
    if let Some(slug) = filters.category.as_deref().filter(|s| !s.is_empty()) {
        match store.find_category_by_slug(slug)? {
            Some(category) => query.category_id = Some(category.id),
            None => return empty(),
        }
    }
    if let Some(version) = filters.game_version.as_deref().filter(|s| !s.is_empty()) {
        match store.list_game_versions()?.into_iter().find(|v| v.version == version) {
            Some(v) => query.game_version_id = Some(v.id),
            None => return empty(),
        }
    }
    if let Some(username) = filters.author.as_deref().filter(|s| !s.is_empty()) {
        match store.find_user_by_username(username)? {
            Some(author) => query.author_id = Some(author.id),
            None => return empty(),
        }
    }

    query.min_rating = filters.min_rating;
    query.search = filters
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    query.offset = page.offset();
    query.limit = page.limit();

    let (rows, total) = store.list_mods(&query)?;
    let items = views::mod_list_items(store, rows)?;
    Ok(Paginated::new(items, total, page))
}

/// Detail view. Each read counts as a view.
pub fn get_mod(store: &dyn Store, id: Uuid, caller: Option<&AuthUser>) -> AppResult<ModDetail> {
    let mut m = load_visible(store, id, caller)?;
    m.view_count = store.increment_mod_views(id)?;
    metrics::counter!("mod_views_total").increment(1);
    Ok(views::mod_detail(store, m, caller)?)
}

/// Up to five published titles containing `q`; nothing for fragments under
/// two characters.
pub fn suggestions(store: &dyn Store, q: &str) -> AppResult<Vec<String>> {
    let q = q.trim();
    if q.chars().count() < MIN_SUGGESTION_LEN {
        return Ok(Vec::new());
    }
    Ok(store.suggest_mod_titles(q, SUGGESTION_LIMIT)?)
}

pub fn search(store: &dyn Store, q: &str, limit: Option<u64>) -> AppResult<Vec<ModListItem>> {
    let q = q.trim();
    if q.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = ModQuery::new(Visibility::Published);
    query.search = Some(q.to_string());
    query.limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);

    let (rows, _) = store.list_mods(&query)?;
    Ok(views::mod_list_items(store, rows)?)
}

// --- Submission workflow ---

pub fn create_mod(store: &dyn Store, caller: &AuthUser, input: CreateModInput) -> AppResult<ModDetail> {
    input.validate()?;

    let category = category_by_slug(store, input.category.trim())?;
    let game_version_ids = game_version_ids(store, &input.game_versions)?;
    let dlc_ids = dlc_ids(store, &input.required_dlcs)?;

    let id = Uuid::now_v7();
    let now = Utc::now();
    let status = if input.draft { ModStatus::Draft } else { ModStatus::Pending };
    let links: Vec<DownloadLink> = input
        .download_links
        .iter()
        .map(|l| DownloadLink {
            id: Uuid::now_v7(),
            mod_id: id,
            name: l.name.clone(),
            url: l.url.clone(),
            file_size: l.file_size.clone(),
        })
        .collect();

    let base = slug::base_slug(&format!("{} {}", input.title, input.version), "mod", id);
    let record = slug::insert_with_slug(store, SlugScope::Mods, input.slug.as_deref(), &base, |slug| {
        let record = Mod {
            id,
            author_id: caller.id,
            category_id: category.id,
            title: input.title.trim().to_string(),
            slug,
            description: input.description.clone(),
            version: input.version.trim().to_string(),
            min_game_version: input.min_game_version.trim().to_string(),
            file_location: input.file_location.clone(),
            file_url: input.file_url.clone(),
            file_size: input.file_size.clone(),
            status: status.as_str().to_string(),
            is_approved: false,
            approved_by: None,
            download_count: 0,
            view_count: 0,
            average_rating: 0.0,
            rating_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.insert_mod(&NewModRecord {
            record: record.clone(),
            game_version_ids: game_version_ids.clone(),
            dlc_ids: dlc_ids.clone(),
            links: links.clone(),
        })?;
        Ok(record)
    })?;

    tracing::info!(mod_id = %record.id, author_id = %caller.id, slug = %record.slug, status = %status, "mod submitted");
    Ok(views::mod_detail(store, record, Some(caller))?)
}

pub fn update_mod(store: &dyn Store, caller: &AuthUser, id: Uuid, input: UpdateModInput) -> AppResult<ModDetail> {
    input.validate()?;
    load_editable(store, id, caller)?;

    let category_id = match input.category.as_deref() {
        Some(slug) => Some(category_by_slug(store, slug.trim())?.id),
        None => None,
    };
    let slug = match input.slug.as_deref() {
        Some(requested) => Some(slug::ensure_available(store, SlugScope::Mods, requested, id)?),
        None => None,
    };

    let changes = ModChanges {
        category_id,
        title: input.title.map(|t| t.trim().to_string()),
        slug,
        description: input.description,
        version: input.version.map(|v| v.trim().to_string()),
        min_game_version: input.min_game_version.map(|v| v.trim().to_string()),
        file_location: input.file_location,
        file_url: input.file_url,
        file_size: input.file_size,
        updated_at: Some(Utc::now()),
    };
    let updated = store.update_mod(id, &changes)?;
    tracing::info!(mod_id = %id, editor_id = %caller.id, "mod updated");
    Ok(views::mod_detail(store, updated, Some(caller))?)
}

pub fn delete_mod(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<()> {
    let m = load_editable(store, id, caller)?;
    store.delete_mod(id)?;

    if m.author_id != caller.id {
        moderation::record_action(
            store,
            caller.id,
            "delete_mod",
            "mod",
            id,
            Some(serde_json::json!({ "title": m.title, "author_id": m.author_id })),
        )?;
    }
    tracing::info!(mod_id = %id, deleted_by = %caller.id, "mod deleted");
    Ok(())
}

fn invalid_transition(from: ModStatus, to: ModStatus) -> AppError {
    AppError::with_details(
        ErrorCode::InvalidStatusTransition,
        format!("cannot move a {from} mod to {to}"),
        serde_json::json!({ "from": from, "to": to }),
    )
}

fn transition(store: &dyn Store, m: &Mod, to: ModStatus, approver: Option<Uuid>) -> AppResult<Mod> {
    let change = StatusChange {
        status: to.as_str().to_string(),
        is_approved: to == ModStatus::Published,
        approved_by: approver,
        updated_at: Utc::now(),
    };
    let updated = store.set_mod_status(m.id, &change)?;
    tracing::info!(mod_id = %m.id, from = %m.status(), to = %to, "mod status changed");
    Ok(updated)
}

/// Author hands a draft or a rejected mod (back) to the review queue.
pub fn submit(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<ModDetail> {
    let m = load_visible(store, id, Some(caller))?;
    if m.author_id != caller.id {
        return Err(AppError::forbidden("only the author can submit this mod"));
    }
    match m.status() {
        ModStatus::Draft | ModStatus::Rejected => {}
        from => return Err(invalid_transition(from, ModStatus::Pending)),
    }
    let updated = transition(store, &m, ModStatus::Pending, None)?;
    Ok(views::mod_detail(store, updated, Some(caller))?)
}

pub fn approve(store: &dyn Store, moderator: &AuthUser, id: Uuid) -> AppResult<ModDetail> {
    let m = find(store, id)?;
    if m.status() != ModStatus::Pending {
        return Err(invalid_transition(m.status(), ModStatus::Published));
    }
    let updated = transition(store, &m, ModStatus::Published, Some(moderator.id))?;
    moderation::record_action(store, moderator.id, "approve_mod", "mod", id, None)?;
    Ok(views::mod_detail(store, updated, Some(moderator))?)
}

/// Rejected mods are kept; the author may fix and resubmit.
pub fn reject(store: &dyn Store, moderator: &AuthUser, id: Uuid, reason: Option<String>) -> AppResult<ModDetail> {
    let m = find(store, id)?;
    if m.status() != ModStatus::Pending {
        return Err(invalid_transition(m.status(), ModStatus::Rejected));
    }
    let updated = transition(store, &m, ModStatus::Rejected, None)?;
    let details = reason
        .filter(|r| !r.trim().is_empty())
        .map(|r| serde_json::json!({ "reason": r }));
    moderation::record_action(store, moderator.id, "reject_mod", "mod", id, details)?;
    Ok(views::mod_detail(store, updated, Some(moderator))?)
}

// --- Downloads ---

pub fn download_target(store: &dyn Store, id: Uuid, caller: Option<&AuthUser>) -> AppResult<DownloadTarget> {
    let m = find(store, id)?;
    if !can_view(&m, caller) {
        return Err(AppError::forbidden("this mod has not been approved yet"));
    }
    if let Some(location) = m.file_location.filter(|l| !l.is_empty()) {
        return Ok(DownloadTarget::Hosted(location));
    }
    if let Some(url) = m.file_url.filter(|u| !u.is_empty()) {
        return Ok(DownloadTarget::External(url));
    }
    Err(AppError::new(ErrorCode::FileNotAvailable, "no file is available for this mod"))
}

/// Log the download and bump the counter. With `dedupe_by_ip` a repeat
/// download from a logged address is recorded without being counted.
pub fn track_download(
    store: &dyn Store,
    id: Uuid,
    caller: Option<&AuthUser>,
    client: &ClientInfo,
    dedupe_by_ip: bool,
) -> AppResult<TrackedDownload> {
    load_visible(store, id, caller)?;
    let recorded = store.record_download(
        &DownloadLog {
            id: Uuid::now_v7(),
            mod_id: id,
            user_id: caller.map(|u| u.id),
            ip_address: client.ip.chars().take(45).collect(),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        },
        dedupe_by_ip,
    )?;

    if recorded.counted {
        metrics::counter!("mod_downloads_tracked_total").increment(1);
    }
    Ok(TrackedDownload { download_count: recorded.download_count, counted: recorded.counted })
}

// --- Compatibility ---

pub fn compatibility_check(
    store: &dyn Store,
    id: Uuid,
    caller: Option<&AuthUser>,
    state: &GameState,
) -> AppResult<CompatibilityReport> {
    let m = load_visible(store, id, caller)?;
    let conflicts = views::conflict_refs(store, id, caller)?
        .into_iter()
        .map(|c| (c.id, c.title))
        .collect();
    let requirements = Requirements {
        min_game_version: m.min_game_version,
        required_dlcs: store.mod_required_dlcs(id)?,
        conflicts,
    };
    Ok(compatibility::check(&requirements, state))
}

// --- Images ---

fn image_not_found(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::new(ErrorCode::ImageNotFound, "image not found"),
        other => other.into(),
    }
}

pub fn add_image(store: &dyn Store, caller: &AuthUser, id: Uuid, input: AddImageInput) -> AppResult<ModImage> {
    input.validate()?;
    load_editable(store, id, caller)?;
    let image = ModImage {
        id: Uuid::now_v7(),
        mod_id: id,
        image_url: input.image_url,
        is_cover: input.is_cover,
        created_at: Utc::now(),
    };
    store.insert_mod_image(&image)?;
    Ok(image)
}

pub fn set_cover(store: &dyn Store, caller: &AuthUser, id: Uuid, image_id: Uuid) -> AppResult<Vec<ModImage>> {
    load_editable(store, id, caller)?;
    store.set_cover_image(id, image_id).map_err(image_not_found)?;
    Ok(store.mod_images(id)?)
}

pub fn delete_image(store: &dyn Store, caller: &AuthUser, id: Uuid, image_id: Uuid) -> AppResult<()> {
    load_editable(store, id, caller)?;
    store.delete_mod_image(id, image_id).map_err(image_not_found)
}

// --- Versions ---

pub fn add_version(store: &dyn Store, caller: &AuthUser, id: Uuid, input: NewVersionInput) -> AppResult<ModVersion> {
    input.validate()?;
    load_editable(store, id, caller)?;
    let version = ModVersion {
        id: Uuid::now_v7(),
        mod_id: id,
        version_number: input.version_number.trim().to_string(),
        changelog: input.changelog,
        file_url: input.file_url,
        created_at: Utc::now(),
    };
    store.insert_mod_version(&version)?;
    tracing::info!(mod_id = %id, version = %version.version_number, "mod version published");
    Ok(version)
}

// --- Conflicts ---

pub fn add_conflict(store: &dyn Store, caller: &AuthUser, id: Uuid, other: Uuid) -> AppResult<Vec<ConflictRef>> {
    if id == other {
        return Err(AppError::new(ErrorCode::CannotConflictWithSelf, "a mod cannot conflict with itself"));
    }
    load_editable(store, id, caller)?;
    load_visible(store, other, Some(caller))?;
    store.add_mod_conflict(id, other)?;
    Ok(views::conflict_refs(store, id, Some(caller))?)
}

pub fn remove_conflict(store: &dyn Store, caller: &AuthUser, id: Uuid, other: Uuid) -> AppResult<Vec<ConflictRef>> {
    load_editable(store, id, caller)?;
    if !store.remove_mod_conflict(id, other)? {
        return Err(AppError::not_found("conflict not found"));
    }
    Ok(views::conflict_refs(store, id, Some(caller))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::compatibility::CompatibilityStatus;
    use crate::store::MemoryStore;
    use crate::testing;
    use modhub_shared::types::auth::UserRole;

    fn client(ip: &str) -> ClientInfo {
        ClientInfo { ip: ip.into(), user_agent: "test".into() }
    }

    fn create_input(title: &str) -> CreateModInput {
        CreateModInput {
            title: title.into(),
            description: "Adds trucks".into(),
            category: "trucks".into(),
            version: "1.2".into(),
            min_game_version: "1.49".into(),
            file_size: "40 MB".into(),
            file_url: Some("https://cdn.example.com/pack.zip".into()),
            file_location: None,
            game_versions: vec![],
            required_dlcs: vec![],
            download_links: vec![],
            slug: None,
            draft: false,
        }
    }

    #[test]
    fn visibility_depends_on_caller() {
        let store = MemoryStore::new();
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let stranger = testing::user(&store, &testing::unique_name("stranger"), UserRole::User);
        let staff = testing::user(&store, &testing::unique_name("staff"), UserRole::Moderator);
        let hidden = testing::mod_with(&store, &author, "Hidden Pack", ModStatus::Pending);
        testing::mod_with(&store, &author, "Public Pack", ModStatus::Published);

        let page = PaginationParams::default();
        let ids = |caller: Option<&AuthUser>| -> Vec<Uuid> {
            list_mods(&store, caller, &ModFilters::default(), &page)
                .unwrap()
                .items
                .into_iter()
                .map(|m| m.id)
                .collect()
        };

        assert!(!ids(None).contains(&hidden.id));
        assert!(!ids(Some(&stranger)).contains(&hidden.id));
        assert!(ids(Some(&author)).contains(&hidden.id));
        assert!(ids(Some(&staff)).contains(&hidden.id));
        assert_eq!(ids(None).len(), 1);
    }

    #[test]
    fn unknown_filter_reference_yields_empty_page() {
        let store = MemoryStore::new();
        testing::seed_mod(&store, "Volvo FH");

        let filters = ModFilters { category: Some("boats".into()), ..Default::default() };
        let page = list_mods(&store, None, &filters, &PaginationParams::default()).unwrap();
        assert_eq!(page.total, 0);

        let filters = ModFilters { ordering: Some("-title".into()), ..Default::default() };
        assert!(list_mods(&store, None, &filters, &PaginationParams::default()).is_err());
    }

    #[test]
    fn created_mods_wait_for_review_with_unique_slugs() {
        let store = MemoryStore::new();
        testing::category(&store, "trucks");
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);

        let first = create_mod(&store, &author, create_input("Heavy Haul")).unwrap();
        let second = create_mod(&store, &author, create_input("Heavy Haul")).unwrap();

        assert_eq!(first.summary.status, ModStatus::Pending);
        assert_eq!(first.summary.slug, "heavy-haul-1-2");
        assert_eq!(second.summary.slug, "heavy-haul-1-2-1");
        assert!(!first.is_approved);
    }

    #[test]
    fn requested_slug_collision_is_reported() {
        let store = MemoryStore::new();
        testing::category(&store, "trucks");
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);

        let mut input = create_input("Heavy Haul");
        input.slug = Some("haul".into());
        create_mod(&store, &author, input).unwrap();

        let mut input = create_input("Other");
        input.slug = Some("haul".into());
        let err = create_mod(&store, &author, input).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SlugTaken);
    }

    #[test]
    fn unknown_dlc_is_rejected() {
        let store = MemoryStore::new();
        testing::category(&store, "trucks");
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);

        let mut input = create_input("Heavy Haul");
        input.required_dlcs = vec!["atlantis".into()];
        let err = create_mod(&store, &author, input).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownDlc);
    }

    #[test]
    fn workflow_transitions() {
        let store = MemoryStore::new();
        testing::category(&store, "trucks");
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let staff = testing::user(&store, &testing::unique_name("staff"), UserRole::Admin);

        let mut input = create_input("Draft Pack");
        input.draft = true;
        let created = create_mod(&store, &author, input).unwrap();
        assert_eq!(created.summary.status, ModStatus::Draft);

        let err = approve(&store, &staff, created.summary.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStatusTransition);

        submit(&store, &author, created.summary.id).unwrap();
        let rejected = reject(&store, &staff, created.summary.id, Some("no screenshots".into())).unwrap();
        assert_eq!(rejected.summary.status, ModStatus::Rejected);

        submit(&store, &author, created.summary.id).unwrap();
        let published = approve(&store, &staff, created.summary.id).unwrap();
        assert_eq!(published.summary.status, ModStatus::Published);
        assert!(published.is_approved);
        assert_eq!(published.approved_by, Some(staff.id));

        let log = moderation::audit_log(&store, &PaginationParams::default()).unwrap();
        assert_eq!(log.total, 2);
    }

    #[test]
    fn strangers_cannot_edit() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let stranger = testing::user(&store, &testing::unique_name("stranger"), UserRole::User);

        let input = UpdateModInput { title: Some("Mine now".into()), ..Default::default() };
        let err = update_mod(&store, &stranger, m.id, input).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn detail_counts_views() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");

        get_mod(&store, m.id, None).unwrap();
        let detail = get_mod(&store, m.id, None).unwrap();
        assert_eq!(detail.summary.view_count, 2);
    }

    #[test]
    fn download_of_unapproved_mod_is_forbidden() {
        let store = MemoryStore::new();
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let m = testing::mod_with(&store, &author, "Pending Pack", ModStatus::Pending);

        let err = download_target(&store, m.id, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert_eq!(
            download_target(&store, m.id, Some(&author)).unwrap(),
            DownloadTarget::External("https://files.example.com/mod.zip".into())
        );
    }

    #[test]
    fn dedupe_logs_but_does_not_count_repeat_addresses() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");

        assert!(track_download(&store, m.id, None, &client("198.51.100.1"), true).unwrap().counted);
        let repeat = track_download(&store, m.id, None, &client("198.51.100.1"), true).unwrap();
        assert!(!repeat.counted);
        assert_eq!(repeat.download_count, 1);

        let other = track_download(&store, m.id, None, &client("198.51.100.2"), true).unwrap();
        assert_eq!(other.download_count, 2);

        let undeduped = track_download(&store, m.id, None, &client("198.51.100.1"), false).unwrap();
        assert_eq!(undeduped.download_count, 3);
    }

    #[test]
    fn compatibility_reads_declared_relations() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let rival = testing::seed_mod(&store, "Volvo FH Classic");
        let staff = testing::user(&store, &testing::unique_name("staff"), UserRole::Moderator);

        let err = add_conflict(&store, &staff, m.id, m.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CannotConflictWithSelf);
        add_conflict(&store, &staff, rival.id, m.id).unwrap();

        let state = GameState { game_version: "1.50".into(), dlcs: vec![], installed_mods: vec![rival.id] };
        let report = compatibility_check(&store, m.id, None, &state).unwrap();
        assert_eq!(report.status, CompatibilityStatus::Warning);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn unpublished_conflict_partners_stay_hidden() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, &testing::unique_name("alice"), UserRole::User);
        let bob = testing::user(&store, &testing::unique_name("bob"), UserRole::User);
        let staff = testing::user(&store, &testing::unique_name("staff"), UserRole::Moderator);
        let public = testing::mod_with(&store, &alice, "Scania Interior", ModStatus::Published);
        let drafted = testing::mod_with(&store, &alice, "Scania Sound", ModStatus::Pending);
        let secret = testing::mod_with(&store, &bob, "Secret Unreleased Pack", ModStatus::Pending);

        let err = add_conflict(&store, &bob, secret.id, drafted.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModNotFound);

        add_conflict(&store, &bob, secret.id, public.id).unwrap();

        assert!(get_mod(&store, public.id, None).unwrap().conflicts.is_empty());
        assert!(get_mod(&store, public.id, Some(&alice)).unwrap().conflicts.is_empty());
        let seen_by_staff = get_mod(&store, public.id, Some(&staff)).unwrap().conflicts;
        assert_eq!(seen_by_staff.len(), 1);
        assert_eq!(seen_by_staff[0].id, secret.id);

        let state = GameState { game_version: "1.50".into(), dlcs: vec![], installed_mods: vec![secret.id] };
        let report = compatibility_check(&store, public.id, None, &state).unwrap();
        assert_eq!(report.status, CompatibilityStatus::Compatible);
        assert!(report.issues.iter().all(|i| !i.message.contains("Secret")));
    }

    #[test]
    fn simultaneous_first_downloads_from_one_address_count_once() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");

        let counted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| track_download(&store, m.id, None, &client("198.51.100.9"), true).unwrap()))
                .collect();
            handles.into_iter().map(|h| usize::from(h.join().unwrap().counted)).sum()
        });

        assert_eq!(counted, 1);
        assert_eq!(store.find_mod(m.id).unwrap().unwrap().download_count, 1);
    }

    #[test]
    fn suggestions_need_two_characters() {
        let store = MemoryStore::new();
        testing::seed_mod(&store, "Volvo FH");

        assert!(suggestions(&store, "v").unwrap().is_empty());
        assert_eq!(suggestions(&store, "vo").unwrap(), vec!["Volvo FH".to_string()]);
    }

    #[test]
    fn new_cover_replaces_previous_one() {
        let store = MemoryStore::new();
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let m = testing::mod_with(&store, &author, "Volvo FH", ModStatus::Published);

        let first = add_image(&store, &author, m.id, AddImageInput {
            image_url: "https://img.example.com/1.png".into(),
            is_cover: true,
        })
        .unwrap();
        add_image(&store, &author, m.id, AddImageInput {
            image_url: "https://img.example.com/2.png".into(),
            is_cover: true,
        })
        .unwrap();

        let covers: Vec<_> = store.mod_images(m.id).unwrap().into_iter().filter(|i| i.is_cover).collect();
        assert_eq!(covers.len(), 1);
        assert_ne!(covers[0].id, first.id);

        let images = set_cover(&store, &author, m.id, first.id).unwrap();
        assert!(images.iter().any(|i| i.id == first.id && i.is_cover));

        let err = delete_image(&store, &author, m.id, Uuid::now_v7()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ImageNotFound);
    }

    #[test]
    fn new_version_becomes_current() {
        let store = MemoryStore::new();
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let m = testing::mod_with(&store, &author, "Volvo FH", ModStatus::Published);

        add_version(&store, &author, m.id, NewVersionInput {
            version_number: "1.1".into(),
            changelog: "New paint jobs".into(),
            file_url: None,
        })
        .unwrap();

        let detail = get_mod(&store, m.id, None).unwrap();
        assert_eq!(detail.summary.version, "1.1");
        assert_eq!(detail.versions.len(), 1);
    }
}
