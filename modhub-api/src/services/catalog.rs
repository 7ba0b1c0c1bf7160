//! Reference data maintained by staff: mod categories, game versions, DLCs
//! and video tutorials.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Category, Dlc, GameVersion, Tutorial};
use crate::services::slug;
use crate::store::{constraints, SlugScope, Store};

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 120, message = "slug must be at most 120 characters"))]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GameVersionInput {
    #[validate(length(min = 1, max = 20, message = "version must be between 1 and 20 characters"))]
    pub version: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DlcInput {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 120, message = "slug must be at most 120 characters"))]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TutorialInput {
    #[validate(length(min = 1, max = 200, message = "title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(url(message = "video_url must be a valid URL"))]
    pub video_url: String,
    #[serde(default)]
    pub description: String,
}

pub fn list_categories(store: &dyn Store) -> AppResult<Vec<Category>> {
    Ok(store.list_categories()?)
}

pub fn get_category(store: &dyn Store, slug: &str) -> AppResult<Category> {
    store
        .find_category_by_slug(slug)?
        .ok_or_else(|| AppError::new(ErrorCode::CategoryNotFound, "category not found"))
}

pub fn create_category(store: &dyn Store, input: CategoryInput) -> AppResult<Category> {
    input.validate()?;
    let id = Uuid::now_v7();
    let base = slug::base_slug(&input.name, "category", id);

    let category = slug::insert_with_slug(store, SlugScope::Categories, input.slug.as_deref(), &base, |slug| {
        let category = Category {
            id,
            name: input.name.trim().to_string(),
            slug,
            description: input.description.clone(),
            created_at: Utc::now(),
        };
        store.insert_category(&category)?;
        Ok(category)
    })?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok(category)
}

/// Sorted oldest to newest release.
pub fn list_game_versions(store: &dyn Store) -> AppResult<Vec<GameVersion>> {
    let mut versions = store.list_game_versions()?;
    versions.sort_by(|a, b| super::compatibility::compare_versions(&a.version, &b.version));
    Ok(versions)
}

pub fn create_game_version(store: &dyn Store, input: GameVersionInput) -> AppResult<GameVersion> {
    input.validate()?;
    let version = GameVersion { id: Uuid::now_v7(), version: input.version.trim().to_string() };
    store.insert_game_version(&version).map_err(|e| {
        if e.is_duplicate_of(constraints::GAME_VERSIONS_VERSION) {
            AppError::new(ErrorCode::GameVersionExists, format!("game version {} already exists", version.version))
        } else {
            e.into()
        }
    })?;
    Ok(version)
}

pub fn list_dlcs(store: &dyn Store) -> AppResult<Vec<Dlc>> {
    Ok(store.list_dlcs()?)
}

pub fn create_dlc(store: &dyn Store, input: DlcInput) -> AppResult<Dlc> {
    input.validate()?;
    let id = Uuid::now_v7();
    let base = slug::base_slug(&input.name, "dlc", id);

    slug::insert_with_slug(store, SlugScope::Dlcs, input.slug.as_deref(), &base, |slug| {
        let dlc = Dlc { id, name: input.name.trim().to_string(), slug };
        store.insert_dlc(&dlc)?;
        Ok(dlc)
    })
}

/// Newest first.
pub fn list_tutorials(store: &dyn Store) -> AppResult<Vec<Tutorial>> {
    Ok(store.list_tutorials()?)
}

pub fn create_tutorial(store: &dyn Store, input: TutorialInput) -> AppResult<Tutorial> {
    input.validate()?;
    let tutorial = Tutorial {
        id: Uuid::now_v7(),
        title: input.title.trim().to_string(),
        video_url: input.video_url,
        description: input.description,
        created_at: Utc::now(),
    };
    store.insert_tutorial(&tutorial)?;
    Ok(tutorial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn category_slug_comes_from_name() {
        let store = MemoryStore::new();
        let input = CategoryInput { name: "Trucks & Trailers".into(), slug: None, description: String::new() };
        let category = create_category(&store, input).unwrap();
        assert_eq!(category.slug, "trucks-trailers");
        assert_eq!(get_category(&store, "trucks-trailers").unwrap().id, category.id);

        let err = get_category(&store, "boats").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CategoryNotFound);
    }

    #[test]
    fn duplicate_game_version_conflicts() {
        let store = MemoryStore::new();
        create_game_version(&store, GameVersionInput { version: "1.50".into() }).unwrap();
        let err = create_game_version(&store, GameVersionInput { version: "1.50".into() }).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GameVersionExists);
    }

    #[test]
    fn game_versions_sort_numerically() {
        let store = MemoryStore::new();
        for v in ["1.10", "1.9", "1.49"] {
            create_game_version(&store, GameVersionInput { version: v.into() }).unwrap();
        }
        let versions: Vec<String> = list_game_versions(&store).unwrap().into_iter().map(|v| v.version).collect();
        assert_eq!(versions, vec!["1.9", "1.10", "1.49"]);
    }

    #[test]
    fn dlc_slug_is_deduplicated() {
        let store = MemoryStore::new();
        let first = create_dlc(&store, DlcInput { name: "Iberia".into(), slug: None }).unwrap();
        let second = create_dlc(&store, DlcInput { name: "Iberia".into(), slug: None }).unwrap();
        assert_eq!(first.slug, "iberia");
        assert_eq!(second.slug, "iberia-1");
    }
}
