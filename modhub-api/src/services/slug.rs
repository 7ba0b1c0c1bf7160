use uuid::Uuid;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};

use crate::store::{constraints, SlugScope, Store, StoreResult};

/// Attempts at inserting a generated slug before the conflict is surfaced.
pub const MAX_SLUG_ATTEMPTS: usize = 5;

const MAX_SLUG_LEN: usize = 100;

/// Lowercase, hyphen-separated ASCII. Non-ASCII characters are dropped and
/// any other ASCII character acts as a separator.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_ascii() {
            pending_hyphen = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug
}

/// Base candidate for `text`, or `{prefix}-{first 8 hex of id}` when the text
/// has nothing sluggable in it.
pub fn base_slug(text: &str, prefix: &str, id: Uuid) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        let hex = id.simple().to_string();
        format!("{prefix}-{}", &hex[..8])
    } else {
        slug
    }
}

/// First free candidate among `base`, `base-1`, `base-2`, ...
pub fn allocate(store: &dyn Store, scope: SlugScope, base: &str, exclude: Option<Uuid>) -> StoreResult<String> {
    if !store.slug_taken(scope, base, exclude)? {
        return Ok(base.to_string());
    }
    let mut n = 1u64;
    loop {
        let candidate = format!("{base}-{n}");
        if !store.slug_taken(scope, &candidate, exclude)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn constraint_for(scope: SlugScope) -> &'static str {
    match scope {
        SlugScope::Mods => constraints::MODS_SLUG,
        SlugScope::Threads => constraints::THREADS_SLUG,
        SlugScope::Categories => constraints::CATEGORIES_SLUG,
        SlugScope::ForumCategories => constraints::FORUM_CATEGORIES_SLUG,
        SlugScope::Dlcs => constraints::DLCS_SLUG,
    }
}

fn slug_taken_error(slug: &str) -> AppError {
    AppError::with_details(
        ErrorCode::SlugTaken,
        "slug is already in use",
        serde_json::json!({ "slug": slug }),
    )
}

/// Insert a row under a unique slug.
///
/// A caller-supplied slug is used as is and a collision is reported as
/// `SlugTaken`. Otherwise a slug is allocated from `base`, and a duplicate
/// raised by a concurrent insert triggers a fresh allocation.
pub fn insert_with_slug<T>(
    store: &dyn Store,
    scope: SlugScope,
    requested: Option<&str>,
    base: &str,
    mut insert: impl FnMut(String) -> StoreResult<T>,
) -> AppResult<T> {
    let constraint = constraint_for(scope);

    if let Some(slug) = requested {
        let slug = slugify(slug);
        if slug.is_empty() {
            return Err(AppError::Validation("slug must contain letters or digits".into()));
        }
        if store.slug_taken(scope, &slug, None)? {
            return Err(slug_taken_error(&slug));
        }
        return match insert(slug.clone()) {
            Ok(row) => Ok(row),
            Err(e) if e.is_duplicate_of(constraint) => Err(slug_taken_error(&slug)),
            Err(e) => Err(e.into()),
        };
    }

    let mut last = String::new();
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = allocate(store, scope, base, None)?;
        match insert(slug.clone()) {
            Ok(row) => return Ok(row),
            Err(e) if e.is_duplicate_of(constraint) => {
                tracing::debug!(slug = %slug, attempt, "slug taken concurrently, reallocating");
                last = slug;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(slug_taken_error(&last))
}

/// Re-check an explicit slug change against every row but the entity's own.
pub fn ensure_available(store: &dyn Store, scope: SlugScope, slug: &str, own_id: Uuid) -> AppResult<String> {
    let slug = slugify(slug);
    if slug.is_empty() {
        return Err(AppError::Validation("slug must contain letters or digits".into()));
    }
    if store.slug_taken(scope, &slug, Some(own_id))? {
        return Err(slug_taken_error(&slug));
    }
    Ok(slug)
}
