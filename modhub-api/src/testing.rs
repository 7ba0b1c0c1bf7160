//! Fixtures shared by the unit tests.

use chrono::Utc;
use uuid::Uuid;

use modhub_shared::types::auth::{AuthUser, UserRole};

use crate::models::{Category, Mod, ModStatus, User};
use crate::store::{MemoryStore, NewModRecord, Store};

pub fn user(store: &MemoryStore, username: &str, role: UserRole) -> AuthUser {
    let now = Utc::now();
    let id = Uuid::now_v7();
    store
        .insert_user(&User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            role: role.as_str().to_string(),
            modder_status: "regular".into(),
            bio: String::new(),
            avatar_url: None,
            country: String::new(),
            website: String::new(),
            discord_handle: String::new(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    AuthUser { id, role, token_id: Uuid::now_v7() }
}

pub fn category(store: &MemoryStore, slug: &str) -> Category {
    if let Some(existing) = store.find_category_by_slug(slug).unwrap() {
        return existing;
    }
    let category = Category {
        id: Uuid::now_v7(),
        name: slug.to_string(),
        slug: slug.to_string(),
        description: String::new(),
        created_at: Utc::now(),
    };
    store.insert_category(&category).unwrap();
    category
}

pub fn mod_with(store: &MemoryStore, author: &AuthUser, title: &str, status: ModStatus) -> Mod {
    let now = Utc::now();
    let record = Mod {
        id: Uuid::now_v7(),
        author_id: author.id,
        category_id: category(store, "trucks").id,
        title: title.to_string(),
        slug: format!("{}-{}", crate::services::slug::slugify(title), Uuid::now_v7().simple()),
        description: format!("{title} description"),
        version: "1.0".into(),
        min_game_version: "1.0".into(),
        file_location: None,
        file_url: Some("https://files.example.com/mod.zip".into()),
        file_size: "12 MB".into(),
        status: status.as_str().to_string(),
        is_approved: status == ModStatus::Published,
        approved_by: None,
        download_count: 0,
        view_count: 0,
        average_rating: 0.0,
        rating_count: 0,
        created_at: now,
        updated_at: now,
    };
    store
        .insert_mod(&NewModRecord {
            record: record.clone(),
            game_version_ids: vec![],
            dlc_ids: vec![],
            links: vec![],
        })
        .unwrap();
    record
}

/// A published mod by a fresh author.
pub fn seed_mod(store: &MemoryStore, title: &str) -> Mod {
    let author = user(store, &unique_name("author"), UserRole::User);
    mod_with(store, &author, title, ModStatus::Published)
}

/// `{prefix}` plus the random tail of a v7 uuid.
pub fn unique_name(prefix: &str) -> String {
    let hex = Uuid::now_v7().simple().to_string();
    format!("{prefix}{}", &hex[20..])
}
