use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::AuthUser;

use crate::models::Collection;
use crate::services::mods;
use crate::store::Store;
use crate::views::{self, ModListItem};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCollectionInput {
    #[validate(length(min = 1, max = 200, message = "title must be between 1 and 200 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct CollectionModInput {
    pub mod_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub mods: Vec<ModListItem>,
}

fn collection_not_found() -> AppError {
    AppError::new(ErrorCode::CollectionNotFound, "collection not found")
}

/// Private collections are invisible to everyone but their owner.
fn load_visible(store: &dyn Store, id: Uuid, caller: Option<&AuthUser>) -> AppResult<Collection> {
    let collection = store.find_collection(id)?.ok_or_else(collection_not_found)?;
    if collection.is_public || caller.is_some_and(|u| u.id == collection.user_id) {
        Ok(collection)
    } else {
        Err(collection_not_found())
    }
}

fn load_owned(store: &dyn Store, id: Uuid, caller: &AuthUser) -> AppResult<Collection> {
    let collection = load_visible(store, id, Some(caller))?;
    if collection.user_id != caller.id {
        return Err(AppError::forbidden("only the owner can change this collection"));
    }
    Ok(collection)
}

pub fn create(store: &dyn Store, caller: &AuthUser, input: CreateCollectionInput) -> AppResult<Collection> {
    input.validate()?;
    let collection = Collection {
        id: Uuid::now_v7(),
        user_id: caller.id,
        title: input.title.trim().to_string(),
        description: input.description,
        is_public: input.is_public,
        created_at: Utc::now(),
    };
    store.insert_collection(&collection)?;
    Ok(collection)
}

pub fn mine(store: &dyn Store, caller: &AuthUser) -> AppResult<Vec<Collection>> {
    Ok(store.list_collections(caller.id, false)?)
}

/// Public collections of `username`, plus private ones when it is the caller.
pub fn for_user(store: &dyn Store, username: &str, caller: Option<&AuthUser>) -> AppResult<Vec<Collection>> {
    let owner = store
        .find_user_by_username(username)?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
    let public_only = !caller.is_some_and(|u| u.id == owner.id);
    Ok(store.list_collections(owner.id, public_only)?)
}

/// Only the mods the caller is allowed to see are listed.
pub fn detail(store: &dyn Store, id: Uuid, caller: Option<&AuthUser>) -> AppResult<CollectionDetail> {
    let collection = load_visible(store, id, caller)?;
    let ids = store.collection_mod_ids(id)?;
    let visible = store
        .find_mods(&ids)?
        .into_iter()
        .filter(|m| mods::can_view(m, caller))
        .collect();
    Ok(CollectionDetail { collection, mods: views::mod_list_items(store, visible)? })
}

pub fn add_mod(store: &dyn Store, caller: &AuthUser, id: Uuid, mod_id: Uuid) -> AppResult<CollectionDetail> {
    load_owned(store, id, caller)?;
    mods::load_visible(store, mod_id, Some(caller))?;
    store.add_collection_mod(id, mod_id)?;
    detail(store, id, Some(caller))
}

pub fn remove_mod(store: &dyn Store, caller: &AuthUser, id: Uuid, mod_id: Uuid) -> AppResult<CollectionDetail> {
    load_owned(store, id, caller)?;
    if !store.remove_collection_mod(id, mod_id)? {
        return Err(AppError::new(ErrorCode::ModNotFound, "mod is not in this collection"));
    }
    detail(store, id, Some(caller))
}

pub fn delete(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<()> {
    load_owned(store, id, caller)?;
    Ok(store.delete_collection(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModStatus;
    use crate::store::MemoryStore;
    use crate::testing;
    use modhub_shared::types::auth::UserRole;

    fn input(is_public: bool) -> CreateCollectionInput {
        CreateCollectionInput { title: "Favourites".into(), description: String::new(), is_public }
    }

    #[test]
    fn adding_twice_is_a_no_op() {
        let store = MemoryStore::new();
        let owner = testing::user(&store, &testing::unique_name("owner"), UserRole::User);
        let m = testing::seed_mod(&store, "Volvo FH");
        let c = create(&store, &owner, input(true)).unwrap();

        add_mod(&store, &owner, c.id, m.id).unwrap();
        let detail = add_mod(&store, &owner, c.id, m.id).unwrap();
        assert_eq!(detail.mods.len(), 1);
    }

    #[test]
    fn private_collections_are_hidden() {
        let store = MemoryStore::new();
        let owner = testing::user(&store, &testing::unique_name("owner"), UserRole::User);
        let other = testing::user(&store, &testing::unique_name("other"), UserRole::User);
        let private = create(&store, &owner, input(false)).unwrap();
        create(&store, &owner, input(true)).unwrap();

        let err = detail(&store, private.id, Some(&other)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CollectionNotFound);

        let username = store.find_user(owner.id).unwrap().unwrap().username;
        assert_eq!(for_user(&store, &username, None).unwrap().len(), 1);
        assert_eq!(for_user(&store, &username, Some(&owner)).unwrap().len(), 2);
    }

    #[test]
    fn only_the_owner_edits() {
        let store = MemoryStore::new();
        let owner = testing::user(&store, &testing::unique_name("owner"), UserRole::User);
        let other = testing::user(&store, &testing::unique_name("other"), UserRole::User);
        let c = create(&store, &owner, input(true)).unwrap();

        let err = delete(&store, &other, c.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
        delete(&store, &owner, c.id).unwrap();
    }

    #[test]
    fn hidden_mods_are_filtered_from_the_listing() {
        let store = MemoryStore::new();
        let owner = testing::user(&store, &testing::unique_name("owner"), UserRole::User);
        let own_pending = testing::mod_with(&store, &owner, "WIP", ModStatus::Pending);
        let c = create(&store, &owner, input(true)).unwrap();
        add_mod(&store, &owner, c.id, own_pending.id).unwrap();

        assert_eq!(detail(&store, c.id, Some(&owner)).unwrap().mods.len(), 1);
        assert!(detail(&store, c.id, None).unwrap().mods.is_empty());
    }
}
