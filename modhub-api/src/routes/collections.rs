use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use modhub_shared::errors::AppResult;
use modhub_shared::middleware::OptionalAuthUser;
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::ApiResponse;

use crate::models::Collection;
use crate::services::collections::{self, CollectionDetail, CollectionModInput, CreateCollectionInput};
use crate::AppState;

pub async fn create(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionInput>,
) -> AppResult<Json<ApiResponse<Collection>>> {
    let collection = collections::create(state.store.as_ref(), &user, req)?;
    Ok(Json(ApiResponse::ok(collection)))
}

pub async fn mine(user: AuthUser, State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<Collection>>>> {
    let owned = collections::mine(state.store.as_ref(), &user)?;
    Ok(Json(ApiResponse::ok(owned)))
}

pub async fn for_user(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<Collection>>>> {
    let listed = collections::for_user(state.store.as_ref(), &username, caller.as_ref())?;
    Ok(Json(ApiResponse::ok(listed)))
}

pub async fn detail(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CollectionDetail>>> {
    let detail = collections::detail(state.store.as_ref(), id, caller.as_ref())?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn add_mod(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CollectionModInput>,
) -> AppResult<Json<ApiResponse<CollectionDetail>>> {
    let detail = collections::add_mod(state.store.as_ref(), &user, id, req.mod_id)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn remove_mod(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((id, mod_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<CollectionDetail>>> {
    let detail = collections::remove_mod(state.store.as_ref(), &user, id, mod_id)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn delete(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    collections::delete(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok("collection deleted")))
}
