use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use modhub_shared::errors::AppResult;
use modhub_shared::middleware::{ModeratorUser, OptionalAuthUser};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};
use modhub_shared::types::ApiResponse;

use crate::extract::ClientInfo;
use crate::models::{ModImage, ModVersion, Report};
use crate::services::compatibility::{CompatibilityReport, GameState};
use crate::services::moderation::{self, ReportInput};
use crate::services::mods::{
    self, AddImageInput, ConflictInput, CreateModInput, DownloadTarget, ModFilters, NewVersionInput, TrackedDownload,
    UpdateModInput,
};
use crate::throttle;
use crate::views::{ConflictRef, ModDetail, ModListItem};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectInput {
    pub reason: Option<String>,
}

pub async fn list_mods(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(filters): Query<ModFilters>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ModListItem>>>> {
    let result = mods::list_mods(state.store.as_ref(), caller.as_ref(), &filters, &page)?;
    Ok(Json(ApiResponse::ok(result)))
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestionQuery>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let titles = mods::suggestions(state.store.as_ref(), &query.q)?;
    Ok(Json(ApiResponse::ok(titles)))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<ModListItem>>>> {
    let results = mods::search(state.store.as_ref(), &query.q, query.limit)?;
    Ok(Json(ApiResponse::ok(results)))
}

pub async fn get_mod(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ModDetail>>> {
    let detail = mods::get_mod(state.store.as_ref(), id, caller.as_ref())?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn create_mod(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateModInput>,
) -> AppResult<Json<ApiResponse<ModDetail>>> {
    let key = throttle::upload_key(&user.id.to_string());
    throttle::enforce(state.limiter.as_ref(), &key, state.config.upload_rule()).await?;

    let detail = mods::create_mod(state.store.as_ref(), &user, req)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn update_mod(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateModInput>,
) -> AppResult<Json<ApiResponse<ModDetail>>> {
    let detail = mods::update_mod(state.store.as_ref(), &user, id, req)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn delete_mod(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    mods::delete_mod(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok("mod deleted")))
}

// --- Workflow ---

pub async fn submit(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ModDetail>>> {
    let detail = mods::submit(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn approve(
    ModeratorUser(moderator): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ModDetail>>> {
    let detail = mods::approve(state.store.as_ref(), &moderator, id)?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn reject(
    ModeratorUser(moderator): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectInput>>,
) -> AppResult<Json<ApiResponse<ModDetail>>> {
    let reason = body.and_then(|Json(input)| input.reason);
    let detail = mods::reject(state.store.as_ref(), &moderator, id, reason)?;
    Ok(Json(ApiResponse::ok(detail)))
}

// --- Downloads ---

pub async fn download(
    OptionalAuthUser(caller): OptionalAuthUser,
    client: ClientInfo,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let key = throttle::download_key(&client.subject(caller.as_ref()));
    throttle::enforce(state.limiter.as_ref(), &key, state.config.download_rule()).await?;

    let response = match mods::download_target(state.store.as_ref(), id, caller.as_ref())? {
        DownloadTarget::Hosted(location) => Redirect::temporary(&location).into_response(),
        DownloadTarget::External(url) => Json(ApiResponse::ok(json!({ "url": url }))).into_response(),
    };
    Ok(response)
}

pub async fn track_download(
    OptionalAuthUser(caller): OptionalAuthUser,
    client: ClientInfo,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<TrackedDownload>>> {
    let tracked = mods::track_download(
        state.store.as_ref(),
        id,
        caller.as_ref(),
        &client,
        state.config.dedupe_downloads_by_ip,
    )?;
    Ok(Json(ApiResponse::ok(tracked)))
}

pub async fn compatibility_check(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(game): Json<GameState>,
) -> AppResult<Json<ApiResponse<CompatibilityReport>>> {
    let report = mods::compatibility_check(state.store.as_ref(), id, caller.as_ref(), &game)?;
    Ok(Json(ApiResponse::ok(report)))
}

pub async fn report(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReportInput>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let report = moderation::report_mod(state.store.as_ref(), caller.as_ref(), id, req)?;
    Ok(Json(ApiResponse::ok(report)))
}

// --- Images, versions, conflicts ---

pub async fn add_image(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddImageInput>,
) -> AppResult<Json<ApiResponse<ModImage>>> {
    let image = mods::add_image(state.store.as_ref(), &user, id, req)?;
    Ok(Json(ApiResponse::ok(image)))
}

pub async fn set_cover(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Vec<ModImage>>>> {
    let images = mods::set_cover(state.store.as_ref(), &user, id, image_id)?;
    Ok(Json(ApiResponse::ok(images)))
}

pub async fn delete_image(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    mods::delete_image(state.store.as_ref(), &user, id, image_id)?;
    Ok(Json(ApiResponse::ok("image deleted")))
}

pub async fn add_version(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewVersionInput>,
) -> AppResult<Json<ApiResponse<ModVersion>>> {
    let version = mods::add_version(state.store.as_ref(), &user, id, req)?;
    Ok(Json(ApiResponse::ok(version)))
}

pub async fn add_conflict(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConflictInput>,
) -> AppResult<Json<ApiResponse<Vec<ConflictRef>>>> {
    let conflicts = mods::add_conflict(state.store.as_ref(), &user, id, req.mod_id)?;
    Ok(Json(ApiResponse::ok(conflicts)))
}

pub async fn remove_conflict(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((id, other_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Vec<ConflictRef>>>> {
    let conflicts = mods::remove_conflict(state.store.as_ref(), &user, id, other_id)?;
    Ok(Json(ApiResponse::ok(conflicts)))
}
