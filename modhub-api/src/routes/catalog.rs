use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use modhub_shared::errors::AppResult;
use modhub_shared::middleware::ModeratorUser;
use modhub_shared::types::ApiResponse;

use crate::models::{Category, Dlc, GameVersion, Tutorial};
use crate::services::catalog::{self, CategoryInput, DlcInput, GameVersionInput, TutorialInput};
use crate::AppState;

pub async fn list_categories(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    let categories = catalog::list_categories(state.store.as_ref())?;
    Ok(Json(ApiResponse::ok(categories)))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let category = catalog::get_category(state.store.as_ref(), &slug)?;
    Ok(Json(ApiResponse::ok(category)))
}

pub async fn create_category(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CategoryInput>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let category = catalog::create_category(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok(category)))
}

pub async fn list_game_versions(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<GameVersion>>>> {
    let versions = catalog::list_game_versions(state.store.as_ref())?;
    Ok(Json(ApiResponse::ok(versions)))
}

pub async fn create_game_version(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GameVersionInput>,
) -> AppResult<Json<ApiResponse<GameVersion>>> {
    let version = catalog::create_game_version(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok(version)))
}

pub async fn list_dlcs(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<Dlc>>>> {
    let dlcs = catalog::list_dlcs(state.store.as_ref())?;
    Ok(Json(ApiResponse::ok(dlcs)))
}

pub async fn create_dlc(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DlcInput>,
) -> AppResult<Json<ApiResponse<Dlc>>> {
    let dlc = catalog::create_dlc(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok(dlc)))
}

pub async fn list_tutorials(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<Tutorial>>>> {
    let tutorials = catalog::list_tutorials(state.store.as_ref())?;
    Ok(Json(ApiResponse::ok(tutorials)))
}

pub async fn create_tutorial(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TutorialInput>,
) -> AppResult<Json<ApiResponse<Tutorial>>> {
    let tutorial = catalog::create_tutorial(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok(tutorial)))
}
