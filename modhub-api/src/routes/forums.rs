use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use modhub_shared::errors::AppResult;
use modhub_shared::middleware::{ModeratorUser, OptionalAuthUser};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};
use modhub_shared::types::ApiResponse;

use crate::models::ForumCategory;
use crate::services::forums::{self, CreatePostInput, CreateThreadInput, ForumCategoryInput, PostLike, ThreadFilters, ThreadFlags};
use crate::views::{PostNode, ThreadDetail, ThreadListItem};
use crate::AppState;

pub async fn list_categories(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<ForumCategory>>>> {
    let categories = forums::list_categories(state.store.as_ref())?;
    Ok(Json(ApiResponse::ok(categories)))
}

pub async fn create_category(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForumCategoryInput>,
) -> AppResult<Json<ApiResponse<ForumCategory>>> {
    let category = forums::create_category(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok(category)))
}

pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<ThreadFilters>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ThreadListItem>>>> {
    let result = forums::list_threads(state.store.as_ref(), &filters, &page)?;
    Ok(Json(ApiResponse::ok(result)))
}

pub async fn create_thread(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateThreadInput>,
) -> AppResult<Json<ApiResponse<ThreadDetail>>> {
    let thread = forums::create_thread(state.store.as_ref(), &user, req)?;
    Ok(Json(ApiResponse::ok(thread)))
}

pub async fn get_thread(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ThreadDetail>>> {
    let thread = forums::get_thread(state.store.as_ref(), &slug, caller.as_ref())?;
    Ok(Json(ApiResponse::ok(thread)))
}

pub async fn update_thread(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(flags): Json<ThreadFlags>,
) -> AppResult<Json<ApiResponse<ThreadListItem>>> {
    let thread = forums::update_thread(state.store.as_ref(), &slug, flags)?;
    Ok(Json(ApiResponse::ok(thread)))
}

pub async fn create_post(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePostInput>,
) -> AppResult<Json<ApiResponse<PostNode>>> {
    let post = forums::create_post(state.store.as_ref(), &user, req)?;
    Ok(Json(ApiResponse::ok(post)))
}

pub async fn delete_post(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    forums::delete_post(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok("post deleted")))
}

pub async fn like_post(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PostLike>>> {
    let like = forums::toggle_like(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok(like)))
}
