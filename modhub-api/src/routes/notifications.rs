use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use modhub_shared::errors::AppResult;
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};
use modhub_shared::types::ApiResponse;

use crate::models::Notification;
use crate::services::notifications::{self, MarkedRead, UnreadCount};
use crate::AppState;

pub async fn list(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Notification>>>> {
    let result = notifications::list(state.store.as_ref(), &user, &page)?;
    Ok(Json(ApiResponse::ok(result)))
}

pub async fn unread_count(user: AuthUser, State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<UnreadCount>>> {
    let count = notifications::unread_count(state.store.as_ref(), &user)?;
    Ok(Json(ApiResponse::ok(count)))
}

pub async fn mark_read(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    notifications::mark_read(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok("notification marked as read")))
}

pub async fn mark_all_read(user: AuthUser, State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<MarkedRead>>> {
    let marked = notifications::mark_all_read(state.store.as_ref(), &user)?;
    Ok(Json(ApiResponse::ok(marked)))
}
