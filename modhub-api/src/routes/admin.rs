use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use modhub_shared::errors::AppResult;
use modhub_shared::middleware::ModeratorUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};
use modhub_shared::types::ApiResponse;

use crate::models::{ModerationAction, Report};
use crate::services::analytics::{self, Dashboard};
use crate::services::moderation;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportFilter {
    pub resolved: Option<bool>,
}

pub async fn list_reports(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ReportFilter>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Report>>>> {
    let result = moderation::list_reports(state.store.as_ref(), filter.resolved, &page)?;
    Ok(Json(ApiResponse::ok(result)))
}

pub async fn resolve_report(
    ModeratorUser(moderator): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let report = moderation::resolve_report(state.store.as_ref(), &moderator, id)?;
    Ok(Json(ApiResponse::ok(report)))
}

pub async fn audit_log(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ModerationAction>>>> {
    let result = moderation::audit_log(state.store.as_ref(), &page)?;
    Ok(Json(ApiResponse::ok(result)))
}

pub async fn dashboard(
    ModeratorUser(_staff): ModeratorUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Dashboard>>> {
    let dashboard = analytics::dashboard(state.store.as_ref())?;
    Ok(Json(ApiResponse::ok(dashboard)))
}
