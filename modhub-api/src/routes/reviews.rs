use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use modhub_shared::errors::AppResult;
use modhub_shared::middleware::OptionalAuthUser;
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};
use modhub_shared::types::ApiResponse;

use crate::models::Report;
use crate::services::moderation::{self, ReportInput};
use crate::services::reviews::{self, CreateReviewInput, HelpfulVote, UpdateReviewInput};
use crate::views::ReviewView;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub mod_id: Uuid,
}

pub async fn list_reviews(
    OptionalAuthUser(caller): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewQuery>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ReviewView>>>> {
    let result = reviews::list_reviews(state.store.as_ref(), caller.as_ref(), query.mod_id, &page)?;
    Ok(Json(ApiResponse::ok(result)))
}

pub async fn create_review(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReviewInput>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    let review = reviews::create_review(state.store.as_ref(), &user, req)?;
    Ok(Json(ApiResponse::ok(review)))
}

pub async fn update_review(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReviewInput>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    let review = reviews::update_review(state.store.as_ref(), &user, id, req)?;
    Ok(Json(ApiResponse::ok(review)))
}

pub async fn delete_review(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    reviews::delete_review(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok("review deleted")))
}

pub async fn vote(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<HelpfulVote>>> {
    let vote = reviews::toggle_helpful(state.store.as_ref(), &user, id)?;
    Ok(Json(ApiResponse::ok(vote)))
}

pub async fn report(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReportInput>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let report = moderation::report_review(state.store.as_ref(), &user, id, req)?;
    Ok(Json(ApiResponse::ok(report)))
}
