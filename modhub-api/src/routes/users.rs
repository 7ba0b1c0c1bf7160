use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use modhub_shared::errors::AppResult;
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::ApiResponse;

use crate::services::users::{self, ProfileInput, RegisterInput, ResetConfirmInput, ResetRequestInput};
use crate::views::{PrivateProfile, PublicProfile};
use crate::AppState;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterInput>,
) -> AppResult<Json<ApiResponse<PrivateProfile>>> {
    let profile = users::register(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn me(user: AuthUser, State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<PrivateProfile>>> {
    let profile = users::me(state.store.as_ref(), &user)?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn update_me(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProfileInput>,
) -> AppResult<Json<ApiResponse<PrivateProfile>>> {
    let profile = users::update_me(state.store.as_ref(), &user, req)?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn public_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<PublicProfile>>> {
    let profile = users::public_profile(state.store.as_ref(), &username)?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequestInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    let message = users::request_password_reset(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.reset_settings(),
        req,
    )?;
    Ok(Json(ApiResponse::ok_with_message((), message)))
}

pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetConfirmInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    let message = users::confirm_password_reset(state.store.as_ref(), req)?;
    Ok(Json(ApiResponse::ok_with_message((), message)))
}
