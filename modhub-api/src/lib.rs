pub mod config;
pub mod extract;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;
pub mod throttle;
pub mod views;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use modhub_shared::clients::redis::RedisClient;
use modhub_shared::middleware::{metrics_middleware, panic_response};

use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::store::Store;
use crate::throttle::RateLimiter;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    pub limiter: Arc<dyn RateLimiter>,
    pub mailer: Arc<dyn Mailer>,
    pub redis: Option<RedisClient>,
    /// Absent when no recorder is installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    use routes::*;

    let mod_routes = Router::new()
        .route("/", get(mods::list_mods).post(mods::create_mod))
        .route("/suggestions", get(mods::suggestions))
        .route("/search", get(mods::search))
        .route("/:id", get(mods::get_mod).patch(mods::update_mod).delete(mods::delete_mod))
        .route("/:id/submit", post(mods::submit))
        .route("/:id/approve", post(mods::approve))
        .route("/:id/reject", post(mods::reject))
        .route("/:id/download", get(mods::download))
        .route("/:id/track_download", post(mods::track_download))
        .route("/:id/compatibility-check", post(mods::compatibility_check))
        .route("/:id/report", post(mods::report))
        .route("/:id/images", post(mods::add_image))
        .route("/:id/images/:image_id", delete(mods::delete_image))
        .route("/:id/images/:image_id/cover", post(mods::set_cover))
        .route("/:id/versions", post(mods::add_version))
        .route("/:id/conflicts", post(mods::add_conflict))
        .route("/:id/conflicts/:other_id", delete(mods::remove_conflict));

    let review_routes = Router::new()
        .route("/", get(reviews::list_reviews).post(reviews::create_review))
        .route("/:id", axum::routing::patch(reviews::update_review).delete(reviews::delete_review))
        .route("/:id/vote", post(reviews::vote))
        .route("/:id/report", post(reviews::report));

    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/me", get(users::me).patch(users::update_me))
        .route("/password-reset", post(users::request_password_reset))
        .route("/password-reset/confirm", post(users::confirm_password_reset))
        .route("/:username", get(users::public_profile))
        .route("/:username/collections", get(collections::for_user));

    let forum_routes = Router::new()
        .route("/categories", get(forums::list_categories).post(forums::create_category))
        .route("/threads", get(forums::list_threads).post(forums::create_thread))
        .route("/threads/:slug", get(forums::get_thread).patch(forums::update_thread))
        .route("/posts", post(forums::create_post))
        .route("/posts/:id", delete(forums::delete_post))
        .route("/posts/:id/like", post(forums::like_post));

    let notification_routes = Router::new()
        .route("/", get(notifications::list))
        .route("/unread-count", get(notifications::unread_count))
        .route("/mark-all-read", post(notifications::mark_all_read))
        .route("/:id/read", post(notifications::mark_read));

    let collection_routes = Router::new()
        .route("/", post(collections::create))
        .route("/mine", get(collections::mine))
        .route("/:id", get(collections::detail).delete(collections::delete))
        .route("/:id/mods", post(collections::add_mod))
        .route("/:id/mods/:mod_id", delete(collections::remove_mod));

    let admin_routes = Router::new()
        .route("/reports", get(admin::list_reports))
        .route("/reports/:id/resolve", post(admin::resolve_report))
        .route("/audit-log", get(admin::audit_log));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/categories/:slug", get(catalog::get_category))
        .route("/game-versions", get(catalog::list_game_versions).post(catalog::create_game_version))
        .route("/dlcs", get(catalog::list_dlcs).post(catalog::create_dlc))
        .route("/tutorials", get(catalog::list_tutorials).post(catalog::create_tutorial))
        .route("/analytics/dashboard", get(admin::dashboard))
        .nest("/mods", mod_routes)
        .nest("/reviews", review_routes)
        .nest("/users", user_routes)
        .nest("/forums", forum_routes)
        .nest("/notifications", notification_routes)
        .nest("/collections", collection_routes)
        .nest("/admin", admin_routes)
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
