//! Reports against mods and reviews, and the staff action log.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{ModerationAction, Report};
use crate::services::mods;
use crate::store::{Store, StoreResult};

pub const MOD_REPORT_REASONS: &[&str] = &["spam", "broken", "stolen", "inappropriate"];
pub const REVIEW_REPORT_REASONS: &[&str] = &["spam", "abusive", "irrelevant"];

#[derive(Debug, Deserialize, Validate)]
pub struct ReportInput {
    pub reason: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "details must be at most 2000 characters"))]
    pub details: String,
}

fn check_reason(reason: &str, allowed: &[&str]) -> AppResult<String> {
    let reason = reason.trim().to_lowercase();
    if allowed.contains(&reason.as_str()) {
        Ok(reason)
    } else {
        Err(AppError::with_details(
            ErrorCode::InvalidReportReason,
            format!("unknown report reason '{reason}'"),
            serde_json::json!({ "allowed": allowed }),
        ))
    }
}

/// Append an entry to the moderation log.
pub fn record_action(
    store: &dyn Store,
    moderator_id: Uuid,
    action: &str,
    target_type: &str,
    target_id: Uuid,
    details: Option<serde_json::Value>,
) -> StoreResult<()> {
    store.insert_moderation_action(&ModerationAction {
        id: Uuid::now_v7(),
        moderator_id,
        action: action.to_string(),
        target_type: target_type.to_string(),
        target_id,
        details,
        created_at: Utc::now(),
    })?;
    tracing::info!(moderator_id = %moderator_id, action, target_type, target_id = %target_id, "moderation action recorded");
    Ok(())
}

/// Guests may report mods they can see.
pub fn report_mod(
    store: &dyn Store,
    caller: Option<&AuthUser>,
    mod_id: Uuid,
    input: ReportInput,
) -> AppResult<Report> {
    input.validate()?;
    let reason = check_reason(&input.reason, MOD_REPORT_REASONS)?;
    let target = mods::load_visible(store, mod_id, caller)?;

    let report = Report {
        id: Uuid::now_v7(),
        reporter_id: caller.map(|u| u.id),
        target_type: "mod".into(),
        mod_id: Some(target.id),
        review_id: None,
        reason,
        details: input.details,
        resolved: false,
        resolved_by: None,
        resolved_at: None,
        created_at: Utc::now(),
    };
    store.insert_report(&report)?;
    tracing::info!(report_id = %report.id, mod_id = %mod_id, reason = %report.reason, "mod reported");
    Ok(report)
}

pub fn report_review(
    store: &dyn Store,
    caller: &AuthUser,
    review_id: Uuid,
    input: ReportInput,
) -> AppResult<Report> {
    input.validate()?;
    let reason = check_reason(&input.reason, REVIEW_REPORT_REASONS)?;
    let review = store
        .find_review(review_id)?
        .ok_or_else(|| AppError::new(ErrorCode::ReviewNotFound, "review not found"))?;
    mods::load_visible(store, review.mod_id, Some(caller))?;

    let report = Report {
        id: Uuid::now_v7(),
        reporter_id: Some(caller.id),
        target_type: "review".into(),
        mod_id: Some(review.mod_id),
        review_id: Some(review.id),
        reason,
        details: input.details,
        resolved: false,
        resolved_by: None,
        resolved_at: None,
        created_at: Utc::now(),
    };
    store.insert_report(&report)?;
    tracing::info!(report_id = %report.id, review_id = %review_id, "review reported");
    Ok(report)
}

pub fn list_reports(
    store: &dyn Store,
    resolved: Option<bool>,
    page: &PaginationParams,
) -> AppResult<Paginated<Report>> {
    let (rows, total) = store.list_reports(resolved, page.offset(), page.limit())?;
    Ok(Paginated::new(rows, total, page))
}

pub fn resolve_report(store: &dyn Store, moderator: &AuthUser, id: Uuid) -> AppResult<Report> {
    if store.find_report(id)?.is_none() {
        return Err(AppError::new(ErrorCode::ReportNotFound, "report not found"));
    }
    let report = store
        .resolve_report(id, moderator.id, Utc::now())?
        .ok_or_else(|| AppError::new(ErrorCode::ReportAlreadyResolved, "report is already resolved"))?;

    record_action(
        store,
        moderator.id,
        "resolve_report",
        "report",
        id,
        Some(serde_json::json!({ "reason": report.reason })),
    )?;
    Ok(report)
}

pub fn audit_log(store: &dyn Store, page: &PaginationParams) -> AppResult<Paginated<ModerationAction>> {
    let (rows, total) = store.list_moderation_actions(page.offset(), page.limit())?;
    Ok(Paginated::new(rows, total, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModStatus;
    use crate::store::MemoryStore;
    use crate::testing;
    use modhub_shared::types::auth::UserRole;

    fn input(reason: &str) -> ReportInput {
        ReportInput { reason: reason.into(), details: "link is dead".into() }
    }

    #[test]
    fn guests_can_report_published_mods() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Scania Pack");

        let report = report_mod(&store, None, m.id, input("Broken")).unwrap();
        assert_eq!(report.reason, "broken");
        assert_eq!(report.reporter_id, None);
        assert_eq!(report.target_type, "mod");
    }

    #[test]
    fn unknown_reason_is_rejected() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Scania Pack");

        let err = report_mod(&store, None, m.id, input("boring")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReportReason);
    }

    #[test]
    fn hidden_mods_cannot_be_reported_by_strangers() {
        let store = MemoryStore::new();
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let m = testing::mod_with(&store, &author, "Secret", ModStatus::Pending);

        let err = report_mod(&store, None, m.id, input("spam")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModNotFound);
    }

    #[test]
    fn reviews_on_hidden_mods_cannot_be_reported_by_strangers() {
        let store = MemoryStore::new();
        let author = testing::user(&store, &testing::unique_name("author"), UserRole::User);
        let stranger = testing::user(&store, &testing::unique_name("guest"), UserRole::User);
        let m = testing::mod_with(&store, &author, "Secret", ModStatus::Pending);
        let review = crate::services::reviews::create_review(
            &store,
            &author,
            crate::services::reviews::CreateReviewInput { mod_id: m.id, rating: 0, content: "notes".into() },
        )
        .unwrap();

        let err = report_review(&store, &stranger, review.id, input("spam")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModNotFound);
        let open = list_reports(&store, Some(false), &PaginationParams::default()).unwrap();
        assert_eq!(open.total, 0);
    }

    #[test]
    fn resolving_twice_conflicts_and_is_logged_once() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Scania Pack");
        let staff = testing::user(&store, &testing::unique_name("mod"), UserRole::Moderator);
        let report = report_mod(&store, None, m.id, input("spam")).unwrap();

        let resolved = resolve_report(&store, &staff, report.id).unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolved_by, Some(staff.id));

        let err = resolve_report(&store, &staff, report.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReportAlreadyResolved);

        let log = audit_log(&store, &PaginationParams::default()).unwrap();
        assert_eq!(log.total, 1);
        assert_eq!(log.items[0].action, "resolve_report");

        let open = list_reports(&store, Some(false), &PaginationParams::default()).unwrap();
        assert_eq!(open.total, 0);
    }
}
