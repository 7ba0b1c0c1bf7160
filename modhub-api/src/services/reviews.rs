use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::Review;
use crate::services::{moderation, mods, rating};
use crate::store::{constraints, Store};
use crate::views::{self, ReviewView};

const MAX_RATING: i16 = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewInput {
    pub mod_id: Uuid,
    /// 0 leaves a comment without voting.
    #[serde(default)]
    pub rating: i16,
    #[validate(length(min = 1, max = 5000, message = "content must be between 1 and 5000 characters"))]
    pub content: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReviewInput {
    pub rating: Option<i16>,
    #[validate(length(min = 1, max = 5000, message = "content must be between 1 and 5000 characters"))]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Added,
    Removed,
}

#[derive(Debug, Serialize)]
pub struct HelpfulVote {
    pub status: VoteOutcome,
    pub helpful_count: i64,
}

fn check_rating(rating: i16) -> AppResult<i16> {
    if (0..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(AppError::new(ErrorCode::InvalidRating, "rating must be between 0 and 5"))
    }
}

fn find(store: &dyn Store, id: Uuid) -> AppResult<Review> {
    store
        .find_review(id)?
        .ok_or_else(|| AppError::new(ErrorCode::ReviewNotFound, "review not found"))
}

fn view(store: &dyn Store, review: Review, caller: &AuthUser) -> AppResult<ReviewView> {
    let mut rows = views::review_views(store, vec![review], Some(caller))?;
    rows.pop().ok_or_else(|| AppError::new(ErrorCode::ReviewNotFound, "review not found"))
}

/// Newest first.
pub fn list_reviews(
    store: &dyn Store,
    caller: Option<&AuthUser>,
    mod_id: Uuid,
    page: &PaginationParams,
) -> AppResult<Paginated<ReviewView>> {
    mods::load_visible(store, mod_id, caller)?;
    let (rows, total) = store.list_reviews(mod_id, page.offset(), page.limit())?;
    let items = views::review_views(store, rows, caller)?;
    Ok(Paginated::new(items, total, page))
}

pub fn create_review(store: &dyn Store, caller: &AuthUser, input: CreateReviewInput) -> AppResult<ReviewView> {
    input.validate()?;
    let score = check_rating(input.rating)?;
    let target = mods::load_visible(store, input.mod_id, Some(caller))?;

    let now = Utc::now();
    let review = Review {
        id: Uuid::now_v7(),
        mod_id: target.id,
        user_id: caller.id,
        rating: score,
        content: input.content,
        created_at: now,
        updated_at: now,
    };
    store.insert_review(&review).map_err(|e| {
        if e.is_duplicate_of(constraints::REVIEWS_USER_MOD) {
            AppError::new(ErrorCode::AlreadyReviewed, "you have already reviewed this mod")
        } else {
            e.into()
        }
    })?;
    rating::recompute(store, target.id)?;

    tracing::info!(review_id = %review.id, mod_id = %target.id, rating = score, "review created");
    view(store, review, caller)
}

pub fn update_review(store: &dyn Store, caller: &AuthUser, id: Uuid, input: UpdateReviewInput) -> AppResult<ReviewView> {
    input.validate()?;
    let review = find(store, id)?;
    if review.user_id != caller.id {
        return Err(AppError::forbidden("only the author can edit this review"));
    }

    let score = match input.rating {
        Some(r) => check_rating(r)?,
        None => review.rating,
    };
    let content = input.content.unwrap_or(review.content);
    let updated = store.update_review(id, score, &content, Utc::now())?;
    rating::recompute(store, updated.mod_id)?;
    view(store, updated, caller)
}

pub fn delete_review(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<()> {
    let review = find(store, id)?;
    if review.user_id != caller.id && !caller.is_staff() {
        return Err(AppError::forbidden("only the author or staff can delete this review"));
    }
    store.delete_review(id)?;
    rating::recompute(store, review.mod_id)?;

    if review.user_id != caller.id {
        moderation::record_action(store, caller.id, "delete_review", "review", id, None)?;
    }
    Ok(())
}

/// Toggle the caller's "helpful" mark on a review.
pub fn toggle_helpful(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<HelpfulVote> {
    let review = find(store, id)?;
    mods::load_visible(store, review.mod_id, Some(caller))?;
    let added = store.toggle_helpful_vote(id, caller.id)?;
    let helpful_count = store.helpful_counts(&[id])?.get(&id).copied().unwrap_or(0);
    Ok(HelpfulVote {
        status: if added { VoteOutcome::Added } else { VoteOutcome::Removed },
        helpful_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing;
    use modhub_shared::types::auth::UserRole;

    fn input(mod_id: Uuid, rating: i16) -> CreateReviewInput {
        CreateReviewInput { mod_id, rating, content: "Works great".into() }
    }

    fn reviewer(store: &MemoryStore) -> AuthUser {
        testing::user(store, &testing::unique_name("rev"), UserRole::User)
    }

    fn aggregate(store: &MemoryStore, mod_id: Uuid) -> (f64, i64) {
        let m = store.find_mod(mod_id).unwrap().unwrap();
        (m.average_rating, m.rating_count)
    }

    #[test]
    fn aggregate_follows_every_mutation() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let (a, b, c) = (reviewer(&store), reviewer(&store), reviewer(&store));

        let ra = create_review(&store, &a, input(m.id, 4)).unwrap();
        create_review(&store, &b, input(m.id, 1)).unwrap();
        create_review(&store, &c, input(m.id, 0)).unwrap();
        assert_eq!(aggregate(&store, m.id), (2.5, 2));

        update_review(&store, &a, ra.id, UpdateReviewInput { rating: Some(5), content: None }).unwrap();
        assert_eq!(aggregate(&store, m.id), (3.0, 2));

        delete_review(&store, &a, ra.id).unwrap();
        assert_eq!(aggregate(&store, m.id), (1.0, 1));
    }

    #[test]
    fn one_review_per_user_and_mod() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let user = reviewer(&store);

        create_review(&store, &user, input(m.id, 3)).unwrap();
        let err = create_review(&store, &user, input(m.id, 5)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyReviewed);
        assert_eq!(aggregate(&store, m.id), (3.0, 1));
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let err = create_review(&store, &reviewer(&store), input(m.id, 6)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRating);
    }

    #[test]
    fn only_the_author_edits() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let review = create_review(&store, &reviewer(&store), input(m.id, 3)).unwrap();

        let err = update_review(&store, &reviewer(&store), review.id, UpdateReviewInput::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let staff = testing::user(&store, &testing::unique_name("staff"), UserRole::Moderator);
        delete_review(&store, &staff, review.id).unwrap();
        assert_eq!(aggregate(&store, m.id), (0.0, 0));
    }

    #[test]
    fn helpful_vote_toggles() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Volvo FH");
        let review = create_review(&store, &reviewer(&store), input(m.id, 3)).unwrap();
        let voter = reviewer(&store);

        let first = toggle_helpful(&store, &voter, review.id).unwrap();
        assert_eq!((first.status, first.helpful_count), (VoteOutcome::Added, 1));

        let listed = list_reviews(&store, Some(&voter), m.id, &PaginationParams::default()).unwrap();
        assert!(listed.items[0].is_helpful);
        assert!(!listed.items[0].is_owner);

        let second = toggle_helpful(&store, &voter, review.id).unwrap();
        assert_eq!((second.status, second.helpful_count), (VoteOutcome::Removed, 0));
    }

    #[test]
    fn votes_on_unpublished_mods_are_refused_to_strangers() {
        let store = MemoryStore::new();
        let author = reviewer(&store);
        let m = testing::mod_with(&store, &author, "Secret", crate::models::ModStatus::Pending);
        let review = create_review(&store, &author, input(m.id, 0)).unwrap();

        let err = toggle_helpful(&store, &reviewer(&store), review.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModNotFound);
        assert!(store.helpful_counts(&[review.id]).unwrap().get(&review.id).is_none());

        let own = toggle_helpful(&store, &author, review.id).unwrap();
        assert_eq!(own.status, VoteOutcome::Added);
    }
}
