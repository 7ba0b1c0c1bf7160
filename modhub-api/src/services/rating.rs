use uuid::Uuid;

use crate::store::{RatingStats, Store, StoreResult};

/// Mean of the votes; zero when there are none.
pub fn average(stats: RatingStats) -> f64 {
    if stats.count == 0 {
        0.0
    } else {
        stats.sum as f64 / stats.count as f64
    }
}

/// Recompute a mod's aggregate from its stored reviews. Ratings of zero are
/// comments and do not count as votes. Idempotent.
pub fn recompute(store: &dyn Store, mod_id: Uuid) -> StoreResult<(f64, i64)> {
    let stats = store.rating_stats(mod_id)?;
    let avg = average(stats);
    store.set_mod_rating(mod_id, avg, stats.count)?;
    tracing::debug!(mod_id = %mod_id, average = avg, count = stats.count, "rating recomputed");
    Ok((avg, stats.count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Review;
    use crate::store::MemoryStore;
    use crate::testing;
    use chrono::Utc;
    use modhub_shared::types::auth::UserRole;

    fn review(store: &MemoryStore, mod_id: Uuid, rating: i16) -> Review {
        let author = testing::user(store, &testing::unique_name("rater"), UserRole::User);
        let now = Utc::now();
        let review = Review {
            id: Uuid::now_v7(),
            mod_id,
            user_id: author.id,
            rating,
            content: String::new(),
            created_at: now,
            updated_at: now,
        };
        store.insert_review(&review).unwrap();
        review
    }

    #[test]
    fn zero_ratings_are_not_votes() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Truck Pack");
        review(&store, m.id, 5);
        review(&store, m.id, 2);
        review(&store, m.id, 0);

        assert_eq!(recompute(&store, m.id).unwrap(), (3.5, 2));
        let stored = store.find_mod(m.id).unwrap().unwrap();
        assert_eq!(stored.average_rating, 3.5);
        assert_eq!(stored.rating_count, 2);
    }

    #[test]
    fn recompute_is_idempotent_and_resets_when_empty() {
        let store = MemoryStore::new();
        let m = testing::seed_mod(&store, "Truck Pack");
        let r = review(&store, m.id, 4);

        assert_eq!(recompute(&store, m.id).unwrap(), (4.0, 1));
        assert_eq!(recompute(&store, m.id).unwrap(), (4.0, 1));

        store.delete_review(r.id).unwrap();
        assert_eq!(recompute(&store, m.id).unwrap(), (0.0, 0));
        let stored = store.find_mod(m.id).unwrap().unwrap();
        assert_eq!(stored.average_rating, 0.0);
        assert_eq!(stored.rating_count, 0);
    }

    #[test]
    fn average_of_nothing_is_zero() {
        assert_eq!(average(RatingStats::default()), 0.0);
        assert_eq!(average(RatingStats { sum: 7, count: 3 }), 7.0 / 3.0);
    }
}
