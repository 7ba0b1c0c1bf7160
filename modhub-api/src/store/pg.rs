use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use diesel::dsl::{count_star, exists, sum};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Date as SqlDate, Text, Timestamptz};
use uuid::Uuid;

use modhub_shared::clients::db::{DbConn, DbPool};

use super::*;
use crate::schema::*;

const PUBLISHED: &str = "published";

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<DbConn> {
        self.pool
            .get()
            .map_err(|e| StoreError::Backend(format!("db pool error: {e}")))
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Duplicate(info.constraint_name().unwrap_or("unique").to_string())
            }
            // A dangling reference means the parent row is gone.
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered_mods(query: &ModQuery) -> mods::BoxedQuery<'static, Pg> {
    let mut q = mods::table.into_boxed();

    match query.visibility {
        Visibility::All => {}
        Visibility::Published => q = q.filter(mods::status.eq(PUBLISHED)),
        Visibility::PublishedOrAuthor(author) => {
            q = q.filter(mods::status.eq(PUBLISHED).or(mods::author_id.eq(author)))
        }
    }
    if let Some(category_id) = query.category_id {
        q = q.filter(mods::category_id.eq(category_id));
    }
    if let Some(author_id) = query.author_id {
        q = q.filter(mods::author_id.eq(author_id));
    }
    if let Some(status) = query.status {
        q = q.filter(mods::status.eq(status.as_str()));
    }
    if let Some(min_rating) = query.min_rating {
        q = q.filter(mods::average_rating.ge(min_rating));
    }
    if let Some(version_id) = query.game_version_id {
        q = q.filter(
            mods::id.eq_any(
                mod_game_versions::table
                    .filter(mod_game_versions::game_version_id.eq(version_id))
                    .select(mod_game_versions::mod_id),
            ),
        );
    }
    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        q = q.filter(
            mods::title
                .ilike(pattern.clone())
                .or(mods::description.ilike(pattern.clone()))
                .or(mods::author_id.eq_any(
                    users::table
                        .filter(users::username.ilike(pattern))
                        .select(users::id),
                )),
        );
    }
    q
}

impl Store for PgStore {
    fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    // --- Users ---

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(users::table).values(user).execute(&mut conn)?;
        Ok(())
    }

    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table.find(id).first::<User>(&mut conn).optional()?)
    }

    fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::username.eq(username))
            .first::<User>(&mut conn)
            .optional()?)
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)
            .optional()?)
    }

    fn usernames(&self, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let rows = users::table
            .filter(users::id.eq_any(ids))
            .select((users::id, users::username))
            .load::<(Uuid, String)>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }

    fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set(changes)
            .get_result::<User>(&mut conn)?)
    }

    fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(users::table.find(id))
            .set((users::password_hash.eq(password_hash), users::updated_at.eq(Utc::now())))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn insert_password_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(password_resets::table).values(reset).execute(&mut conn)?;
        Ok(())
    }

    fn find_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>> {
        let mut conn = self.conn()?;
        Ok(password_resets::table
            .filter(password_resets::token_hash.eq(token_hash))
            .first::<PasswordReset>(&mut conn)
            .optional()?)
    }

    fn consume_password_reset(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            password_resets::table
                .filter(password_resets::id.eq(id))
                .filter(password_resets::used_at.is_null()),
        )
        .set(password_resets::used_at.eq(Some(at)))
        .execute(&mut conn)?;
        Ok(updated == 1)
    }

    // --- Catalog ---

    fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut conn = self.conn()?;
        Ok(categories::table.order(categories::name.asc()).load::<Category>(&mut conn)?)
    }

    fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let mut conn = self.conn()?;
        Ok(categories::table.find(id).first::<Category>(&mut conn).optional()?)
    }

    fn find_category_by_slug(&self, slug: &str) -> StoreResult<Option<Category>> {
        let mut conn = self.conn()?;
        Ok(categories::table
            .filter(categories::slug.eq(slug))
            .first::<Category>(&mut conn)
            .optional()?)
    }

    fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(categories::table).values(category).execute(&mut conn)?;
        Ok(())
    }

    fn list_game_versions(&self) -> StoreResult<Vec<GameVersion>> {
        let mut conn = self.conn()?;
        Ok(game_versions::table
            .order(game_versions::version.asc())
            .load::<GameVersion>(&mut conn)?)
    }

    fn insert_game_version(&self, version: &GameVersion) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(game_versions::table).values(version).execute(&mut conn)?;
        Ok(())
    }

    fn list_dlcs(&self) -> StoreResult<Vec<Dlc>> {
        let mut conn = self.conn()?;
        Ok(dlcs::table.order(dlcs::name.asc()).load::<Dlc>(&mut conn)?)
    }

    fn insert_dlc(&self, dlc: &Dlc) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(dlcs::table).values(dlc).execute(&mut conn)?;
        Ok(())
    }

    fn list_tutorials(&self) -> StoreResult<Vec<Tutorial>> {
        let mut conn = self.conn()?;
        Ok(tutorials::table
            .order(tutorials::created_at.desc())
            .load::<Tutorial>(&mut conn)?)
    }

    fn insert_tutorial(&self, tutorial: &Tutorial) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(tutorials::table).values(tutorial).execute(&mut conn)?;
        Ok(())
    }

    fn slug_taken(&self, scope: SlugScope, slug: &str, exclude: Option<Uuid>) -> StoreResult<bool> {
        let mut conn = self.conn()?;

        macro_rules! probe {
            ($table:ident) => {{
                let mut q = $table::table
                    .select($table::id)
                    .filter($table::slug.eq(slug))
                    .into_boxed();
                if let Some(own_id) = exclude {
                    q = q.filter($table::id.ne(own_id));
                }
                q.first::<Uuid>(&mut conn).optional()?.is_some()
            }};
        }

        Ok(match scope {
            SlugScope::Mods => probe!(mods),
            SlugScope::Threads => probe!(threads),
            SlugScope::Categories => probe!(categories),
            SlugScope::ForumCategories => probe!(forum_categories),
            SlugScope::Dlcs => probe!(dlcs),
        })
    }

    // --- Mods ---

    fn insert_mod(&self, new: &NewModRecord) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let mod_id = new.record.id;

        conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(mods::table).values(&new.record).execute(conn)?;

            if !new.game_version_ids.is_empty() {
                let rows: Vec<_> = new
                    .game_version_ids
                    .iter()
                    .map(|v| {
                        (
                            mod_game_versions::mod_id.eq(mod_id),
                            mod_game_versions::game_version_id.eq(*v),
                        )
                    })
                    .collect();
                diesel::insert_into(mod_game_versions::table).values(rows).execute(conn)?;
            }

            if !new.dlc_ids.is_empty() {
                let rows: Vec<_> = new
                    .dlc_ids
                    .iter()
                    .map(|d| (mod_required_dlcs::mod_id.eq(mod_id), mod_required_dlcs::dlc_id.eq(*d)))
                    .collect();
                diesel::insert_into(mod_required_dlcs::table).values(rows).execute(conn)?;
            }

            if !new.links.is_empty() {
                diesel::insert_into(download_links::table).values(&new.links).execute(conn)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn find_mod(&self, id: Uuid) -> StoreResult<Option<Mod>> {
        let mut conn = self.conn()?;
        Ok(mods::table.find(id).first::<Mod>(&mut conn).optional()?)
    }

    fn find_mods(&self, ids: &[Uuid]) -> StoreResult<Vec<Mod>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        Ok(mods::table.filter(mods::id.eq_any(ids)).load::<Mod>(&mut conn)?)
    }

    fn list_mods(&self, query: &ModQuery) -> StoreResult<(Vec<Mod>, u64)> {
        let mut conn = self.conn()?;

        let q = filtered_mods(query);
        let q = match (query.ordering.field, query.ordering.descending) {
            (ModOrderField::CreatedAt, true) => q.order(mods::created_at.desc()),
            (ModOrderField::CreatedAt, false) => q.order(mods::created_at.asc()),
            (ModOrderField::DownloadCount, true) => q.order(mods::download_count.desc()),
            (ModOrderField::DownloadCount, false) => q.order(mods::download_count.asc()),
            (ModOrderField::AverageRating, true) => q.order(mods::average_rating.desc()),
            (ModOrderField::AverageRating, false) => q.order(mods::average_rating.asc()),
            (ModOrderField::ViewCount, true) => q.order(mods::view_count.desc()),
            (ModOrderField::ViewCount, false) => q.order(mods::view_count.asc()),
        };

        let items = q
            .then_order_by(mods::id.desc())
            .offset(query.offset as i64)
            .limit(query.limit as i64)
            .load::<Mod>(&mut conn)?;

        let total: i64 = filtered_mods(query).count().get_result(&mut conn)?;
        Ok((items, total as u64))
    }

    fn update_mod(&self, id: Uuid, changes: &ModChanges) -> StoreResult<Mod> {
        let mut conn = self.conn()?;
        Ok(diesel::update(mods::table.find(id))
            .set(changes)
            .get_result::<Mod>(&mut conn)?)
    }

    fn set_mod_status(&self, id: Uuid, change: &StatusChange) -> StoreResult<Mod> {
        let mut conn = self.conn()?;
        Ok(diesel::update(mods::table.find(id))
            .set(change)
            .get_result::<Mod>(&mut conn)?)
    }

    fn delete_mod(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(mods::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn increment_mod_views(&self, id: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(diesel::update(mods::table.find(id))
            .set(mods::view_count.eq(mods::view_count + 1))
            .returning(mods::view_count)
            .get_result::<i64>(&mut conn)?)
    }

    fn suggest_mod_titles(&self, fragment: &str, limit: usize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn()?;
        Ok(mods::table
            .filter(mods::status.eq(PUBLISHED))
            .filter(mods::title.ilike(like_pattern(fragment)))
            .order(mods::title.asc())
            .limit(limit as i64)
            .select(mods::title)
            .load::<String>(&mut conn)?)
    }

    fn mod_game_versions(&self, mod_id: Uuid) -> StoreResult<Vec<GameVersion>> {
        let mut conn = self.conn()?;
        Ok(game_versions::table
            .filter(
                game_versions::id.eq_any(
                    mod_game_versions::table
                        .filter(mod_game_versions::mod_id.eq(mod_id))
                        .select(mod_game_versions::game_version_id),
                ),
            )
            .order(game_versions::version.asc())
            .load::<GameVersion>(&mut conn)?)
    }

    fn mod_required_dlcs(&self, mod_id: Uuid) -> StoreResult<Vec<Dlc>> {
        let mut conn = self.conn()?;
        Ok(dlcs::table
            .filter(
                dlcs::id.eq_any(
                    mod_required_dlcs::table
                        .filter(mod_required_dlcs::mod_id.eq(mod_id))
                        .select(mod_required_dlcs::dlc_id),
                ),
            )
            .order(dlcs::name.asc())
            .load::<Dlc>(&mut conn)?)
    }

    fn mod_conflicts(&self, mod_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn()?;
        let pairs = mod_conflicts::table
            .filter(mod_conflicts::mod_a.eq(mod_id).or(mod_conflicts::mod_b.eq(mod_id)))
            .load::<(Uuid, Uuid)>(&mut conn)?;
        Ok(pairs
            .into_iter()
            .map(|(a, b)| if a == mod_id { b } else { a })
            .collect())
    }

    fn add_mod_conflict(&self, a: Uuid, b: Uuid) -> StoreResult<()> {
        let (low, high) = conflict_pair(a, b);
        let mut conn = self.conn()?;
        diesel::insert_into(mod_conflicts::table)
            .values((mod_conflicts::mod_a.eq(low), mod_conflicts::mod_b.eq(high)))
            .on_conflict_do_nothing()
            .execute(&mut conn)?;
        Ok(())
    }

    fn remove_mod_conflict(&self, a: Uuid, b: Uuid) -> StoreResult<bool> {
        let (low, high) = conflict_pair(a, b);
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            mod_conflicts::table
                .filter(mod_conflicts::mod_a.eq(low))
                .filter(mod_conflicts::mod_b.eq(high)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn mod_images(&self, mod_id: Uuid) -> StoreResult<Vec<ModImage>> {
        let mut conn = self.conn()?;
        Ok(mod_images::table
            .filter(mod_images::mod_id.eq(mod_id))
            .order(mod_images::created_at.asc())
            .load::<ModImage>(&mut conn)?)
    }

    fn cover_images(&self, mod_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        if mod_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let rows = mod_images::table
            .filter(mod_images::mod_id.eq_any(mod_ids))
            .order((mod_images::is_cover.desc(), mod_images::created_at.asc()))
            .select((mod_images::mod_id, mod_images::image_url))
            .load::<(Uuid, String)>(&mut conn)?;

        let mut covers = HashMap::new();
        for (mod_id, url) in rows {
            covers.entry(mod_id).or_insert(url);
        }
        Ok(covers)
    }

    fn insert_mod_image(&self, image: &ModImage) -> StoreResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, DieselError, _>(|conn| {
            if image.is_cover {
                diesel::update(mod_images::table.filter(mod_images::mod_id.eq(image.mod_id)))
                    .set(mod_images::is_cover.eq(false))
                    .execute(conn)?;
            }
            diesel::insert_into(mod_images::table).values(image).execute(conn)?;
            Ok(())
        })?;
        Ok(())
    }

    fn set_cover_image(&self, mod_id: Uuid, image_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, DieselError, _>(|conn| {
            mod_images::table
                .filter(mod_images::id.eq(image_id))
                .filter(mod_images::mod_id.eq(mod_id))
                .select(mod_images::id)
                .first::<Uuid>(conn)?;

            diesel::update(mod_images::table.filter(mod_images::mod_id.eq(mod_id)))
                .set(mod_images::is_cover.eq(false))
                .execute(conn)?;
            diesel::update(mod_images::table.find(image_id))
                .set(mod_images::is_cover.eq(true))
                .execute(conn)?;
            Ok(())
        })?;
        Ok(())
    }

    fn delete_mod_image(&self, mod_id: Uuid, image_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            mod_images::table
                .filter(mod_images::id.eq(image_id))
                .filter(mod_images::mod_id.eq(mod_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn download_links(&self, mod_id: Uuid) -> StoreResult<Vec<DownloadLink>> {
        let mut conn = self.conn()?;
        Ok(download_links::table
            .filter(download_links::mod_id.eq(mod_id))
            .load::<DownloadLink>(&mut conn)?)
    }

    fn mod_versions(&self, mod_id: Uuid) -> StoreResult<Vec<ModVersion>> {
        let mut conn = self.conn()?;
        Ok(mod_versions::table
            .filter(mod_versions::mod_id.eq(mod_id))
            .order(mod_versions::created_at.desc())
            .load::<ModVersion>(&mut conn)?)
    }

    fn insert_mod_version(&self, version: &ModVersion) -> StoreResult<Mod> {
        let mut conn = self.conn()?;
        let updated = conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(mod_versions::table).values(version).execute(conn)?;
            diesel::update(mods::table.find(version.mod_id))
                .set((
                    mods::version.eq(&version.version_number),
                    mods::updated_at.eq(version.created_at),
                ))
                .get_result::<Mod>(conn)
        })?;
        Ok(updated)
    }

    fn record_download(&self, log: &DownloadLog, dedupe_by_ip: bool) -> StoreResult<RecordedDownload> {
        let mut conn = self.conn()?;
        let recorded = conn.transaction::<_, DieselError, _>(|conn| {
            // Row lock serialises concurrent downloads of the same mod.
            let current = mods::table
                .find(log.mod_id)
                .select(mods::download_count)
                .for_update()
                .get_result::<i64>(conn)?;

            let repeat = dedupe_by_ip
                && diesel::select(exists(
                    download_logs::table
                        .filter(download_logs::mod_id.eq(log.mod_id))
                        .filter(download_logs::ip_address.eq(&log.ip_address)),
                ))
                .get_result::<bool>(conn)?;

            diesel::insert_into(download_logs::table).values(log).execute(conn)?;

            if repeat {
                return Ok(RecordedDownload { download_count: current, counted: false });
            }
            let download_count = diesel::update(mods::table.find(log.mod_id))
                .set(mods::download_count.eq(mods::download_count + 1))
                .returning(mods::download_count)
                .get_result::<i64>(conn)?;
            Ok(RecordedDownload { download_count, counted: true })
        })?;
        Ok(recorded)
    }

    // --- Reviews ---

    fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(reviews::table).values(review).execute(&mut conn)?;
        Ok(())
    }

    fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>> {
        let mut conn = self.conn()?;
        Ok(reviews::table.find(id).first::<Review>(&mut conn).optional()?)
    }

    fn list_reviews(&self, mod_id: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Review>, u64)> {
        let mut conn = self.conn()?;
        let items = reviews::table
            .filter(reviews::mod_id.eq(mod_id))
            .order(reviews::created_at.desc())
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<Review>(&mut conn)?;
        let total: i64 = reviews::table
            .filter(reviews::mod_id.eq(mod_id))
            .count()
            .get_result(&mut conn)?;
        Ok((items, total as u64))
    }

    fn update_review(&self, id: Uuid, rating: i16, content: &str, at: DateTime<Utc>) -> StoreResult<Review> {
        let mut conn = self.conn()?;
        Ok(diesel::update(reviews::table.find(id))
            .set((
                reviews::rating.eq(rating),
                reviews::content.eq(content),
                reviews::updated_at.eq(at),
            ))
            .get_result::<Review>(&mut conn)?)
    }

    fn delete_review(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(reviews::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn rating_stats(&self, mod_id: Uuid) -> StoreResult<RatingStats> {
        let mut conn = self.conn()?;
        let (total, count) = reviews::table
            .filter(reviews::mod_id.eq(mod_id))
            .filter(reviews::rating.gt(0))
            .select((sum(reviews::rating), count_star()))
            .get_result::<(Option<i64>, i64)>(&mut conn)?;
        Ok(RatingStats { sum: total.unwrap_or(0), count })
    }

    fn set_mod_rating(&self, mod_id: Uuid, average: f64, count: i64) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(mods::table.find(mod_id))
            .set((mods::average_rating.eq(average), mods::rating_count.eq(count)))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn toggle_helpful_vote(&self, review_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let added = conn.transaction::<_, DieselError, _>(|conn| {
            let removed = diesel::delete(
                review_helpful_votes::table
                    .filter(review_helpful_votes::review_id.eq(review_id))
                    .filter(review_helpful_votes::user_id.eq(user_id)),
            )
            .execute(conn)?;
            if removed > 0 {
                return Ok(false);
            }
            diesel::insert_into(review_helpful_votes::table)
                .values((
                    review_helpful_votes::review_id.eq(review_id),
                    review_helpful_votes::user_id.eq(user_id),
                ))
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(true)
        })?;
        Ok(added)
    }

    fn helpful_counts(&self, review_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        if review_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let rows = review_helpful_votes::table
            .filter(review_helpful_votes::review_id.eq_any(review_ids))
            .group_by(review_helpful_votes::review_id)
            .select((review_helpful_votes::review_id, count_star()))
            .load::<(Uuid, i64)>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }

    fn helpful_voted_by(&self, review_ids: &[Uuid], user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        if review_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut conn = self.conn()?;
        let rows = review_helpful_votes::table
            .filter(review_helpful_votes::review_id.eq_any(review_ids))
            .filter(review_helpful_votes::user_id.eq(user_id))
            .select(review_helpful_votes::review_id)
            .load::<Uuid>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }

    // --- Reports and moderation log ---

    fn insert_report(&self, report: &Report) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(reports::table).values(report).execute(&mut conn)?;
        Ok(())
    }

    fn find_report(&self, id: Uuid) -> StoreResult<Option<Report>> {
        let mut conn = self.conn()?;
        Ok(reports::table.find(id).first::<Report>(&mut conn).optional()?)
    }

    fn list_reports(&self, resolved: Option<bool>, offset: u64, limit: u64) -> StoreResult<(Vec<Report>, u64)> {
        let mut conn = self.conn()?;
        let mut items_q = reports::table.into_boxed();
        let mut count_q = reports::table.into_boxed();
        if let Some(flag) = resolved {
            items_q = items_q.filter(reports::resolved.eq(flag));
            count_q = count_q.filter(reports::resolved.eq(flag));
        }

        let items = items_q
            .order(reports::created_at.desc())
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<Report>(&mut conn)?;
        let total: i64 = count_q.count().get_result(&mut conn)?;
        Ok((items, total as u64))
    }

    fn resolve_report(&self, id: Uuid, by: Uuid, at: DateTime<Utc>) -> StoreResult<Option<Report>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            reports::table
                .filter(reports::id.eq(id))
                .filter(reports::resolved.eq(false)),
        )
        .set((
            reports::resolved.eq(true),
            reports::resolved_by.eq(Some(by)),
            reports::resolved_at.eq(Some(at)),
        ))
        .get_result::<Report>(&mut conn)
        .optional()?)
    }

    fn insert_moderation_action(&self, action: &ModerationAction) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(moderation_actions::table).values(action).execute(&mut conn)?;
        Ok(())
    }

    fn list_moderation_actions(&self, offset: u64, limit: u64) -> StoreResult<(Vec<ModerationAction>, u64)> {
        let mut conn = self.conn()?;
        let items = moderation_actions::table
            .order(moderation_actions::created_at.desc())
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<ModerationAction>(&mut conn)?;
        let total: i64 = moderation_actions::table.count().get_result(&mut conn)?;
        Ok((items, total as u64))
    }

    // --- Forums ---

    fn list_forum_categories(&self) -> StoreResult<Vec<ForumCategory>> {
        let mut conn = self.conn()?;
        Ok(forum_categories::table
            .order(forum_categories::name.asc())
            .load::<ForumCategory>(&mut conn)?)
    }

    fn find_forum_category(&self, id: Uuid) -> StoreResult<Option<ForumCategory>> {
        let mut conn = self.conn()?;
        Ok(forum_categories::table
            .find(id)
            .first::<ForumCategory>(&mut conn)
            .optional()?)
    }

    fn find_forum_category_by_slug(&self, slug: &str) -> StoreResult<Option<ForumCategory>> {
        let mut conn = self.conn()?;
        Ok(forum_categories::table
            .filter(forum_categories::slug.eq(slug))
            .first::<ForumCategory>(&mut conn)
            .optional()?)
    }

    fn insert_forum_category(&self, category: &ForumCategory) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(forum_categories::table).values(category).execute(&mut conn)?;
        Ok(())
    }

    fn insert_thread(&self, thread: &Thread) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(threads::table).values(thread).execute(&mut conn)?;
        Ok(())
    }

    fn find_thread(&self, id: Uuid) -> StoreResult<Option<Thread>> {
        let mut conn = self.conn()?;
        Ok(threads::table.find(id).first::<Thread>(&mut conn).optional()?)
    }

    fn find_thread_by_slug(&self, slug: &str) -> StoreResult<Option<Thread>> {
        let mut conn = self.conn()?;
        Ok(threads::table
            .filter(threads::slug.eq(slug))
            .first::<Thread>(&mut conn)
            .optional()?)
    }

    fn list_threads(&self, category_id: Option<Uuid>, offset: u64, limit: u64) -> StoreResult<(Vec<Thread>, u64)> {
        let mut conn = self.conn()?;
        let mut items_q = threads::table.into_boxed();
        let mut count_q = threads::table.into_boxed();
        if let Some(category_id) = category_id {
            items_q = items_q.filter(threads::category_id.eq(category_id));
            count_q = count_q.filter(threads::category_id.eq(category_id));
        }

        let items = items_q
            .order((threads::is_pinned.desc(), threads::created_at.desc()))
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<Thread>(&mut conn)?;
        let total: i64 = count_q.count().get_result(&mut conn)?;
        Ok((items, total as u64))
    }

    fn update_thread_flags(&self, id: Uuid, is_pinned: Option<bool>, is_locked: Option<bool>) -> StoreResult<Thread> {
        let mut conn = self.conn()?;
        Ok(diesel::update(threads::table.find(id))
            .set((
                is_pinned.map(|v| threads::is_pinned.eq(v)),
                is_locked.map(|v| threads::is_locked.eq(v)),
                threads::updated_at.eq(Utc::now()),
            ))
            .get_result::<Thread>(&mut conn)?)
    }

    fn increment_thread_views(&self, id: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(diesel::update(threads::table.find(id))
            .set(threads::view_count.eq(threads::view_count + 1))
            .returning(threads::view_count)
            .get_result::<i64>(&mut conn)?)
    }

    fn post_counts(&self, thread_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        if thread_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let rows = forum_posts::table
            .filter(forum_posts::thread_id.eq_any(thread_ids))
            .group_by(forum_posts::thread_id)
            .select((forum_posts::thread_id, count_star()))
            .load::<(Uuid, i64)>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }

    fn insert_post(&self, post: &ForumPost) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(forum_posts::table).values(post).execute(&mut conn)?;
        Ok(())
    }

    fn find_post(&self, id: Uuid) -> StoreResult<Option<ForumPost>> {
        let mut conn = self.conn()?;
        Ok(forum_posts::table.find(id).first::<ForumPost>(&mut conn).optional()?)
    }

    fn thread_posts(&self, thread_id: Uuid) -> StoreResult<Vec<ForumPost>> {
        let mut conn = self.conn()?;
        Ok(forum_posts::table
            .filter(forum_posts::thread_id.eq(thread_id))
            .order((forum_posts::created_at.asc(), forum_posts::id.asc()))
            .load::<ForumPost>(&mut conn)?)
    }

    fn delete_post(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        // Replies go with it through the parent_id cascade.
        let deleted = diesel::delete(forum_posts::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn toggle_post_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let liked = conn.transaction::<_, DieselError, _>(|conn| {
            let removed = diesel::delete(
                post_likes::table
                    .filter(post_likes::post_id.eq(post_id))
                    .filter(post_likes::user_id.eq(user_id)),
            )
            .execute(conn)?;
            if removed > 0 {
                return Ok(false);
            }
            diesel::insert_into(post_likes::table)
                .values((post_likes::post_id.eq(post_id), post_likes::user_id.eq(user_id)))
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(true)
        })?;
        Ok(liked)
    }

    fn post_like_counts(&self, post_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let rows = post_likes::table
            .filter(post_likes::post_id.eq_any(post_ids))
            .group_by(post_likes::post_id)
            .select((post_likes::post_id, count_star()))
            .load::<(Uuid, i64)>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }

    fn posts_liked_by(&self, post_ids: &[Uuid], user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut conn = self.conn()?;
        let rows = post_likes::table
            .filter(post_likes::post_id.eq_any(post_ids))
            .filter(post_likes::user_id.eq(user_id))
            .select(post_likes::post_id)
            .load::<Uuid>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }

    // --- Notifications ---

    fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(notifications::table).values(notification).execute(&mut conn)?;
        Ok(())
    }

    fn list_notifications(&self, recipient_id: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Notification>, u64)> {
        let mut conn = self.conn()?;
        let items = notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .order(notifications::created_at.desc())
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<Notification>(&mut conn)?;
        let total: i64 = notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .count()
            .get_result(&mut conn)?;
        Ok((items, total as u64))
    }

    fn unread_notification_count(&self, recipient_id: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)?)
    }

    fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::recipient_id.eq(recipient_id)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;
        Ok(updated > 0)
    }

    fn mark_all_notifications_read(&self, recipient_id: Uuid) -> StoreResult<u64> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(recipient_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;
        Ok(updated as u64)
    }

    // --- Collections ---

    fn insert_collection(&self, collection: &Collection) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(collections::table).values(collection).execute(&mut conn)?;
        Ok(())
    }

    fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        let mut conn = self.conn()?;
        Ok(collections::table.find(id).first::<Collection>(&mut conn).optional()?)
    }

    fn list_collections(&self, user_id: Uuid, public_only: bool) -> StoreResult<Vec<Collection>> {
        let mut conn = self.conn()?;
        let mut q = collections::table
            .filter(collections::user_id.eq(user_id))
            .into_boxed();
        if public_only {
            q = q.filter(collections::is_public.eq(true));
        }
        Ok(q.order(collections::created_at.desc()).load::<Collection>(&mut conn)?)
    }

    fn delete_collection(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(collections::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn add_collection_mod(&self, collection_id: Uuid, mod_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(collection_mods::table)
            .values((
                collection_mods::collection_id.eq(collection_id),
                collection_mods::mod_id.eq(mod_id),
                collection_mods::added_at.eq(Utc::now()),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)?;
        Ok(())
    }

    fn remove_collection_mod(&self, collection_id: Uuid, mod_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            collection_mods::table
                .filter(collection_mods::collection_id.eq(collection_id))
                .filter(collection_mods::mod_id.eq(mod_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn collection_mod_ids(&self, collection_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn()?;
        Ok(collection_mods::table
            .filter(collection_mods::collection_id.eq(collection_id))
            .order(collection_mods::added_at.asc())
            .select(collection_mods::mod_id)
            .load::<Uuid>(&mut conn)?)
    }

    // --- Analytics ---

    fn downloads_per_day(&self, since: DateTime<Utc>) -> StoreResult<Vec<DailyDownloads>> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = SqlDate)]
            day: NaiveDate,
            #[diesel(sql_type = BigInt)]
            downloads: i64,
        }

        let mut conn = self.conn()?;
        let rows = diesel::sql_query(
            "SELECT DATE(created_at) AS day, COUNT(*) AS downloads \
             FROM download_logs \
             WHERE created_at >= $1 \
             GROUP BY DATE(created_at) \
             ORDER BY day",
        )
        .bind::<Timestamptz, _>(since)
        .load::<Row>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| DailyDownloads { day: r.day, downloads: r.downloads })
            .collect())
    }

    fn mods_per_category(&self) -> StoreResult<Vec<CategoryModCount>> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = Text)]
            category: String,
            #[diesel(sql_type = BigInt)]
            mod_count: i64,
        }

        let mut conn = self.conn()?;
        let rows = diesel::sql_query(
            "SELECT c.name AS category, COUNT(m.id) AS mod_count \
             FROM categories c \
             LEFT JOIN mods m ON m.category_id = c.id \
             GROUP BY c.id, c.name \
             ORDER BY mod_count DESC, c.name",
        )
        .load::<Row>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| CategoryModCount { category: r.category, mod_count: r.mod_count })
            .collect())
    }

    fn top_authors(&self, limit: u64) -> StoreResult<Vec<AuthorStats>> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = Text)]
            username: String,
            #[diesel(sql_type = BigInt)]
            total_downloads: i64,
            #[diesel(sql_type = BigInt)]
            mod_count: i64,
        }

        let mut conn = self.conn()?;
        let rows = diesel::sql_query(
            "SELECT u.username, \
                    COALESCE(SUM(m.download_count), 0)::BIGINT AS total_downloads, \
                    COUNT(m.id) AS mod_count \
             FROM users u \
             JOIN mods m ON m.author_id = u.id \
             GROUP BY u.id, u.username \
             ORDER BY total_downloads DESC, u.username \
             LIMIT $1",
        )
        .bind::<BigInt, _>(limit as i64)
        .load::<Row>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| AuthorStats {
                username: r.username,
                total_downloads: r.total_downloads,
                mod_count: r.mod_count,
            })
            .collect())
    }
}
