//! In-process backend with the same constraints as the PostgreSQL schema.
//! Every operation takes the one table lock, so counter increments and
//! toggles are atomic with respect to each other.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::*;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    password_resets: Vec<PasswordReset>,
    categories: Vec<Category>,
    game_versions: Vec<GameVersion>,
    dlcs: Vec<Dlc>,
    tutorials: Vec<Tutorial>,
    mods: Vec<Mod>,
    mod_game_versions: BTreeSet<(Uuid, Uuid)>,
    mod_required_dlcs: BTreeSet<(Uuid, Uuid)>,
    mod_conflicts: BTreeSet<(Uuid, Uuid)>,
    mod_images: Vec<ModImage>,
    download_links: Vec<DownloadLink>,
    mod_versions: Vec<ModVersion>,
    download_logs: Vec<DownloadLog>,
    reviews: Vec<Review>,
    helpful_votes: BTreeSet<(Uuid, Uuid)>,
    reports: Vec<Report>,
    moderation_actions: Vec<ModerationAction>,
    forum_categories: Vec<ForumCategory>,
    threads: Vec<Thread>,
    posts: Vec<ForumPost>,
    post_likes: BTreeSet<(Uuid, Uuid)>,
    notifications: Vec<Notification>,
    collections: Vec<Collection>,
    collection_mods: Vec<(Uuid, Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

fn page<T: Clone>(rows: Vec<T>, offset: u64, limit: u64) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (items, total)
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn compare_mods(a: &Mod, b: &Mod, ordering: ModOrdering) -> Ordering {
    let primary = match ordering.field {
        ModOrderField::CreatedAt => a.created_at.cmp(&b.created_at),
        ModOrderField::DownloadCount => a.download_count.cmp(&b.download_count),
        ModOrderField::ViewCount => a.view_count.cmp(&b.view_count),
        ModOrderField::AverageRating => a
            .average_rating
            .partial_cmp(&b.average_rating)
            .unwrap_or(Ordering::Equal),
    };
    let primary = if ordering.descending { primary.reverse() } else { primary };
    primary.then_with(|| b.id.cmp(&a.id))
}

impl Tables {
    fn slug_exists(&self, scope: SlugScope, slug: &str, exclude: Option<Uuid>) -> bool {
        let other = |id: Uuid| Some(id) != exclude;
        match scope {
            SlugScope::Mods => self.mods.iter().any(|m| m.slug == slug && other(m.id)),
            SlugScope::Threads => self.threads.iter().any(|t| t.slug == slug && other(t.id)),
            SlugScope::Categories => self.categories.iter().any(|c| c.slug == slug && other(c.id)),
            SlugScope::ForumCategories => {
                self.forum_categories.iter().any(|c| c.slug == slug && other(c.id))
            }
            SlugScope::Dlcs => self.dlcs.iter().any(|d| d.slug == slug && other(d.id)),
        }
    }

    fn mod_mut(&mut self, id: Uuid) -> StoreResult<&mut Mod> {
        self.mods.iter_mut().find(|m| m.id == id).ok_or(StoreError::NotFound)
    }

    fn username_of(&self, id: Uuid) -> Option<&str> {
        self.users.iter().find(|u| u.id == id).map(|u| u.username.as_str())
    }

    fn remove_review_rows(&mut self, review_ids: &HashSet<Uuid>) {
        self.reviews.retain(|r| !review_ids.contains(&r.id));
        self.helpful_votes.retain(|(review_id, _)| !review_ids.contains(review_id));
        self.reports
            .retain(|r| r.review_id.map_or(true, |id| !review_ids.contains(&id)));
    }

    fn remove_posts(&mut self, root: Uuid) {
        let mut doomed: HashSet<Uuid> = HashSet::from([root]);
        loop {
            let before = doomed.len();
            for post in &self.posts {
                if post.parent_id.is_some_and(|p| doomed.contains(&p)) {
                    doomed.insert(post.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        self.posts.retain(|p| !doomed.contains(&p.id));
        self.post_likes.retain(|(post_id, _)| !doomed.contains(post_id));
    }
}

impl Store for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }

    // --- Users ---

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate(constraints::USERS_USERNAME.into()));
        }
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(constraints::USERS_EMAIL.into()));
        }
        t.users.push(user.clone());
        Ok(())
    }

    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.username == username).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    fn usernames(&self, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        let t = self.lock()?;
        Ok(t.users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| (u.id, u.username.clone()))
            .collect())
    }

    fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<User> {
        let mut t = self.lock()?;
        let user = t.users.iter_mut().find(|u| u.id == id).ok_or(StoreError::NotFound)?;
        if let Some(bio) = &changes.bio {
            user.bio = bio.clone();
        }
        if let Some(avatar_url) = &changes.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        if let Some(country) = &changes.country {
            user.country = country.clone();
        }
        if let Some(website) = &changes.website {
            user.website = website.clone();
        }
        if let Some(discord_handle) = &changes.discord_handle {
            user.discord_handle = discord_handle.clone();
        }
        if let Some(at) = changes.updated_at {
            user.updated_at = at;
        }
        Ok(user.clone())
    }

    fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut t = self.lock()?;
        let user = t.users.iter_mut().find(|u| u.id == id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    fn insert_password_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.password_resets.iter().any(|r| r.token_hash == reset.token_hash) {
            return Err(StoreError::Duplicate(constraints::PASSWORD_RESETS_TOKEN.into()));
        }
        t.password_resets.push(reset.clone());
        Ok(())
    }

    fn find_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>> {
        Ok(self
            .lock()?
            .password_resets
            .iter()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    fn consume_password_reset(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut t = self.lock()?;
        match t.password_resets.iter_mut().find(|r| r.id == id && r.used_at.is_none()) {
            Some(reset) => {
                reset.used_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Catalog ---

    fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut rows = self.lock()?.categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.lock()?.categories.iter().find(|c| c.id == id).cloned())
    }

    fn find_category_by_slug(&self, slug: &str) -> StoreResult<Option<Category>> {
        Ok(self.lock()?.categories.iter().find(|c| c.slug == slug).cloned())
    }

    fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.slug_exists(SlugScope::Categories, &category.slug, None) {
            return Err(StoreError::Duplicate(constraints::CATEGORIES_SLUG.into()));
        }
        t.categories.push(category.clone());
        Ok(())
    }

    fn list_game_versions(&self) -> StoreResult<Vec<GameVersion>> {
        let mut rows = self.lock()?.game_versions.clone();
        rows.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(rows)
    }

    fn insert_game_version(&self, version: &GameVersion) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.game_versions.iter().any(|v| v.version == version.version) {
            return Err(StoreError::Duplicate(constraints::GAME_VERSIONS_VERSION.into()));
        }
        t.game_versions.push(version.clone());
        Ok(())
    }

    fn list_dlcs(&self) -> StoreResult<Vec<Dlc>> {
        let mut rows = self.lock()?.dlcs.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn insert_dlc(&self, dlc: &Dlc) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.slug_exists(SlugScope::Dlcs, &dlc.slug, None) {
            return Err(StoreError::Duplicate(constraints::DLCS_SLUG.into()));
        }
        t.dlcs.push(dlc.clone());
        Ok(())
    }

    fn list_tutorials(&self) -> StoreResult<Vec<Tutorial>> {
        let mut rows = self.lock()?.tutorials.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn insert_tutorial(&self, tutorial: &Tutorial) -> StoreResult<()> {
        self.lock()?.tutorials.push(tutorial.clone());
        Ok(())
    }

    fn slug_taken(&self, scope: SlugScope, slug: &str, exclude: Option<Uuid>) -> StoreResult<bool> {
        Ok(self.lock()?.slug_exists(scope, slug, exclude))
    }

    // --- Mods ---

    fn insert_mod(&self, new: &NewModRecord) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.slug_exists(SlugScope::Mods, &new.record.slug, None) {
            return Err(StoreError::Duplicate(constraints::MODS_SLUG.into()));
        }
        let id = new.record.id;
        t.mods.push(new.record.clone());
        t.mod_game_versions.extend(new.game_version_ids.iter().map(|v| (id, *v)));
        t.mod_required_dlcs.extend(new.dlc_ids.iter().map(|d| (id, *d)));
        t.download_links.extend(new.links.iter().cloned());
        Ok(())
    }

    fn find_mod(&self, id: Uuid) -> StoreResult<Option<Mod>> {
        Ok(self.lock()?.mods.iter().find(|m| m.id == id).cloned())
    }

    fn find_mods(&self, ids: &[Uuid]) -> StoreResult<Vec<Mod>> {
        let t = self.lock()?;
        Ok(t.mods.iter().filter(|m| ids.contains(&m.id)).cloned().collect())
    }

    fn list_mods(&self, query: &ModQuery) -> StoreResult<(Vec<Mod>, u64)> {
        let t = self.lock()?;
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let published = ModStatus::Published.as_str();

        let mut rows: Vec<Mod> = t
            .mods
            .iter()
            .filter(|m| match query.visibility {
                Visibility::All => true,
                Visibility::Published => m.status == published,
                Visibility::PublishedOrAuthor(author) => m.status == published || m.author_id == author,
            })
            .filter(|m| query.category_id.map_or(true, |c| m.category_id == c))
            .filter(|m| query.author_id.map_or(true, |a| m.author_id == a))
            .filter(|m| query.status.map_or(true, |s| m.status == s.as_str()))
            .filter(|m| query.min_rating.map_or(true, |r| m.average_rating >= r))
            .filter(|m| {
                query
                    .game_version_id
                    .map_or(true, |v| t.mod_game_versions.contains(&(m.id, v)))
            })
            .filter(|m| match &needle {
                None => true,
                Some(needle) => {
                    contains_ci(&m.title, needle)
                        || contains_ci(&m.description, needle)
                        || t.username_of(m.author_id).is_some_and(|u| contains_ci(u, needle))
                }
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| compare_mods(a, b, query.ordering));
        Ok(page(rows, query.offset, query.limit))
    }

    fn update_mod(&self, id: Uuid, changes: &ModChanges) -> StoreResult<Mod> {
        let mut t = self.lock()?;
        if let Some(slug) = &changes.slug {
            if t.slug_exists(SlugScope::Mods, slug, Some(id)) {
                return Err(StoreError::Duplicate(constraints::MODS_SLUG.into()));
            }
        }
        let m = t.mod_mut(id)?;
        if let Some(v) = changes.category_id {
            m.category_id = v;
        }
        if let Some(v) = &changes.title {
            m.title = v.clone();
        }
        if let Some(v) = &changes.slug {
            m.slug = v.clone();
        }
        if let Some(v) = &changes.description {
            m.description = v.clone();
        }
        if let Some(v) = &changes.version {
            m.version = v.clone();
        }
        if let Some(v) = &changes.min_game_version {
            m.min_game_version = v.clone();
        }
        if let Some(v) = &changes.file_location {
            m.file_location = Some(v.clone());
        }
        if let Some(v) = &changes.file_url {
            m.file_url = Some(v.clone());
        }
        if let Some(v) = &changes.file_size {
            m.file_size = v.clone();
        }
        if let Some(at) = changes.updated_at {
            m.updated_at = at;
        }
        Ok(m.clone())
    }

    fn set_mod_status(&self, id: Uuid, change: &StatusChange) -> StoreResult<Mod> {
        let mut t = self.lock()?;
        let m = t.mod_mut(id)?;
        m.status = change.status.clone();
        m.is_approved = change.is_approved;
        m.approved_by = change.approved_by;
        m.updated_at = change.updated_at;
        Ok(m.clone())
    }

    fn delete_mod(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        let before = t.mods.len();
        t.mods.retain(|m| m.id != id);
        if t.mods.len() == before {
            return Err(StoreError::NotFound);
        }
        t.mod_game_versions.retain(|(m, _)| *m != id);
        t.mod_required_dlcs.retain(|(m, _)| *m != id);
        t.mod_conflicts.retain(|(a, b)| *a != id && *b != id);
        t.mod_images.retain(|i| i.mod_id != id);
        t.download_links.retain(|l| l.mod_id != id);
        t.mod_versions.retain(|v| v.mod_id != id);
        t.download_logs.retain(|l| l.mod_id != id);
        let review_ids: HashSet<Uuid> =
            t.reviews.iter().filter(|r| r.mod_id == id).map(|r| r.id).collect();
        t.remove_review_rows(&review_ids);
        t.reports.retain(|r| r.mod_id != Some(id));
        t.collection_mods.retain(|(_, m, _)| *m != id);
        Ok(())
    }

    fn increment_mod_views(&self, id: Uuid) -> StoreResult<i64> {
        let mut t = self.lock()?;
        let m = t.mod_mut(id)?;
        m.view_count += 1;
        Ok(m.view_count)
    }

    fn suggest_mod_titles(&self, fragment: &str, limit: usize) -> StoreResult<Vec<String>> {
        let t = self.lock()?;
        let needle = fragment.to_lowercase();
        let published = ModStatus::Published.as_str();
        let mut titles: Vec<String> = t
            .mods
            .iter()
            .filter(|m| m.status == published && contains_ci(&m.title, &needle))
            .map(|m| m.title.clone())
            .collect();
        titles.sort();
        titles.truncate(limit);
        Ok(titles)
    }

    fn mod_game_versions(&self, mod_id: Uuid) -> StoreResult<Vec<GameVersion>> {
        let t = self.lock()?;
        Ok(t.game_versions
            .iter()
            .filter(|v| t.mod_game_versions.contains(&(mod_id, v.id)))
            .cloned()
            .collect())
    }

    fn mod_required_dlcs(&self, mod_id: Uuid) -> StoreResult<Vec<Dlc>> {
        let t = self.lock()?;
        Ok(t.dlcs
            .iter()
            .filter(|d| t.mod_required_dlcs.contains(&(mod_id, d.id)))
            .cloned()
            .collect())
    }

    fn mod_conflicts(&self, mod_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let t = self.lock()?;
        Ok(t.mod_conflicts
            .iter()
            .filter_map(|(a, b)| match (*a == mod_id, *b == mod_id) {
                (true, _) => Some(*b),
                (_, true) => Some(*a),
                _ => None,
            })
            .collect())
    }

    fn add_mod_conflict(&self, a: Uuid, b: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        if !t.mods.iter().any(|m| m.id == a) || !t.mods.iter().any(|m| m.id == b) {
            return Err(StoreError::NotFound);
        }
        t.mod_conflicts.insert(conflict_pair(a, b));
        Ok(())
    }

    fn remove_mod_conflict(&self, a: Uuid, b: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.mod_conflicts.remove(&conflict_pair(a, b)))
    }

    fn mod_images(&self, mod_id: Uuid) -> StoreResult<Vec<ModImage>> {
        let t = self.lock()?;
        let mut rows: Vec<ModImage> = t.mod_images.iter().filter(|i| i.mod_id == mod_id).cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    fn cover_images(&self, mod_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        let t = self.lock()?;
        let mut covers = HashMap::new();
        for mod_id in mod_ids {
            let mut images: Vec<&ModImage> = t.mod_images.iter().filter(|i| i.mod_id == *mod_id).collect();
            images.sort_by(|a, b| b.is_cover.cmp(&a.is_cover).then(a.created_at.cmp(&b.created_at)));
            if let Some(image) = images.first() {
                covers.insert(*mod_id, image.image_url.clone());
            }
        }
        Ok(covers)
    }

    fn insert_mod_image(&self, image: &ModImage) -> StoreResult<()> {
        let mut t = self.lock()?;
        if image.is_cover {
            for other in t.mod_images.iter_mut().filter(|i| i.mod_id == image.mod_id) {
                other.is_cover = false;
            }
        }
        t.mod_images.push(image.clone());
        Ok(())
    }

    fn set_cover_image(&self, mod_id: Uuid, image_id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        if !t.mod_images.iter().any(|i| i.id == image_id && i.mod_id == mod_id) {
            return Err(StoreError::NotFound);
        }
        for image in t.mod_images.iter_mut().filter(|i| i.mod_id == mod_id) {
            image.is_cover = image.id == image_id;
        }
        Ok(())
    }

    fn delete_mod_image(&self, mod_id: Uuid, image_id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        let before = t.mod_images.len();
        t.mod_images.retain(|i| !(i.id == image_id && i.mod_id == mod_id));
        if t.mod_images.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn download_links(&self, mod_id: Uuid) -> StoreResult<Vec<DownloadLink>> {
        let t = self.lock()?;
        Ok(t.download_links.iter().filter(|l| l.mod_id == mod_id).cloned().collect())
    }

    fn mod_versions(&self, mod_id: Uuid) -> StoreResult<Vec<ModVersion>> {
        let t = self.lock()?;
        let mut rows: Vec<ModVersion> = t.mod_versions.iter().filter(|v| v.mod_id == mod_id).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn insert_mod_version(&self, version: &ModVersion) -> StoreResult<Mod> {
        let mut t = self.lock()?;
        let m = t.mod_mut(version.mod_id)?;
        m.version = version.version_number.clone();
        m.updated_at = version.created_at;
        let updated = m.clone();
        t.mod_versions.push(version.clone());
        Ok(updated)
    }

    fn record_download(&self, log: &DownloadLog, dedupe_by_ip: bool) -> StoreResult<RecordedDownload> {
        let mut t = self.lock()?;
        let repeat = dedupe_by_ip
            && t.download_logs
                .iter()
                .any(|l| l.mod_id == log.mod_id && l.ip_address == log.ip_address);

        let m = t.mod_mut(log.mod_id)?;
        if !repeat {
            m.download_count += 1;
        }
        let download_count = m.download_count;
        t.download_logs.push(log.clone());
        Ok(RecordedDownload { download_count, counted: !repeat })
    }

    // --- Reviews ---

    fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.reviews.iter().any(|r| r.user_id == review.user_id && r.mod_id == review.mod_id) {
            return Err(StoreError::Duplicate(constraints::REVIEWS_USER_MOD.into()));
        }
        t.reviews.push(review.clone());
        Ok(())
    }

    fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>> {
        Ok(self.lock()?.reviews.iter().find(|r| r.id == id).cloned())
    }

    fn list_reviews(&self, mod_id: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Review>, u64)> {
        let t = self.lock()?;
        let mut rows: Vec<Review> = t.reviews.iter().filter(|r| r.mod_id == mod_id).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, offset, limit))
    }

    fn update_review(&self, id: Uuid, rating: i16, content: &str, at: DateTime<Utc>) -> StoreResult<Review> {
        let mut t = self.lock()?;
        let review = t.reviews.iter_mut().find(|r| r.id == id).ok_or(StoreError::NotFound)?;
        review.rating = rating;
        review.content = content.to_string();
        review.updated_at = at;
        Ok(review.clone())
    }

    fn delete_review(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        if !t.reviews.iter().any(|r| r.id == id) {
            return Err(StoreError::NotFound);
        }
        t.remove_review_rows(&HashSet::from([id]));
        Ok(())
    }

    fn rating_stats(&self, mod_id: Uuid) -> StoreResult<RatingStats> {
        let t = self.lock()?;
        Ok(t.reviews
            .iter()
            .filter(|r| r.mod_id == mod_id && r.rating > 0)
            .fold(RatingStats::default(), |acc, r| RatingStats {
                sum: acc.sum + i64::from(r.rating),
                count: acc.count + 1,
            }))
    }

    fn set_mod_rating(&self, mod_id: Uuid, average: f64, count: i64) -> StoreResult<()> {
        let mut t = self.lock()?;
        let m = t.mod_mut(mod_id)?;
        m.average_rating = average;
        m.rating_count = count;
        Ok(())
    }

    fn toggle_helpful_vote(&self, review_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let key = (review_id, user_id);
        if t.helpful_votes.remove(&key) {
            Ok(false)
        } else {
            t.helpful_votes.insert(key);
            Ok(true)
        }
    }

    fn helpful_counts(&self, review_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        let t = self.lock()?;
        let mut counts = HashMap::new();
        for (review_id, _) in t.helpful_votes.iter().filter(|(r, _)| review_ids.contains(r)) {
            *counts.entry(*review_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn helpful_voted_by(&self, review_ids: &[Uuid], user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        let t = self.lock()?;
        Ok(t.helpful_votes
            .iter()
            .filter(|(r, u)| *u == user_id && review_ids.contains(r))
            .map(|(r, _)| *r)
            .collect())
    }

    // --- Reports and moderation log ---

    fn insert_report(&self, report: &Report) -> StoreResult<()> {
        self.lock()?.reports.push(report.clone());
        Ok(())
    }

    fn find_report(&self, id: Uuid) -> StoreResult<Option<Report>> {
        Ok(self.lock()?.reports.iter().find(|r| r.id == id).cloned())
    }

    fn list_reports(&self, resolved: Option<bool>, offset: u64, limit: u64) -> StoreResult<(Vec<Report>, u64)> {
        let t = self.lock()?;
        let mut rows: Vec<Report> = t
            .reports
            .iter()
            .filter(|r| resolved.map_or(true, |flag| r.resolved == flag))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, offset, limit))
    }

    fn resolve_report(&self, id: Uuid, by: Uuid, at: DateTime<Utc>) -> StoreResult<Option<Report>> {
        let mut t = self.lock()?;
        match t.reports.iter_mut().find(|r| r.id == id && !r.resolved) {
            Some(report) => {
                report.resolved = true;
                report.resolved_by = Some(by);
                report.resolved_at = Some(at);
                Ok(Some(report.clone()))
            }
            None => Ok(None),
        }
    }

    fn insert_moderation_action(&self, action: &ModerationAction) -> StoreResult<()> {
        self.lock()?.moderation_actions.push(action.clone());
        Ok(())
    }

    fn list_moderation_actions(&self, offset: u64, limit: u64) -> StoreResult<(Vec<ModerationAction>, u64)> {
        let mut rows = self.lock()?.moderation_actions.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, offset, limit))
    }

    // --- Forums ---

    fn list_forum_categories(&self) -> StoreResult<Vec<ForumCategory>> {
        let mut rows = self.lock()?.forum_categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn find_forum_category(&self, id: Uuid) -> StoreResult<Option<ForumCategory>> {
        Ok(self.lock()?.forum_categories.iter().find(|c| c.id == id).cloned())
    }

    fn find_forum_category_by_slug(&self, slug: &str) -> StoreResult<Option<ForumCategory>> {
        Ok(self.lock()?.forum_categories.iter().find(|c| c.slug == slug).cloned())
    }

    fn insert_forum_category(&self, category: &ForumCategory) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.slug_exists(SlugScope::ForumCategories, &category.slug, None) {
            return Err(StoreError::Duplicate(constraints::FORUM_CATEGORIES_SLUG.into()));
        }
        t.forum_categories.push(category.clone());
        Ok(())
    }

    fn insert_thread(&self, thread: &Thread) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.slug_exists(SlugScope::Threads, &thread.slug, None) {
            return Err(StoreError::Duplicate(constraints::THREADS_SLUG.into()));
        }
        t.threads.push(thread.clone());
        Ok(())
    }

    fn find_thread(&self, id: Uuid) -> StoreResult<Option<Thread>> {
        Ok(self.lock()?.threads.iter().find(|th| th.id == id).cloned())
    }

    fn find_thread_by_slug(&self, slug: &str) -> StoreResult<Option<Thread>> {
        Ok(self.lock()?.threads.iter().find(|th| th.slug == slug).cloned())
    }

    fn list_threads(&self, category_id: Option<Uuid>, offset: u64, limit: u64) -> StoreResult<(Vec<Thread>, u64)> {
        let t = self.lock()?;
        let mut rows: Vec<Thread> = t
            .threads
            .iter()
            .filter(|th| category_id.map_or(true, |c| th.category_id == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.is_pinned.cmp(&a.is_pinned).then(b.created_at.cmp(&a.created_at)));
        Ok(page(rows, offset, limit))
    }

    fn update_thread_flags(&self, id: Uuid, is_pinned: Option<bool>, is_locked: Option<bool>) -> StoreResult<Thread> {
        let mut t = self.lock()?;
        let thread = t.threads.iter_mut().find(|th| th.id == id).ok_or(StoreError::NotFound)?;
        if let Some(pinned) = is_pinned {
            thread.is_pinned = pinned;
        }
        if let Some(locked) = is_locked {
            thread.is_locked = locked;
        }
        thread.updated_at = Utc::now();
        Ok(thread.clone())
    }

    fn increment_thread_views(&self, id: Uuid) -> StoreResult<i64> {
        let mut t = self.lock()?;
        let thread = t.threads.iter_mut().find(|th| th.id == id).ok_or(StoreError::NotFound)?;
        thread.view_count += 1;
        Ok(thread.view_count)
    }

    fn post_counts(&self, thread_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        let t = self.lock()?;
        let mut counts = HashMap::new();
        for post in t.posts.iter().filter(|p| thread_ids.contains(&p.thread_id)) {
            *counts.entry(post.thread_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn insert_post(&self, post: &ForumPost) -> StoreResult<()> {
        self.lock()?.posts.push(post.clone());
        Ok(())
    }

    fn find_post(&self, id: Uuid) -> StoreResult<Option<ForumPost>> {
        Ok(self.lock()?.posts.iter().find(|p| p.id == id).cloned())
    }

    fn thread_posts(&self, thread_id: Uuid) -> StoreResult<Vec<ForumPost>> {
        let t = self.lock()?;
        let mut rows: Vec<ForumPost> = t.posts.iter().filter(|p| p.thread_id == thread_id).cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn delete_post(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        if !t.posts.iter().any(|p| p.id == id) {
            return Err(StoreError::NotFound);
        }
        t.remove_posts(id);
        Ok(())
    }

    fn toggle_post_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let key = (post_id, user_id);
        if t.post_likes.remove(&key) {
            Ok(false)
        } else {
            t.post_likes.insert(key);
            Ok(true)
        }
    }

    fn post_like_counts(&self, post_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        let t = self.lock()?;
        let mut counts = HashMap::new();
        for (post_id, _) in t.post_likes.iter().filter(|(p, _)| post_ids.contains(p)) {
            *counts.entry(*post_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn posts_liked_by(&self, post_ids: &[Uuid], user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        let t = self.lock()?;
        Ok(t.post_likes
            .iter()
            .filter(|(p, u)| *u == user_id && post_ids.contains(p))
            .map(|(p, _)| *p)
            .collect())
    }

    // --- Notifications ---

    fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.lock()?.notifications.push(notification.clone());
        Ok(())
    }

    fn list_notifications(&self, recipient_id: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Notification>, u64)> {
        let t = self.lock()?;
        let mut rows: Vec<Notification> = t
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, offset, limit))
    }

    fn unread_notification_count(&self, recipient_id: Uuid) -> StoreResult<i64> {
        let t = self.lock()?;
        Ok(t.notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as i64)
    }

    fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<bool> {
        let mut t = self.lock()?;
        match t.notifications.iter_mut().find(|n| n.id == id && n.recipient_id == recipient_id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn mark_all_notifications_read(&self, recipient_id: Uuid) -> StoreResult<u64> {
        let mut t = self.lock()?;
        let mut updated = 0;
        for n in t.notifications.iter_mut().filter(|n| n.recipient_id == recipient_id && !n.is_read) {
            n.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    // --- Collections ---

    fn insert_collection(&self, collection: &Collection) -> StoreResult<()> {
        self.lock()?.collections.push(collection.clone());
        Ok(())
    }

    fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(self.lock()?.collections.iter().find(|c| c.id == id).cloned())
    }

    fn list_collections(&self, user_id: Uuid, public_only: bool) -> StoreResult<Vec<Collection>> {
        let t = self.lock()?;
        let mut rows: Vec<Collection> = t
            .collections
            .iter()
            .filter(|c| c.user_id == user_id && (!public_only || c.is_public))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn delete_collection(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        let before = t.collections.len();
        t.collections.retain(|c| c.id != id);
        if t.collections.len() == before {
            return Err(StoreError::NotFound);
        }
        t.collection_mods.retain(|(c, _, _)| *c != id);
        Ok(())
    }

    fn add_collection_mod(&self, collection_id: Uuid, mod_id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        if !t.collection_mods.iter().any(|(c, m, _)| *c == collection_id && *m == mod_id) {
            t.collection_mods.push((collection_id, mod_id, Utc::now()));
        }
        Ok(())
    }

    fn remove_collection_mod(&self, collection_id: Uuid, mod_id: Uuid) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let before = t.collection_mods.len();
        t.collection_mods.retain(|(c, m, _)| !(*c == collection_id && *m == mod_id));
        Ok(t.collection_mods.len() != before)
    }

    fn collection_mod_ids(&self, collection_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let t = self.lock()?;
        let mut rows: Vec<&(Uuid, Uuid, DateTime<Utc>)> =
            t.collection_mods.iter().filter(|(c, _, _)| *c == collection_id).collect();
        rows.sort_by(|a, b| a.2.cmp(&b.2));
        Ok(rows.into_iter().map(|(_, m, _)| *m).collect())
    }

    // --- Analytics ---

    fn downloads_per_day(&self, since: DateTime<Utc>) -> StoreResult<Vec<DailyDownloads>> {
        let t = self.lock()?;
        let mut days: std::collections::BTreeMap<chrono::NaiveDate, i64> = Default::default();
        for log in t.download_logs.iter().filter(|l| l.created_at >= since) {
            *days.entry(log.created_at.date_naive()).or_insert(0) += 1;
        }
        Ok(days
            .into_iter()
            .map(|(day, downloads)| DailyDownloads { day, downloads })
            .collect())
    }

    fn mods_per_category(&self) -> StoreResult<Vec<CategoryModCount>> {
        let t = self.lock()?;
        let mut rows: Vec<CategoryModCount> = t
            .categories
            .iter()
            .map(|c| CategoryModCount {
                category: c.name.clone(),
                mod_count: t.mods.iter().filter(|m| m.category_id == c.id).count() as i64,
            })
            .collect();
        rows.sort_by(|a, b| b.mod_count.cmp(&a.mod_count).then(a.category.cmp(&b.category)));
        Ok(rows)
    }

    fn top_authors(&self, limit: u64) -> StoreResult<Vec<AuthorStats>> {
        let t = self.lock()?;
        let mut totals: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for m in &t.mods {
            let entry = totals.entry(m.author_id).or_insert((0, 0));
            entry.0 += m.download_count;
            entry.1 += 1;
        }
        let mut rows: Vec<AuthorStats> = totals
            .into_iter()
            .filter_map(|(author, (total_downloads, mod_count))| {
                t.username_of(author).map(|username| AuthorStats {
                    username: username.to_string(),
                    total_downloads,
                    mod_count,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.total_downloads.cmp(&a.total_downloads).then(a.username.cmp(&b.username)));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}
