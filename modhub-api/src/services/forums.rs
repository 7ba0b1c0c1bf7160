//! Forum categories, threads and the reply tree under each thread.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{ForumCategory, ForumPost, Thread};
use crate::services::{moderation, notifications, slug};
use crate::store::{SlugScope, Store, StoreResult};
use crate::views::{self, PostNode, ThreadDetail, ThreadListItem};

#[derive(Debug, Deserialize, Validate)]
pub struct ForumCategoryInput {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 120, message = "slug must be at most 120 characters"))]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadFilters {
    /// Forum category slug.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateThreadInput {
    pub category_id: Uuid,
    #[validate(length(min = 3, max = 200, message = "title must be between 3 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 20000, message = "content must be between 1 and 20000 characters"))]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadFlags {
    pub is_pinned: Option<bool>,
    pub is_locked: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostInput {
    pub thread_id: Uuid,
    #[validate(length(min = 1, max = 10000, message = "content must be between 1 and 10000 characters"))]
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PostLike {
    pub liked: bool,
    pub like_count: i64,
}

fn thread_not_found() -> AppError {
    AppError::new(ErrorCode::ThreadNotFound, "thread not found")
}

fn post_not_found() -> AppError {
    AppError::new(ErrorCode::PostNotFound, "post not found")
}

// --- Categories ---

pub fn list_categories(store: &dyn Store) -> AppResult<Vec<ForumCategory>> {
    Ok(store.list_forum_categories()?)
}

pub fn create_category(store: &dyn Store, input: ForumCategoryInput) -> AppResult<ForumCategory> {
    input.validate()?;
    let id = Uuid::now_v7();
    let base = slug::base_slug(&input.name, "forum", id);

    slug::insert_with_slug(store, SlugScope::ForumCategories, input.slug.as_deref(), &base, |slug| {
        let category = ForumCategory {
            id,
            name: input.name.trim().to_string(),
            slug,
            description: input.description.clone(),
        };
        store.insert_forum_category(&category)?;
        Ok(category)
    })
}

// --- Threads ---

/// Pinned threads first, then newest.
pub fn list_threads(
    store: &dyn Store,
    filters: &ThreadFilters,
    page: &PaginationParams,
) -> AppResult<Paginated<ThreadListItem>> {
    let category_id = match filters.category.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => match store.find_forum_category_by_slug(slug)? {
            Some(category) => Some(category.id),
            None => return Ok(Paginated::new(Vec::new(), 0, page)),
        },
        None => None,
    };
    let (rows, total) = store.list_threads(category_id, page.offset(), page.limit())?;
    let items = views::thread_list_items(store, rows)?;
    Ok(Paginated::new(items, total, page))
}

pub fn create_thread(store: &dyn Store, caller: &AuthUser, input: CreateThreadInput) -> AppResult<ThreadDetail> {
    input.validate()?;
    if store.find_forum_category(input.category_id)?.is_none() {
        return Err(AppError::new(ErrorCode::ForumCategoryNotFound, "forum category not found"));
    }

    let id = Uuid::now_v7();
    let now = Utc::now();
    let base = slug::base_slug(&input.title, "thread", id);
    let thread = slug::insert_with_slug(store, SlugScope::Threads, None, &base, |slug| {
        let thread = Thread {
            id,
            category_id: input.category_id,
            author_id: caller.id,
            title: input.title.trim().to_string(),
            slug,
            content: input.content.clone(),
            is_pinned: false,
            is_locked: false,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.insert_thread(&thread)?;
        Ok(thread)
    })?;

    tracing::info!(thread_id = %thread.id, slug = %thread.slug, author_id = %caller.id, "thread created");
    Ok(thread_detail(store, thread, Some(caller))?)
}

/// Thread with its reply tree. Each read counts as a view.
pub fn get_thread(store: &dyn Store, slug: &str, caller: Option<&AuthUser>) -> AppResult<ThreadDetail> {
    let mut thread = store.find_thread_by_slug(slug)?.ok_or_else(thread_not_found)?;
    thread.view_count = store.increment_thread_views(thread.id)?;
    Ok(thread_detail(store, thread, caller)?)
}

pub fn update_thread(store: &dyn Store, slug: &str, flags: ThreadFlags) -> AppResult<ThreadListItem> {
    let thread = store.find_thread_by_slug(slug)?.ok_or_else(thread_not_found)?;
    let updated = store.update_thread_flags(thread.id, flags.is_pinned, flags.is_locked)?;
    tracing::info!(thread_id = %updated.id, pinned = updated.is_pinned, locked = updated.is_locked, "thread flags updated");

    let mut items = views::thread_list_items(store, vec![updated])?;
    items.pop().ok_or_else(thread_not_found)
}

fn thread_detail(store: &dyn Store, thread: Thread, caller: Option<&AuthUser>) -> StoreResult<ThreadDetail> {
    let posts = store.thread_posts(thread.id)?;
    let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

    let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
    author_ids.push(thread.author_id);
    let names = store.usernames(&author_ids)?;
    let likes = store.post_like_counts(&post_ids)?;
    let liked = match caller {
        Some(user) => store.posts_liked_by(&post_ids, user.id)?,
        None => HashSet::new(),
    };
    let category = store
        .find_forum_category(thread.category_id)?
        .map(|c| c.name)
        .unwrap_or_default();

    let tree = PostTree { names: &names, likes: &likes, liked: &liked, children: children_of(posts) };
    Ok(ThreadDetail {
        author: names.get(&thread.author_id).cloned().unwrap_or_else(|| "[deleted]".into()),
        posts: tree.build(None, 0),
        category,
        id: thread.id,
        title: thread.title,
        slug: thread.slug,
        content: thread.content,
        is_pinned: thread.is_pinned,
        is_locked: thread.is_locked,
        view_count: thread.view_count,
        created_at: thread.created_at,
    })
}

/// Posts grouped under their parent, each group oldest first.
fn children_of(posts: Vec<ForumPost>) -> HashMap<Option<Uuid>, Vec<ForumPost>> {
    let mut children: HashMap<Option<Uuid>, Vec<ForumPost>> = HashMap::new();
    for post in posts {
        children.entry(post.parent_id).or_default().push(post);
    }
    for group in children.values_mut() {
        group.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
    children
}

struct PostTree<'a> {
    names: &'a HashMap<Uuid, String>,
    likes: &'a HashMap<Uuid, i64>,
    liked: &'a HashSet<Uuid>,
    children: HashMap<Option<Uuid>, Vec<ForumPost>>,
}

impl PostTree<'_> {
    fn build(&self, parent: Option<Uuid>, depth: usize) -> Vec<PostNode> {
        let Some(posts) = self.children.get(&parent) else {
            return Vec::new();
        };
        posts
            .iter()
            .map(|p| PostNode {
                id: p.id,
                author: self.names.get(&p.author_id).cloned().unwrap_or_else(|| "[deleted]".into()),
                content: p.content.clone(),
                depth,
                like_count: self.likes.get(&p.id).copied().unwrap_or(0),
                is_liked: self.liked.contains(&p.id),
                created_at: p.created_at,
                replies: self.build(Some(p.id), depth + 1),
            })
            .collect()
    }
}

// --- Posts ---

fn depth_of(store: &dyn Store, mut parent: Option<Uuid>) -> StoreResult<usize> {
    let mut depth = 0;
    while let Some(id) = parent {
        depth += 1;
        parent = store.find_post(id)?.and_then(|p| p.parent_id);
    }
    Ok(depth)
}

/// Replies notify the parent's author unless they are replying to themselves.
pub fn create_post(store: &dyn Store, caller: &AuthUser, input: CreatePostInput) -> AppResult<PostNode> {
    input.validate()?;
    let thread = store.find_thread(input.thread_id)?.ok_or_else(thread_not_found)?;
    if thread.is_locked && !caller.is_staff() {
        return Err(AppError::new(ErrorCode::ThreadLocked, "thread is locked"));
    }

    let parent = match input.parent_id {
        Some(parent_id) => {
            let parent = store.find_post(parent_id)?.ok_or_else(post_not_found)?;
            if parent.thread_id != thread.id {
                return Err(AppError::new(
                    ErrorCode::ParentPostMismatch,
                    "parent post belongs to another thread",
                ));
            }
            Some(parent)
        }
        None => None,
    };

    let post = ForumPost {
        id: Uuid::now_v7(),
        thread_id: thread.id,
        author_id: caller.id,
        parent_id: parent.as_ref().map(|p| p.id),
        content: input.content,
        created_at: Utc::now(),
    };
    store.insert_post(&post)?;

    let username = store
        .find_user(caller.id)?
        .map(|u| u.username)
        .unwrap_or_else(|| "Someone".to_string());

    if let Some(parent) = parent.as_ref().filter(|p| p.author_id != caller.id) {
        notifications::notify(
            store,
            parent.author_id,
            &format!("{username} replied to your comment"),
            &format!("/forums/thread/{}", thread.slug),
        )?;
    }

    tracing::info!(post_id = %post.id, thread_id = %thread.id, "post created");
    Ok(PostNode {
        id: post.id,
        author: username,
        content: post.content,
        depth: depth_of(store, post.parent_id)?,
        like_count: 0,
        is_liked: false,
        created_at: post.created_at,
        replies: Vec::new(),
    })
}

/// Removes the post together with its replies.
pub fn delete_post(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<()> {
    let post = store.find_post(id)?.ok_or_else(post_not_found)?;
    if post.author_id != caller.id && !caller.is_staff() {
        return Err(AppError::forbidden("only the author or staff can delete this post"));
    }
    store.delete_post(id)?;
    if post.author_id != caller.id {
        moderation::record_action(store, caller.id, "delete_post", "post", id, None)?;
    }
    Ok(())
}

pub fn toggle_like(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<PostLike> {
    store.find_post(id)?.ok_or_else(post_not_found)?;
    let liked = store.toggle_post_like(id, caller.id)?;
    let like_count = store.post_like_counts(&[id])?.get(&id).copied().unwrap_or(0);
    Ok(PostLike { liked, like_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing;
    use modhub_shared::types::auth::UserRole;

    struct Board {
        store: MemoryStore,
        alice: AuthUser,
        bob: AuthUser,
        thread: ThreadDetail,
    }

    fn board() -> Board {
        let store = MemoryStore::new();
        let alice = testing::user(&store, &testing::unique_name("alice"), UserRole::User);
        let bob = testing::user(&store, &testing::unique_name("bob"), UserRole::User);
        let category = create_category(&store, ForumCategoryInput {
            name: "General".into(),
            slug: None,
            description: String::new(),
        })
        .unwrap();
        let thread = create_thread(&store, &alice, CreateThreadInput {
            category_id: category.id,
            title: "Best truck?".into(),
            content: "Discuss".into(),
        })
        .unwrap();
        Board { store, alice, bob, thread }
    }

    fn post(b: &Board, who: &AuthUser, parent: Option<Uuid>) -> PostNode {
        create_post(&b.store, who, CreatePostInput {
            thread_id: b.thread.id,
            content: "reply".into(),
            parent_id: parent,
        })
        .unwrap()
    }

    fn unread(b: &Board, who: &AuthUser) -> i64 {
        notifications::unread_count(&b.store, who).unwrap().count
    }

    #[test]
    fn replies_notify_other_authors_only() {
        let b = board();
        let root = post(&b, &b.alice, None);

        post(&b, &b.alice, Some(root.id));
        assert_eq!(unread(&b, &b.alice), 0);

        post(&b, &b.bob, Some(root.id));
        assert_eq!(unread(&b, &b.alice), 1);

        let feed = notifications::list(&b.store, &b.alice, &PaginationParams::default()).unwrap();
        assert!(feed.items[0].message.ends_with("replied to your comment"));
        assert_eq!(feed.items[0].link, format!("/forums/thread/{}", b.thread.slug));
    }

    #[test]
    fn like_twice_restores_original_state() {
        let b = board();
        let root = post(&b, &b.alice, None);

        let first = toggle_like(&b.store, &b.bob, root.id).unwrap();
        assert!(first.liked);
        assert_eq!(first.like_count, 1);

        let second = toggle_like(&b.store, &b.bob, root.id).unwrap();
        assert!(!second.liked);
        assert_eq!(second.like_count, 0);
    }

    #[test]
    fn thread_view_builds_ordered_tree() {
        let b = board();
        let root = post(&b, &b.alice, None);
        let first = post(&b, &b.bob, Some(root.id));
        let nested = post(&b, &b.alice, Some(first.id));
        let second = post(&b, &b.bob, Some(root.id));
        assert_eq!(nested.depth, 2);

        let detail = get_thread(&b.store, &b.thread.slug, Some(&b.bob)).unwrap();
        assert_eq!(detail.view_count, 1);
        assert_eq!(detail.posts.len(), 1);

        let replies = &detail.posts[0].replies;
        assert_eq!(replies.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(replies[0].replies[0].id, nested.id);
        assert_eq!(replies[0].replies[0].depth, 2);
    }

    #[test]
    fn locked_threads_reject_regular_posters() {
        let b = board();
        update_thread(&b.store, &b.thread.slug, ThreadFlags { is_locked: Some(true), ..Default::default() }).unwrap();

        let err = create_post(&b.store, &b.bob, CreatePostInput {
            thread_id: b.thread.id,
            content: "let me in".into(),
            parent_id: None,
        })
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ThreadLocked);

        let staff = testing::user(&b.store, &testing::unique_name("staff"), UserRole::Moderator);
        post(&b, &staff, None);
    }

    #[test]
    fn parent_must_belong_to_the_same_thread() {
        let b = board();
        let other = create_thread(&b.store, &b.bob, CreateThreadInput {
            category_id: b.store.list_forum_categories().unwrap()[0].id,
            title: "Best trailer?".into(),
            content: "Discuss".into(),
        })
        .unwrap();
        let foreign = create_post(&b.store, &b.bob, CreatePostInput {
            thread_id: other.id,
            content: "elsewhere".into(),
            parent_id: None,
        })
        .unwrap();

        let err = create_post(&b.store, &b.alice, CreatePostInput {
            thread_id: b.thread.id,
            content: "cross".into(),
            parent_id: Some(foreign.id),
        })
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParentPostMismatch);
    }

    #[test]
    fn deleting_a_post_removes_its_replies() {
        let b = board();
        let root = post(&b, &b.alice, None);
        post(&b, &b.bob, Some(root.id));

        let err = delete_post(&b.store, &b.bob, root.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        delete_post(&b.store, &b.alice, root.id).unwrap();
        assert!(b.store.thread_posts(b.thread.id).unwrap().is_empty());
    }

    #[test]
    fn pinned_threads_list_first() {
        let b = board();
        let category = b.store.list_forum_categories().unwrap()[0].id;
        create_thread(&b.store, &b.bob, CreateThreadInput {
            category_id: category,
            title: "Newer thread".into(),
            content: "x".into(),
        })
        .unwrap();
        update_thread(&b.store, &b.thread.slug, ThreadFlags { is_pinned: Some(true), ..Default::default() }).unwrap();

        let page = list_threads(&b.store, &ThreadFilters::default(), &PaginationParams::default()).unwrap();
        assert_eq!(page.items[0].id, b.thread.id);
        assert_eq!(page.items.len(), 2);
    }
}
