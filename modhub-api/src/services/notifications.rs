use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::AuthUser;
use modhub_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::Notification;
use crate::store::{Store, StoreResult};

const MAX_TEXT_LEN: usize = 255;

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

fn clip(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

pub fn notify(store: &dyn Store, recipient_id: Uuid, message: &str, link: &str) -> StoreResult<Notification> {
    let notification = Notification {
        id: Uuid::now_v7(),
        recipient_id,
        message: clip(message),
        link: clip(link),
        is_read: false,
        created_at: Utc::now(),
    };
    store.insert_notification(&notification)?;
    tracing::debug!(recipient_id = %recipient_id, notification_id = %notification.id, "notification created");
    Ok(notification)
}

/// Newest first.
pub fn list(store: &dyn Store, caller: &AuthUser, page: &PaginationParams) -> AppResult<Paginated<Notification>> {
    let (rows, total) = store.list_notifications(caller.id, page.offset(), page.limit())?;
    Ok(Paginated::new(rows, total, page))
}

pub fn unread_count(store: &dyn Store, caller: &AuthUser) -> AppResult<UnreadCount> {
    Ok(UnreadCount { count: store.unread_notification_count(caller.id)? })
}

/// Someone else's notification is reported as missing.
pub fn mark_read(store: &dyn Store, caller: &AuthUser, id: Uuid) -> AppResult<()> {
    if store.mark_notification_read(id, caller.id)? {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::NotificationNotFound, "notification not found"))
    }
}

pub fn mark_all_read(store: &dyn Store, caller: &AuthUser) -> AppResult<MarkedRead> {
    Ok(MarkedRead { updated: store.mark_all_notifications_read(caller.id)? })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing;
    use modhub_shared::types::auth::UserRole;

    #[test]
    fn only_the_recipient_marks_read() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, &testing::unique_name("alice"), UserRole::User);
        let bob = testing::user(&store, &testing::unique_name("bob"), UserRole::User);

        let n = notify(&store, alice.id, "bob replied to your comment", "/forums/thread/x").unwrap();
        notify(&store, alice.id, "carol replied to your comment", "/forums/thread/y").unwrap();

        let err = mark_read(&store, &bob, n.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotificationNotFound);
        assert_eq!(unread_count(&store, &alice).unwrap().count, 2);

        mark_read(&store, &alice, n.id).unwrap();
        assert_eq!(unread_count(&store, &alice).unwrap().count, 1);

        assert_eq!(mark_all_read(&store, &alice).unwrap().updated, 1);
        assert_eq!(unread_count(&store, &alice).unwrap().count, 0);
        assert_eq!(list(&store, &alice, &PaginationParams::default()).unwrap().total, 2);
    }

    #[test]
    fn long_messages_are_clipped() {
        let store = MemoryStore::new();
        let n = notify(&store, Uuid::now_v7(), &"x".repeat(400), "/").unwrap();
        assert_eq!(n.message.len(), MAX_TEXT_LEN);
    }
}
