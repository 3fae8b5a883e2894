//! Notification fan-out and inbox operations.
//!
//! Every workflow that has an interested party writes through [`notify`],
//! inside the same transaction as the state change it announces.

use serde::Serialize;
use uuid::Uuid;

use rusqlite::Connection;

use crate::db::repository::{self, now_timestamp};
use crate::error::CareError;
use crate::models::enums::{ActorRole, NotificationCategory, NotificationPriority, NotificationType};
use crate::models::Notification;

/// Default page size for inbox listings.
pub const DEFAULT_INBOX_LIMIT: u32 = 50;
/// Hard cap on inbox page size.
pub const MAX_INBOX_LIMIT: u32 = 200;

/// Input for a single notification write.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub recipient_role: ActorRole,
    pub category: NotificationCategory,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub related_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

pub fn notify(conn: &Connection, new: NewNotification) -> Result<Notification, CareError> {
    let notification = Notification {
        id: Uuid::new_v4(),
        recipient_id: new.recipient_id,
        recipient_role: new.recipient_role,
        category: new.category,
        notification_type: new.notification_type,
        priority: new.priority,
        title: new.title,
        message: new.message,
        link: new.link,
        related_id: new.related_id,
        is_read: false,
        created_at: now_timestamp(),
        read_at: None,
    };
    repository::insert_notification(conn, &notification)?;
    tracing::debug!(
        notification_id = %notification.id,
        recipient_id = %notification.recipient_id,
        kind = notification.notification_type.as_str(),
        "Notification queued"
    );
    Ok(notification)
}

pub fn list_for_recipient(
    conn: &Connection,
    recipient_id: &Uuid,
    unread_only: bool,
    limit: Option<u32>,
) -> Result<Vec<Notification>, CareError> {
    let limit = limit.unwrap_or(DEFAULT_INBOX_LIMIT).clamp(1, MAX_INBOX_LIMIT);
    Ok(repository::list_notifications(conn, recipient_id, unread_only, limit)?)
}

pub fn unread_count(conn: &Connection, recipient_id: &Uuid) -> Result<UnreadCount, CareError> {
    Ok(UnreadCount {
        unread: repository::count_unread_notifications(conn, recipient_id)?,
    })
}

/// Marks one notification read. Only its recipient may do so.
pub fn mark_read(
    conn: &Connection,
    notification_id: &Uuid,
    recipient_id: &Uuid,
) -> Result<Notification, CareError> {
    let notification = repository::get_notification(conn, notification_id)?
        .ok_or_else(|| CareError::not_found("Notification", notification_id))?;
    if notification.recipient_id != *recipient_id {
        return Err(CareError::forbidden("Notification belongs to another user"));
    }
    repository::mark_notification_read(conn, notification_id, &now_timestamp())?;
    repository::get_notification(conn, notification_id)?
        .ok_or_else(|| CareError::not_found("Notification", notification_id))
}

pub fn mark_all_read(conn: &Connection, recipient_id: &Uuid) -> Result<usize, CareError> {
    Ok(repository::mark_all_notifications_read(
        conn,
        recipient_id,
        &now_timestamp(),
    )?)
}
