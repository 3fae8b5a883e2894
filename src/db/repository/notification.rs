use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    col_enum, col_opt_timestamp, col_opt_uuid, col_timestamp, col_uuid, format_timestamp,
    opt_timestamp_str, opt_uuid_str,
};
use crate::db::DatabaseError;
use crate::models::*;

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, recipient_role, category,
    notification_type, priority, title, message, link, related_id, is_read, created_at, read_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: col_uuid(row, 0)?,
        recipient_id: col_uuid(row, 1)?,
        recipient_role: col_enum(row, 2)?,
        category: col_enum(row, 3)?,
        notification_type: col_enum(row, 4)?,
        priority: col_enum(row, 5)?,
        title: row.get(6)?,
        message: row.get(7)?,
        link: row.get(8)?,
        related_id: col_opt_uuid(row, 9)?,
        is_read: row.get(10)?,
        created_at: col_timestamp(row, 11)?,
        read_at: col_opt_timestamp(row, 12)?,
    })
}

pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, recipient_role, category,
         notification_type, priority, title, message, link, related_id, is_read,
         created_at, read_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            n.id.to_string(),
            n.recipient_id.to_string(),
            n.recipient_role.as_str(),
            n.category.as_str(),
            n.notification_type.as_str(),
            n.priority.as_str(),
            n.title,
            n.message,
            n.link,
            opt_uuid_str(n.related_id),
            n.is_read,
            format_timestamp(&n.created_at),
            opt_timestamp_str(n.read_at),
        ],
    )?;
    Ok(())
}

pub fn get_notification(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Notification>, DatabaseError> {
    let n = conn
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![id.to_string()],
            notification_from_row,
        )
        .optional()?;
    Ok(n)
}

/// Notifications for a recipient, newest first.
pub fn list_notifications(
    conn: &Connection,
    recipient_id: &Uuid,
    unread_only: bool,
    limit: u32,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE recipient_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY created_at DESC LIMIT ?3"
    ))?;
    let rows = stmt.query_map(
        params![recipient_id.to_string(), unread_only, limit],
        notification_from_row,
    )?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn count_unread_notifications(
    conn: &Connection,
    recipient_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_notification_read(
    conn: &Connection,
    id: &Uuid,
    read_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?1) WHERE id = ?2",
        params![format_timestamp(read_at), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Notification", id));
    }
    Ok(())
}

/// Marks every unread notification for the recipient. Returns how many changed.
pub fn mark_all_notifications_read(
    conn: &Connection,
    recipient_id: &Uuid,
    read_at: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1, read_at = ?1
         WHERE recipient_id = ?2 AND is_read = 0",
        params![format_timestamp(read_at), recipient_id.to_string()],
    )?;
    Ok(changed)
}
