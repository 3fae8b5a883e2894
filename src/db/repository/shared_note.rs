use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    col_enum, col_opt_timestamp, col_opt_uuid, col_timestamp, col_uuid, format_timestamp,
    opt_timestamp_str, opt_uuid_str,
};
use crate::db::DatabaseError;
use crate::models::*;

const SHARED_NOTE_COLUMNS: &str = "id, note_id, patient_id, doctor_id, shared_by, share_type,
    referral_id, message, is_read, shared_at, read_at";

fn shared_note_from_row(row: &Row<'_>) -> rusqlite::Result<SharedClinicalNote> {
    Ok(SharedClinicalNote {
        id: col_uuid(row, 0)?,
        note_id: col_uuid(row, 1)?,
        patient_id: col_uuid(row, 2)?,
        doctor_id: col_uuid(row, 3)?,
        shared_by: col_uuid(row, 4)?,
        share_type: col_enum(row, 5)?,
        referral_id: col_opt_uuid(row, 6)?,
        message: row.get(7)?,
        is_read: row.get(8)?,
        shared_at: col_timestamp(row, 9)?,
        read_at: col_opt_timestamp(row, 10)?,
    })
}

pub fn insert_shared_note(
    conn: &Connection,
    shared: &SharedClinicalNote,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO shared_clinical_notes (id, note_id, patient_id, doctor_id, shared_by,
         share_type, referral_id, message, is_read, shared_at, read_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            shared.id.to_string(),
            shared.note_id.to_string(),
            shared.patient_id.to_string(),
            shared.doctor_id.to_string(),
            shared.shared_by.to_string(),
            shared.share_type.as_str(),
            opt_uuid_str(shared.referral_id),
            shared.message,
            shared.is_read,
            format_timestamp(&shared.shared_at),
            opt_timestamp_str(shared.read_at),
        ],
    )?;
    Ok(())
}

/// Looks up the share for a (note, recipient, referral) tuple. A `None`
/// referral matches only direct shares.
pub fn find_shared_note(
    conn: &Connection,
    note_id: &Uuid,
    doctor_id: &Uuid,
    referral_id: Option<&Uuid>,
) -> Result<Option<SharedClinicalNote>, DatabaseError> {
    let shared = conn
        .query_row(
            &format!(
                "SELECT {SHARED_NOTE_COLUMNS} FROM shared_clinical_notes
                 WHERE note_id = ?1 AND doctor_id = ?2 AND referral_id IS ?3"
            ),
            params![
                note_id.to_string(),
                doctor_id.to_string(),
                referral_id.map(|id| id.to_string()),
            ],
            shared_note_from_row,
        )
        .optional()?;
    Ok(shared)
}

pub fn get_shared_note(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<SharedClinicalNote>, DatabaseError> {
    let shared = conn
        .query_row(
            &format!("SELECT {SHARED_NOTE_COLUMNS} FROM shared_clinical_notes WHERE id = ?1"),
            params![id.to_string()],
            shared_note_from_row,
        )
        .optional()?;
    Ok(shared)
}

/// Notes shared with a doctor, newest first.
pub fn list_shared_with_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    unread_only: bool,
) -> Result<Vec<SharedClinicalNote>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHARED_NOTE_COLUMNS} FROM shared_clinical_notes
         WHERE doctor_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY shared_at DESC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string(), unread_only], shared_note_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// True when any share (direct or referral) exposes the note to the doctor.
pub fn is_note_shared_with(
    conn: &Connection,
    note_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let shared: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM shared_clinical_notes WHERE note_id = ?1 AND doctor_id = ?2)",
        params![note_id.to_string(), doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(shared)
}

pub fn mark_shared_note_read(
    conn: &Connection,
    id: &Uuid,
    read_at: &chrono::NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE shared_clinical_notes SET is_read = 1, read_at = COALESCE(read_at, ?1)
         WHERE id = ?2",
        params![format_timestamp(read_at), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("SharedClinicalNote", id));
    }
    Ok(())
}
