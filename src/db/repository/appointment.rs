use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_enum, col_timestamp, col_uuid, format_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "id, doctor_id, patient_id, scheduled_at, duration_minutes,
    reason, status, created_at, updated_at";

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: col_uuid(row, 0)?,
        doctor_id: col_uuid(row, 1)?,
        patient_id: col_uuid(row, 2)?,
        scheduled_at: col_timestamp(row, 3)?,
        duration_minutes: row.get(4)?,
        reason: row.get(5)?,
        status: col_enum(row, 6)?,
        created_at: col_timestamp(row, 7)?,
        updated_at: col_timestamp(row, 8)?,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, doctor_id, patient_id, scheduled_at, duration_minutes,
         reason, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            appt.id.to_string(),
            appt.doctor_id.to_string(),
            appt.patient_id.to_string(),
            format_timestamp(&appt.scheduled_at),
            appt.duration_minutes,
            appt.reason,
            appt.status.as_str(),
            format_timestamp(&appt.created_at),
            format_timestamp(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let appt = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id.to_string()],
            appointment_from_row,
        )
        .optional()?;
    Ok(appt)
}

/// Moves an appointment out of `from`. Fails if it is no longer there.
pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    from: AppointmentStatus,
    to: AppointmentStatus,
    updated_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), format_timestamp(updated_at), id.to_string(), from.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "appointment {id} is no longer {from}"
        )));
    }
    Ok(())
}

/// True when the doctor already has a scheduled appointment overlapping
/// `[start, start + duration)`.
pub fn doctor_has_overlap(
    conn: &Connection,
    doctor_id: &Uuid,
    start: &NaiveDateTime,
    duration_minutes: u32,
) -> Result<bool, DatabaseError> {
    let end = *start + chrono::Duration::minutes(i64::from(duration_minutes));
    let mut stmt = conn.prepare(
        "SELECT scheduled_at, duration_minutes FROM appointments
         WHERE doctor_id = ?1 AND status = 'scheduled' AND scheduled_at < ?2",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string(), format_timestamp(&end)], |row| {
        Ok((col_timestamp(row, 0)?, row.get::<_, u32>(1)?))
    })?;
    for row in rows {
        let (other_start, other_minutes) = row?;
        let other_end = other_start + chrono::Duration::minutes(i64::from(other_minutes));
        if other_end > *start {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn list_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE doctor_id = ?1 ORDER BY scheduled_at ASC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], appointment_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = ?1 ORDER BY scheduled_at ASC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], appointment_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
