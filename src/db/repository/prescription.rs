use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    col_enum, col_opt_timestamp, col_opt_uuid, col_timestamp, col_uuid, format_timestamp,
    opt_timestamp_str, opt_uuid_str,
};
use crate::db::DatabaseError;
use crate::models::enums::PrescriptionStatus;
use crate::models::*;

const PRESCRIPTION_COLUMNS: &str = "id, doctor_id, patient_id, pharmacy_id, medication, dosage,
    frequency, quantity, refills, instructions, status, created_at, dispensed_at";

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: col_uuid(row, 0)?,
        doctor_id: col_uuid(row, 1)?,
        patient_id: col_uuid(row, 2)?,
        pharmacy_id: col_opt_uuid(row, 3)?,
        medication: row.get(4)?,
        dosage: row.get(5)?,
        frequency: row.get(6)?,
        quantity: row.get(7)?,
        refills: row.get(8)?,
        instructions: row.get(9)?,
        status: col_enum(row, 10)?,
        created_at: col_timestamp(row, 11)?,
        dispensed_at: col_opt_timestamp(row, 12)?,
    })
}

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, doctor_id, patient_id, pharmacy_id, medication, dosage,
         frequency, quantity, refills, instructions, status, created_at, dispensed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            rx.id.to_string(),
            rx.doctor_id.to_string(),
            rx.patient_id.to_string(),
            opt_uuid_str(rx.pharmacy_id),
            rx.medication,
            rx.dosage,
            rx.frequency,
            rx.quantity,
            rx.refills,
            rx.instructions,
            rx.status.as_str(),
            format_timestamp(&rx.created_at),
            opt_timestamp_str(rx.dispensed_at),
        ],
    )?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let rx = conn
        .query_row(
            &format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1"),
            params![id.to_string()],
            prescription_from_row,
        )
        .optional()?;
    Ok(rx)
}

/// Moves an active prescription to `to`, stamping `dispensed_at` when dispensing.
pub fn close_prescription(
    conn: &Connection,
    id: &Uuid,
    to: PrescriptionStatus,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let dispensed_at = (to == PrescriptionStatus::Dispensed).then(|| format_timestamp(at));
    let changed = conn.execute(
        "UPDATE prescriptions SET status = ?1, dispensed_at = ?2
         WHERE id = ?3 AND status = 'active'",
        params![to.as_str(), dispensed_at, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "prescription {id} is no longer active"
        )));
    }
    Ok(())
}

/// Filtered listing, newest first.
pub fn list_prescriptions(
    conn: &Connection,
    filter: &PrescriptionFilter,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(status.as_str().to_string());
    }
    if let Some(id) = filter.doctor_id {
        clauses.push("doctor_id = ?");
        values.push(id.to_string());
    }
    if let Some(id) = filter.patient_id {
        clauses.push("patient_id = ?");
        values.push(id.to_string());
    }
    if let Some(id) = filter.pharmacy_id {
        clauses.push("pharmacy_id = ?");
        values.push(id.to_string());
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions {where_sql} ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params_from_iter(values.iter()), prescription_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
