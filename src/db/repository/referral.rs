use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    col_enum, col_opt_timestamp, col_opt_uuid, col_timestamp, col_uuid, format_timestamp,
    opt_timestamp_str, opt_uuid_str,
};
use crate::db::DatabaseError;
use crate::models::enums::ReferralStatus;
use crate::models::*;

/// Upper bound on rows returned by one page of a search.
pub const MAX_REFERRAL_PAGE: u32 = 200;

/// Narrows a listing to what one doctor may see: referrals they are a party
/// to, plus open referrals of their specialty.
#[derive(Debug, Clone, Copy)]
pub struct ReferralViewer<'a> {
    pub doctor_id: &'a Uuid,
    pub specialty: &'a str,
}

/// One page of a listing, applied after every filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralPage {
    pub limit: u32,
    pub offset: u32,
}

const REFERRAL_COLUMNS: &str = "id, referring_doctor_id, receiving_doctor_id, patient_id,
    clinical_note_id, specialty, urgency, reason, status, decline_reason, completion_notes,
    cancellation_reason, created_at, updated_at, accepted_at, declined_at, completed_at,
    cancelled_at";

fn referral_from_row(row: &Row<'_>) -> rusqlite::Result<Referral> {
    Ok(Referral {
        id: col_uuid(row, 0)?,
        referring_doctor_id: col_uuid(row, 1)?,
        receiving_doctor_id: col_opt_uuid(row, 2)?,
        patient_id: col_uuid(row, 3)?,
        clinical_note_id: col_opt_uuid(row, 4)?,
        specialty: row.get(5)?,
        urgency: col_enum(row, 6)?,
        reason: row.get(7)?,
        status: col_enum(row, 8)?,
        decline_reason: row.get(9)?,
        completion_notes: row.get(10)?,
        cancellation_reason: row.get(11)?,
        created_at: col_timestamp(row, 12)?,
        updated_at: col_timestamp(row, 13)?,
        accepted_at: col_opt_timestamp(row, 14)?,
        declined_at: col_opt_timestamp(row, 15)?,
        completed_at: col_opt_timestamp(row, 16)?,
        cancelled_at: col_opt_timestamp(row, 17)?,
    })
}

pub fn insert_referral(conn: &Connection, referral: &Referral) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO referrals (id, referring_doctor_id, receiving_doctor_id, patient_id,
         clinical_note_id, specialty, urgency, reason, status, decline_reason,
         completion_notes, cancellation_reason, created_at, updated_at, accepted_at,
         declined_at, completed_at, cancelled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            referral.id.to_string(),
            referral.referring_doctor_id.to_string(),
            opt_uuid_str(referral.receiving_doctor_id),
            referral.patient_id.to_string(),
            opt_uuid_str(referral.clinical_note_id),
            referral.specialty,
            referral.urgency.as_str(),
            referral.reason,
            referral.status.as_str(),
            referral.decline_reason,
            referral.completion_notes,
            referral.cancellation_reason,
            format_timestamp(&referral.created_at),
            format_timestamp(&referral.updated_at),
            opt_timestamp_str(referral.accepted_at),
            opt_timestamp_str(referral.declined_at),
            opt_timestamp_str(referral.completed_at),
            opt_timestamp_str(referral.cancelled_at),
        ],
    )?;
    Ok(())
}

pub fn get_referral(conn: &Connection, id: &Uuid) -> Result<Option<Referral>, DatabaseError> {
    let referral = conn
        .query_row(
            &format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE id = ?1"),
            params![id.to_string()],
            referral_from_row,
        )
        .optional()?;
    Ok(referral)
}

/// Persists a status transition.
///
/// The write is conditional on the row still holding `from`; a row that
/// moved on underneath the caller is reported as a constraint violation
/// and nothing is written.
pub fn update_referral_transition(
    conn: &Connection,
    referral: &Referral,
    from: ReferralStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE referrals
         SET receiving_doctor_id = ?1, status = ?2, decline_reason = ?3,
             completion_notes = ?4, cancellation_reason = ?5, updated_at = ?6,
             accepted_at = ?7, declined_at = ?8, completed_at = ?9, cancelled_at = ?10
         WHERE id = ?11 AND status = ?12",
        params![
            opt_uuid_str(referral.receiving_doctor_id),
            referral.status.as_str(),
            referral.decline_reason,
            referral.completion_notes,
            referral.cancellation_reason,
            format_timestamp(&referral.updated_at),
            opt_timestamp_str(referral.accepted_at),
            opt_timestamp_str(referral.declined_at),
            opt_timestamp_str(referral.completed_at),
            opt_timestamp_str(referral.cancelled_at),
            referral.id.to_string(),
            from.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "referral {} is no longer {}",
            referral.id, from
        )));
    }
    Ok(())
}

/// Filtered listing, newest first. Every filter field is optional and
/// combined with AND. `filter.limit` is ignored here; `page` bounds the
/// result, and `None` returns every match.
pub fn list_referrals(
    conn: &Connection,
    filter: &ReferralFilter,
    viewer: Option<ReferralViewer<'_>>,
    page: Option<ReferralPage>,
) -> Result<Vec<Referral>, DatabaseError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(viewer) = viewer {
        clauses.push(
            "(referring_doctor_id = ? OR receiving_doctor_id = ?
              OR (receiving_doctor_id IS NULL AND specialty = ? COLLATE NOCASE))",
        );
        values.push(viewer.doctor_id.to_string());
        values.push(viewer.doctor_id.to_string());
        values.push(viewer.specialty.trim().to_string());
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(status.as_str().to_string());
    }
    if let Some(urgency) = filter.urgency {
        clauses.push("urgency = ?");
        values.push(urgency.as_str().to_string());
    }
    let specialty = filter.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(specialty) = specialty {
        clauses.push("specialty = ? COLLATE NOCASE");
        values.push(specialty.to_string());
    }
    if let Some(id) = filter.referring_doctor_id {
        clauses.push("referring_doctor_id = ?");
        values.push(id.to_string());
    }
    if let Some(id) = filter.receiving_doctor_id {
        clauses.push("receiving_doctor_id = ?");
        values.push(id.to_string());
    }
    if let Some(id) = filter.patient_id {
        clauses.push("patient_id = ?");
        values.push(id.to_string());
    }
    let query = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    if let Some(query) = query {
        clauses.push("(reason LIKE ? ESCAPE '\\' OR specialty LIKE ? ESCAPE '\\')");
        let pattern = format!("%{}%", escape_like(query));
        values.push(pattern.clone());
        values.push(pattern);
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let page_sql = match page {
        Some(ReferralPage { limit, offset }) => format!("LIMIT {limit} OFFSET {offset}"),
        None => String::new(),
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {REFERRAL_COLUMNS} FROM referrals {where_sql}
         ORDER BY created_at DESC, id {page_sql}"
    ))?;
    let rows = stmt.query_map(params_from_iter(values.iter()), referral_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Pending referrals with no designated receiver for a specialty, newest first.
pub fn list_open_referrals(
    conn: &Connection,
    specialty: &str,
) -> Result<Vec<Referral>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REFERRAL_COLUMNS} FROM referrals
         WHERE receiving_doctor_id IS NULL AND status = 'pending'
           AND specialty = ?1 COLLATE NOCASE
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![specialty.trim()], referral_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Counts per status for referrals matching one party column.
pub fn count_referrals_by_status(
    conn: &Connection,
    party: ReferralParty,
    doctor_id: &Uuid,
) -> Result<HashMap<ReferralStatus, i64>, DatabaseError> {
    let column = match party {
        ReferralParty::Referring => "referring_doctor_id",
        ReferralParty::Receiving => "receiving_doctor_id",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT status, COUNT(*) FROM referrals WHERE {column} = ?1 GROUP BY status"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| {
        Ok((col_enum::<ReferralStatus>(row, 0)?, row.get::<_, i64>(1)?))
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Which side of a referral a doctor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralParty {
    Referring,
    Receiving,
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
