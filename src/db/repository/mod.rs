//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table. Functions take a `&Connection` so callers can
//! pass either a plain connection or an open `Transaction`.

mod actor_token;
mod appointment;
mod audit;
mod clinical_note;
mod doctor;
mod notification;
mod patient;
mod pharmacy;
mod prescription;
mod referral;
mod relationship;
mod shared_note;

use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use super::DatabaseError;

pub use actor_token::*;
pub use appointment::*;
pub use audit::*;
pub use clinical_note::*;
pub use doctor::*;
pub use notification::*;
pub use patient::*;
pub use pharmacy::*;
pub use prescription::*;
pub use referral::*;
pub use relationship::*;
pub use shared_note::*;

/// Storage format for timestamps. Fixed-width so TEXT ordering is chronological.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current UTC time, truncated to the stored precision.
pub fn now_timestamp() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    parse_timestamp(&format_timestamp(&now)).unwrap_or(now)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {s:?}: {e}")))
}

// ── Column readers ──────────────────────────────────────────
//
// Conversion failures surface as `rusqlite::Error::FromSqlConversionFailure`
// so they can be raised from inside `query_row` / `query_map` closures.

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn col_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn col_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn col_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn col_opt_timestamp(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<NaiveDateTime>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_timestamp(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn col_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_uuid_str(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

pub(crate) fn opt_timestamp_str(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(format_timestamp)
}
