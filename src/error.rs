//! Workflow errors shared by the referral, sharing, appointment and
//! prescription modules.
//!
//! Messages are written for the person who triggered the request; the API
//! layer forwards them verbatim for every variant except `Database`.

use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    /// A status-gated transition was attempted from the wrong status.
    #[error("{0}")]
    InvalidStatus(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl CareError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for CareError {
    fn from(err: rusqlite::Error) -> Self {
        CareError::Database(DatabaseError::Sqlite(err))
    }
}

/// Trims a required text field, rejecting blank input.
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, CareError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CareError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field, mapping blank input to `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
