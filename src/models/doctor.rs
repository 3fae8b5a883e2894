use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Doctor {
    /// Specialty comparison used for open-referral routing.
    pub fn practices(&self, specialty: &str) -> bool {
        self.specialty.trim().eq_ignore_ascii_case(specialty.trim())
    }
}
