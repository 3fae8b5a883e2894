use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ReferralStatus, ReferralUrgency};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub referring_doctor_id: Uuid,
    /// `None` for an open referral addressed to a specialty.
    pub receiving_doctor_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub clinical_note_id: Option<Uuid>,
    pub specialty: String,
    pub urgency: ReferralUrgency,
    pub reason: String,
    pub status: ReferralStatus,
    pub decline_reason: Option<String>,
    pub completion_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub accepted_at: Option<NaiveDateTime>,
    pub declined_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
}

impl Referral {
    pub fn is_open(&self) -> bool {
        self.receiving_doctor_id.is_none()
    }
}
