use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{ReferralStatus, ReferralUrgency};
use crate::models::{ClinicalNote, Doctor, Patient, Referral};

/// Input for [`super::create`]. The referring doctor is the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReferral {
    pub patient_id: Uuid,
    /// `None` posts an open referral to every doctor of the specialty.
    #[serde(default)]
    pub receiving_doctor_id: Option<Uuid>,
    #[serde(default)]
    pub clinical_note_id: Option<Uuid>,
    pub specialty: String,
    #[serde(default = "default_urgency")]
    pub urgency: ReferralUrgency,
    pub reason: String,
}

fn default_urgency() -> ReferralUrgency {
    ReferralUrgency::Routine
}

/// A referral joined with the records it points at. Links that no longer
/// resolve are `None` rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralDetails {
    #[serde(flatten)]
    pub referral: Referral,
    pub patient: Option<Patient>,
    pub referring_doctor: Option<Doctor>,
    pub receiving_doctor: Option<Doctor>,
    pub clinical_note: Option<ClinicalNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub accepted: i64,
    pub declined: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total: i64,
}

impl StatusCounts {
    pub(crate) fn add(&mut self, status: ReferralStatus, count: i64) {
        match status {
            ReferralStatus::Pending => self.pending += count,
            ReferralStatus::Accepted => self.accepted += count,
            ReferralStatus::Declined => self.declined += count,
            ReferralStatus::Completed => self.completed += count,
            ReferralStatus::Cancelled => self.cancelled += count,
        }
        self.total += count;
    }
}

/// Per-status counts for one doctor, split by side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReferralStats {
    pub sent: StatusCounts,
    pub received: StatusCounts,
}
