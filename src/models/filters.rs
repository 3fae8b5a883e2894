use serde::Deserialize;
use uuid::Uuid;

use super::enums::{PrescriptionStatus, ReferralStatus, ReferralUrgency};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReferralFilter {
    pub status: Option<ReferralStatus>,
    pub urgency: Option<ReferralUrgency>,
    pub specialty: Option<String>,
    pub referring_doctor_id: Option<Uuid>,
    pub receiving_doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    /// Free text matched against reason and specialty.
    pub query: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PrescriptionFilter {
    pub status: Option<PrescriptionStatus>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub pharmacy_id: Option<Uuid>,
}
