use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PrescriptionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub pharmacy_id: Option<Uuid>,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub quantity: u32,
    pub refills: u32,
    pub instructions: Option<String>,
    pub status: PrescriptionStatus,
    pub created_at: NaiveDateTime,
    pub dispensed_at: Option<NaiveDateTime>,
}
