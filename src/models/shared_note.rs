use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ShareType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedClinicalNote {
    pub id: Uuid,
    pub note_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub shared_by: Uuid,
    pub share_type: ShareType,
    pub referral_id: Option<Uuid>,
    pub message: Option<String>,
    pub is_read: bool,
    pub shared_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}
