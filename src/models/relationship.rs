use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RelationshipSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorPatientRelationship {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub source: RelationshipSource,
    pub referral_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}
