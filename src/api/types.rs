//! Shared types for the API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::Actor;
use crate::core_state::CoreState;
use crate::models::enums::ActorRole;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Parse a path id, mapping malformed input to 400.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid ID format".into()))
}

/// The caller's id when they are a doctor.
pub fn doctor_id(actor: &Actor) -> Result<Uuid, ApiError> {
    require_role(actor, ActorRole::Doctor)
}

pub fn patient_id(actor: &Actor) -> Result<Uuid, ApiError> {
    require_role(actor, ActorRole::Patient)
}

pub fn pharmacy_id(actor: &Actor) -> Result<Uuid, ApiError> {
    require_role(actor, ActorRole::Pharmacy)
}

fn require_role(actor: &Actor, role: ActorRole) -> Result<Uuid, ApiError> {
    if actor.role != role {
        return Err(ApiError::Forbidden(format!(
            "This action requires a {role} account"
        )));
    }
    Ok(actor.id)
}
