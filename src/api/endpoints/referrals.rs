//! Referral endpoints.
//!
//! Writes go through the transition handlers; reads return enriched
//! `ReferralDetails`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{doctor_id, parse_id, ApiContext};
use crate::auth::Actor;
use crate::directory;
use crate::models::enums::ActorRole;
use crate::models::filters::ReferralFilter;
use crate::models::Referral;
use crate::referrals::{self, NewReferral, ReferralDetails, ReferralStats};

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionBody {
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct OpenQuery {
    pub specialty: Option<String>,
}

/// `POST /api/referrals`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<NewReferral>,
) -> Result<(StatusCode, Json<Referral>), ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    let referral = referrals::create(&conn, &doctor, &body)?;
    Ok((StatusCode::CREATED, Json(referral)))
}

/// `GET /api/referrals/sent`
pub async fn sent(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ReferralDetails>>, ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::list_sent(&conn, &doctor)?))
}

/// `GET /api/referrals/received`
pub async fn received(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ReferralDetails>>, ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::list_received(&conn, &doctor)?))
}

/// `GET /api/referrals/open[?specialty=]`: defaults to the caller's specialty.
/// A doctor may only browse open referrals of a specialty they practise.
pub async fn open(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<OpenQuery>,
) -> Result<Json<Vec<ReferralDetails>>, ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    let doctor = directory::require_doctor(&conn, &doctor)?;
    let specialty = match query.specialty.filter(|s| !s.trim().is_empty()) {
        Some(s) if !doctor.practices(&s) => {
            return Err(ApiError::Forbidden(
                "You can only view open referrals for your own specialty".into(),
            ));
        }
        Some(s) => s,
        None => doctor.specialty,
    };
    Ok(Json(referrals::list_open_for_specialty(&conn, &specialty)?))
}

/// `GET /api/referrals/search[?..&limit=&offset=]`: only referrals the
/// caller can view are searched.
pub async fn search(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<ReferralFilter>,
) -> Result<Json<Vec<ReferralDetails>>, ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::search(&conn, &doctor, &filter)?))
}

/// `GET /api/referrals/stats`
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ReferralStats>, ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::referral_stats(&conn, &doctor)?))
}

/// `GET /api/referrals/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ReferralDetails>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let details = referrals::get_referral_details(&conn, &id)?;
    let allowed = match actor.role {
        ActorRole::Patient => details.referral.patient_id == actor.id,
        ActorRole::Doctor => referrals::doctor_can_view(&conn, &actor.id, &details.referral)?,
        ActorRole::Pharmacy => false,
    };
    if !allowed {
        return Err(ApiError::Forbidden("You do not have access to this referral".into()));
    }
    Ok(Json(details))
}

/// `POST /api/referrals/:id/accept`
pub async fn accept(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Referral>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::accept(&conn, &id, &doctor)?))
}

/// `POST /api/referrals/:id/decline`
pub async fn decline(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<Referral>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::decline(&conn, &id, &doctor, body.reason.as_deref())?))
}

/// `POST /api/referrals/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<Json<CompletionBody>>,
) -> Result<Json<Referral>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::complete(&conn, &id, &doctor, body.notes.as_deref())?))
}

/// `POST /api/referrals/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<Referral>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let conn = ctx.core.open_db()?;
    Ok(Json(referrals::cancel(&conn, &id, &doctor, body.reason.as_deref())?))
}
