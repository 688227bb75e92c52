//! Handlers for the voting flow: OTP round-trip, advisory pre-check, and
//! submission.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, StatusCode},
};
use ovation_core::{
  identity::ResolvedIdentity,
  member::PhoneNumber,
  provider::OtpCheck,
  store::{MemberStore, TallyStore, VoteStore},
  vote::{ArtistId, Vote},
};
use ovation_engine::{
  LedgerError, OtpError, SessionResolver, SubmitOutcome, VoteRequest,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, bearer, error::ApiError};

// ─── OTP round-trip ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OtpRequestBody {
  pub phone: PhoneNumber,
}

/// `POST /api/otp` — issue a code to the given phone; returns the flow id
/// the verify and submit calls refer back to.
pub async fn otp_request<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<OtpRequestBody>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: MemberStore + VoteStore + TallyStore,
{
  let flow_id = state
    .otp
    .begin(Arc::clone(&state.provider), body.phone)
    .await
    .map_err(otp_error)?;

  Ok(Json(json!({ "flow_id": flow_id })))
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyBody {
  pub flow_id: Uuid,
  pub code:    String,
}

/// `POST /api/otp/verify` — check the code for an outstanding flow.
pub async fn otp_verify<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<OtpVerifyBody>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: MemberStore + VoteStore + TallyStore,
{
  let check = state
    .otp
    .verify(body.flow_id, &body.code)
    .await
    .ok_or(ApiError::UnknownFlow)?
    .map_err(otp_error)?;

  let status = match check {
    OtpCheck::Verified => "verified",
    OtpCheck::InvalidCode => "invalid_code",
    OtpCheck::Expired => "expired",
  };
  Ok(Json(json!({ "status": status })))
}

fn otp_error(error: OtpError) -> ApiError {
  match error {
    OtpError::NoCodeIssued | OtpError::CodeOutstanding => {
      ApiError::BadRequest(error.to_string())
    }
    OtpError::Provider(e) => ApiError::Internal(e),
  }
}

// ─── Advisory pre-check ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PrecheckParams {
  pub phone:     PhoneNumber,
  pub artist_id: ArtistId,
}

/// `GET /api/votes/precheck?phone=…&artist_id=…` — UI enablement only; the
/// submit path re-checks authoritatively.
pub async fn precheck<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<PrecheckParams>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: MemberStore + VoteStore + TallyStore,
{
  let voted = state
    .ledger
    .has_voted_today(&params.phone, &params.artist_id)
    .await
    .map_err(|e| match e {
      LedgerError::Store(e) => ApiError::Internal(e),
      LedgerError::Validation(v) => ApiError::Validation(v.to_string()),
    })?;

  Ok(Json(json!({ "voted": voted })))
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub artist_id:   ArtistId,
  pub phone:       PhoneNumber,
  pub voter_name:  String,
  pub message:     Option<String>,
  /// Flow id whose confirmation backs an anonymous submission.
  pub otp_flow_id: Option<Uuid>,
}

/// `POST /api/votes` — submit one vote. Authenticated members are resolved
/// from the bearer token and skip the OTP flow when their registered phone
/// matches.
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<Vote>), ApiError>
where
  S: MemberStore + VoteStore + TallyStore,
{
  let identity = match bearer(&headers) {
    None => ResolvedIdentity::Unauthenticated,
    Some(token) => {
      let provider = Arc::new(state.provider.with_access_token(token));
      let resolver =
        SessionResolver::new(provider, state.registry.clone(), state.engine.clone());
      resolver
        .resolve_cold_start()
        .await
        .map_err(ApiError::from_session)?
    }
  };

  let otp_confirmation = match body.otp_flow_id {
    Some(flow_id) => state.otp.take_confirmation(flow_id).await,
    None => None,
  };

  let request = VoteRequest {
    artist_id:  body.artist_id,
    phone:      body.phone,
    voter_name: body.voter_name,
    message:    body.message,
    otp_confirmation,
  };

  match state.ledger.submit(&identity, request).await {
    Ok(SubmitOutcome::Accepted(vote)) => Ok((StatusCode::CREATED, Json(vote))),
    Ok(SubmitOutcome::AlreadyVotedToday) => Err(ApiError::AlreadyVoted),
    Err(LedgerError::Validation(v)) => Err(ApiError::Validation(v.to_string())),
    Err(LedgerError::Store(e)) => Err(ApiError::Internal(e)),
  }
}
