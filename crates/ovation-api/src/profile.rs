//! Handler for `/api/profile`.

use axum::{Json, extract::State, http::{HeaderMap, StatusCode}};
use ovation_core::{
  member::{MemberProfile, ProfileDraft},
  provider::IdentityProvider as _,
  store::{MemberStore, TallyStore, VoteStore},
};

use crate::{AppState, bearer, error::ApiError};

/// `POST /api/profile` — complete registration for the authenticated
/// subject. Body: a [`ProfileDraft`], class-tagged.
pub async fn complete<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(draft): Json<ProfileDraft>,
) -> Result<(StatusCode, Json<MemberProfile>), ApiError>
where
  S: MemberStore + VoteStore + TallyStore,
{
  let token = bearer(&headers).ok_or(ApiError::Unauthorized)?;
  let provider = state.provider.with_access_token(token);

  let subject = provider
    .get_session()
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))?
    .ok_or(ApiError::Unauthorized)?;

  let profile = state
    .registry
    .complete_profile(&subject, draft)
    .await
    .map_err(ApiError::from_registry)?;

  Ok((StatusCode::CREATED, Json(profile)))
}
