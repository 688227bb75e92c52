//! Handler for `/api/identity`.

use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use ovation_core::{
  identity::ResolvedIdentity,
  store::{MemberStore, TallyStore, VoteStore},
};
use ovation_engine::SessionResolver;

use crate::{AppState, bearer, error::ApiError};

/// `GET /api/identity` — resolve the caller's identity from its bearer
/// token. No token resolves to `unauthenticated` without touching the
/// provider.
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<Json<ResolvedIdentity>, ApiError>
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

  Ok(Json(identity))
}
