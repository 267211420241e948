//! Request-scoped authentication (spec §6): a bearer JWT for the
//! back-office/account surface, or a per-terminal API key for the POS
//! register surface. Both are axum extractors so a handler simply lists
//! the one it needs as an argument; nothing runs for routes that ask for
//! neither.
//!
//! Terminal API-key auth has a chicken-and-egg problem the JWT path
//! doesn't: verifying a key means loading the terminal record, but
//! `StorageGateway` is tenant-scoped and there is no tenant-less
//! "look this terminal up anywhere" query. The terminal surface therefore
//! requires the tenant id up front, via the `X-Tenant-Id` header, the same
//! way the OAuth2 flow bakes it into the JWT's `tenant_id` claim.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::sync::Arc;

use crate::auth::{extract_bearer_token, Claims};
use crate::error::ApiError;
use crate::state::AppState;

/// Extracts and validates the `Authorization: Bearer <token>` header,
/// yielding the decoded claims. Used by every account/back-office route.
pub struct BearerClaims(pub Claims);

impl<S> FromRequestParts<S> for BearerClaims
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("Authorization header is not a Bearer token".to_string()))?;
        let claims = state.jwt.validate(token).map_err(|e| ApiError::Unauthorized(e.to_string()))?;
        Ok(BearerClaims(claims))
    }
}

/// Extracts the `X-Tenant-Id` header every terminal-surface request must
/// carry alongside its API key.
pub struct TenantHeader(pub String);

impl<S: Send + Sync> FromRequestParts<S> for TenantHeader {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("missing X-Tenant-Id header".to_string()))?;
        Ok(TenantHeader(tenant_id.to_string()))
    }
}

/// Extracts the `X-API-KEY` header. Validating it against a specific
/// terminal record (which also needs the terminal id, carried in the
/// route's path) is left to [`authenticate_terminal`], since a bare
/// extractor can't see the path params of every route that needs this.
pub struct ApiKeyHeader(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ApiKeyHeader {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing X-API-KEY header".to_string()))?;
        Ok(ApiKeyHeader(key.to_string()))
    }
}

/// Loads `store_code`/`terminal_no`'s terminal record in `tenant_id` and
/// checks its `api_key` matches. Called from route handlers rather than
/// wired as generic middleware, since the terminal identity lives in each
/// route's own path parameters (`terminal_no` vs `terminal_id` vs
/// `store_code`+`terminal_no`) with no single shape `from_fn_with_state`
/// could extract once for every route.
pub async fn authenticate_terminal(
    state: &AppState,
    tenant_id: &str,
    store_code: &str,
    terminal_no: i32,
    api_key: &str,
) -> Result<pos_terminal::Terminal, ApiError> {
    let ctx = state.tenant(tenant_id).await?;
    let terminal = pos_terminal::load_terminal(&ctx.storage, store_code, terminal_no).await?;
    if terminal.api_key != api_key {
        return Err(ApiError::Unauthorized("invalid terminal API key".to_string()));
    }
    Ok(terminal)
}

