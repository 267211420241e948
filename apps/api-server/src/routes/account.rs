//! OAuth2 password-flow token issuance (spec §6: `POST /accounts/token`).

use std::sync::Arc;

use axum::extract::State;
use axum::Form;
use serde::{Deserialize, Serialize};

use crate::accounts;
use crate::error::ApiError;
use crate::state::AppState;

/// `application/x-www-form-urlencoded` body, matching the OAuth2 password
/// grant's conventional shape (`grant_type` is accepted but ignored —
/// this process only ever issues password-grant tokens).
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub grant_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub async fn issue_token(State(state): State<Arc<AppState>>, Form(body): Form<TokenRequest>) -> Result<axum::Json<TokenResponse>, ApiError> {
    let account = accounts::authenticate(state.root_storage(), &body.username, &body.password).await?;
    let token = state
        .jwt
        .issue(&account.username, &account.tenant_id, account.is_superuser)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(axum::Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_in: state.jwt.lifetime_seconds(),
    }))
}
