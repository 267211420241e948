//! Login accounts backing `/accounts/token` (spec §6). An account names the
//! one tenant it logs into, or is a superuser able to address every tenant
//! (spec §9's `authenticate_superuser` path). Stored in the cross-tenant
//! `commons` namespace since an account is not itself tenant data.

use bson::doc;
use pos_storage::{StorageError, StorageGateway};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password, AuthError};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub tenant_id: String,
    pub is_superuser: bool,
    pub password_hash: String,
}

pub async fn create_account(
    storage: &StorageGateway,
    username: &str,
    tenant_id: &str,
    is_superuser: bool,
    password: &str,
) -> Result<(), ApiError> {
    let account = Account {
        username: username.to_string(),
        tenant_id: tenant_id.to_string(),
        is_superuser,
        password_hash: hash_password(password).map_err(account_auth_err)?,
    };
    let doc = bson::to_document(&account).map_err(|e| StorageError::Internal(e.to_string()))?;
    storage.create_commons("accounts", doc).await?;
    Ok(())
}

async fn load_account(storage: &StorageGateway, username: &str) -> Result<Option<Account>, ApiError> {
    let raw = storage.commons().collection::<bson::Document>("accounts").find_one(doc! { "username": username }).await.map_err(StorageError::from)?;
    match raw {
        Some(d) => Ok(Some(bson::from_document(d).map_err(|e| StorageError::Internal(e.to_string()))?)),
        None => Ok(None),
    }
}

/// Verifies `username`/`password` and returns the account on success.
/// Indistinguishable failure reasons (unknown username vs. wrong
/// password) are folded into one `Unauthorized` so a caller can't probe
/// for valid usernames.
pub async fn authenticate(storage: &StorageGateway, username: &str, password: &str) -> Result<Account, ApiError> {
    let account = load_account(storage, username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid username or password".to_string()))?;
    let ok = verify_password(password, &account.password_hash).map_err(account_auth_err)?;
    if !ok {
        return Err(ApiError::Unauthorized("invalid username or password".to_string()));
    }
    Ok(account)
}

fn account_auth_err(e: AuthError) -> ApiError {
    ApiError::Internal(e.to_string())
}
