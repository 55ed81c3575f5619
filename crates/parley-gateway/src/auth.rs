use jsonwebtoken::{DecodingKey, Validation, decode};
use thiserror::Error;

use parley_types::auth::Claims;
use parley_types::models::Identity;

/// Why a connection attempt was rejected before the upgrade.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingToken,
    #[error("invalid bearer credential")]
    InvalidToken,
}

/// Validate a bearer credential and resolve the identity it carries.
/// Rejection is terminal for this connection attempt — the server performs
/// no retries on the client's behalf; the client reconnects with fresh
/// credentials.
pub fn authenticate(secret: &str, token: Option<&str>) -> Result<Identity, AuthError> {
    let token = token.ok_or(AuthError::MissingToken)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AuthError::InvalidToken)?;

    Ok(data.claims.identity())
}
