// src/services/auth.rs
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::OwnerId;

/// Bearer token claims. `sub` carries the owner id.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Signs an HS256 token for `owner`, valid for `ttl`.
pub fn issue_token(owner: OwnerId, secret: &str, ttl: Duration) -> Result<String> {
    let iat = Utc::now();
    let claims = Claims {
        sub: owner.to_string(),
        exp: (iat + ttl).timestamp(),
        iat: iat.timestamp(),
    };
    let jwt = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(jwt)
}

/// Verifies the signature and expiry and returns the owner id.
pub fn decode_owner(token: &str, secret: &str) -> Result<OwnerId> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    data.claims
        .sub
        .parse::<OwnerId>()
        .map_err(|_| anyhow!("token subject is not an owner id"))
}

/// Extracts the token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
