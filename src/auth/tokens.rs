//! Signed access/refresh token pairs. Both are stateless HS256 JWTs; the
//! `token_type` claim keeps one from being used as the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub username: String,
    pub is_staff: bool,
    pub token_type: TokenType,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Subject)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token has the wrong type")]
    WrongType,

    #[error("token subject is not a user id")]
    Subject,
}

fn issue(
    user: &User,
    token_type: TokenType,
    lifetime: Duration,
    config: &Config,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        username: user.username.clone(),
        is_staff: user.is_staff,
        token_type,
        jti: Uuid::new_v4().simple().to_string(),
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}

pub fn issue_access(user: &User, config: &Config) -> Result<String, TokenError> {
    issue(
        user,
        TokenType::Access,
        Duration::minutes(config.access_token_minutes),
        config,
    )
}

pub fn issue_pair(user: &User, config: &Config) -> Result<TokenPair, TokenError> {
    Ok(TokenPair {
        refresh: issue(
            user,
            TokenType::Refresh,
            Duration::days(config.refresh_token_days),
            config,
        )?,
        access: issue_access(user, config)?,
    })
}

/// Verify signature and expiry, then check the token is of the expected type.
pub fn verify(token: &str, expected: TokenType, config: &Config) -> Result<Claims, TokenError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    if data.claims.token_type != expected {
        return Err(TokenError::WrongType);
    }
    Ok(data.claims)
}
