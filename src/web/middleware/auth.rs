//! JWT authentication middleware.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::web::error::ApiError;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Telegram user ID.
    pub telegram_id: i64,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID (unique identifier).
    pub jti: String,
}

impl JwtClaims {
    /// Claims for a user, valid for `expiry_secs` from now.
    pub fn new(user_id: i64, telegram_id: i64, expiry_secs: u64) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self {
            sub: user_id,
            telegram_id,
            iat: now,
            exp: now + expiry_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Keys and validation settings for access tokens.
#[derive(Clone)]
pub struct JwtState {
    /// Encoding key for issuing tokens.
    pub encoding_key: EncodingKey,
    /// Decoding key for JWT verification.
    pub decoding_key: DecodingKey,
    /// Validation settings.
    pub validation: Validation,
}

impl JwtState {
    /// Create a new JWT state from a secret key.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign claims into an HS256 token.
    pub fn issue(&self, claims: &JwtClaims) -> Result<String, ApiError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign access token: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// Decode and validate a token.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, ApiError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })
    }
}

/// Bearer token from the Authorization header, or the `token` query
/// parameter (used by download links).
fn extract_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());
    if from_header.is_some() {
        return from_header;
    }

    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key == "token" && !value.is_empty() {
                urlencoding::decode(value).ok().map(|s| s.into_owned())
            } else {
                None
            }
        })
    })
}

/// Extractor for authenticated users.
///
/// The handler receives the JWT claims if the token is valid.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token =
            extract_token(parts).ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

        // Set by the jwt_auth middleware
        let jwt_state = parts
            .extensions
            .get::<Arc<JwtState>>()
            .ok_or_else(|| ApiError::internal("JWT state not configured"))?;

        Ok(AuthUser(jwt_state.verify(&token)?))
    }
}

/// Optional authentication extractor.
///
/// A missing or invalid token yields `None` instead of a rejection.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<JwtClaims>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_token(parts) else {
            return Ok(OptionalAuthUser(None));
        };
        let Some(jwt_state) = parts.extensions.get::<Arc<JwtState>>() else {
            return Ok(OptionalAuthUser(None));
        };

        Ok(OptionalAuthUser(jwt_state.verify(&token).ok()))
    }
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_for(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_issue_and_verify_token() {
        let state = JwtState::new("test-secret");
        let claims = JwtClaims::new(7, 4242, 3600);

        let token = state.issue(&claims).unwrap();
        let decoded = state.verify(&token).unwrap();

        assert_eq!(decoded.sub, 7);
        assert_eq!(decoded.telegram_id, 4242);
        assert_eq!(decoded.exp - decoded.iat, 3600);
    }

    #[test]
    fn test_expired_token() {
        let state = JwtState::new("test-secret");
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: 1,
            telegram_id: 1,
            iat: now - 7200,
            exp: now - 3600,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = state.issue(&claims).unwrap();
        assert!(state.verify(&token).is_err());
    }

    #[test]
    fn test_invalid_secret() {
        let token = JwtState::new("secret1")
            .issue(&JwtClaims::new(1, 1, 3600))
            .unwrap();

        assert!(JwtState::new("secret2").verify(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        let parts = parts_for("/api/v1/files", Some("Bearer abc.def"));
        assert_eq!(extract_token(&parts).as_deref(), Some("abc.def"));

        let parts = parts_for("/api/v1/files", Some("Basic xyz"));
        assert_eq!(extract_token(&parts), None);
    }

    #[test]
    fn test_extract_token_from_query() {
        let parts = parts_for("/api/v1/files/1/download?x=1&token=a%2Eb", None);
        assert_eq!(extract_token(&parts).as_deref(), Some("a.b"));

        let parts = parts_for("/api/v1/files/1/download?token=", None);
        assert_eq!(extract_token(&parts), None);
    }

    #[test]
    fn test_header_wins_over_query() {
        let parts = parts_for("/x?token=query", Some("Bearer header"));
        assert_eq!(extract_token(&parts).as_deref(), Some("header"));
    }
}
