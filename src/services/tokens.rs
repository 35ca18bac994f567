use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::ServiceError;
use crate::models::tokens::{Claims, SessionTokens};

pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Stateless HS256 signer. Access and refresh tokens use distinct secrets
/// so a leaked access secret cannot forge refresh tokens. There is no
/// revocation list; tokens stay valid until expiry.
#[derive(Clone)]
pub struct TokenSigner {
    access_secret: String,
    refresh_secret: String,
}

impl TokenSigner {
    pub fn new(access_secret: String, refresh_secret: String) -> Self {
        Self {
            access_secret,
            refresh_secret,
        }
    }

    pub fn issue_session(&self, user_id: &str) -> Result<SessionTokens, ServiceError> {
        let access_token = self.sign(user_id, &self.access_secret, ACCESS_TOKEN_TTL_SECS)?;
        let refresh_token = self.sign(user_id, &self.refresh_secret, REFRESH_TOKEN_TTL_SECS)?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Mints a new access token for the subject of a valid refresh token.
    /// Expired, tampered and malformed tokens all collapse into
    /// `InvalidRefreshToken`.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, ServiceError> {
        let claims = self
            .verify(refresh_token, &self.refresh_secret)
            .map_err(|_| ServiceError::InvalidRefreshToken)?;

        self.sign(&claims.sub, &self.access_secret, ACCESS_TOKEN_TTL_SECS)
    }

    pub fn authenticate(&self, access_token: &str) -> Result<String, ServiceError> {
        let claims = self
            .verify(access_token, &self.access_secret)
            .map_err(|_| ServiceError::Unauthorized)?;

        Ok(claims.sub)
    }

    fn sign(&self, subject: &str, secret: &str, ttl_secs: i64) -> Result<String, ServiceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    fn verify(&self, token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }
}
