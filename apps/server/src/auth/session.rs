//! HS256 access tokens for logged-in users.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};

use crate::config::AuthSettings;
use crate::entity::user;
use crate::error::{AppError, AppResult};
use crate::models::SessionClaims;

/// Issuer claim stamped on every access token.
pub const SESSION_ISSUER: &str = "regtrack";

/// Why a bearer token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Access token expired")]
    Expired,
    #[error("Invalid access token: {0}")]
    Invalid(String),
}

/// Signs and verifies access tokens.
#[derive(Clone, Debug)]
pub struct SessionSigner {
    secret: SecretString,
    ttl_secs: u64,
}

impl SessionSigner {
    pub fn new(secret: SecretString, ttl_secs: u64) -> Self {
        Self { secret, ttl_secs }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.jwt_secret.clone(), settings.access_token_ttl_secs)
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Create an access token for a user.
    pub fn issue(&self, user: &user::Model) -> AppResult<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(self.ttl_secs as i64);

        let claims = SessionClaims {
            sub: user.id.to_string(),
            iss: SESSION_ISSUER.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        };

        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &SessionClaims) -> AppResult<String> {
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        encode(&Header::default(), claims, &key)
            .map_err(|e| AppError::InvalidInput(format!("Failed to create access token: {}", e)))
    }

    /// Verify an access token and return its claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
