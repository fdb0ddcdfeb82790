//! Authentication: bootstrap/parser secrets, passwords and session tokens.

mod extractor;
pub mod password;
pub mod session;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

pub use extractor::{AuthError, AuthUser, ParserAuth};
pub use session::SessionSigner;

/// Optional shared secret compared in constant time.
/// Uses `SecretString` to prevent accidental logging and zeroize on drop.
#[derive(Clone)]
pub struct SharedSecret(Option<SecretString>);

impl SharedSecret {
    pub fn new(value: Option<String>) -> Self {
        Self(value.map(SecretString::from))
    }

    /// Securely compare the provided value with the stored secret.
    ///
    /// `ConstantTimeEq` returns false for unequal lengths without an early exit.
    /// An unset secret never matches.
    pub fn verify(&self, provided: &str) -> bool {
        match &self.0 {
            Some(secret) => secret
                .expose_secret()
                .as_bytes()
                .ct_eq(provided.as_bytes())
                .into(),
            None => false,
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "SharedSecret([REDACTED])"),
            None => write!(f, "SharedSecret(None)"),
        }
    }
}

/// Bootstrap admin key accepted via `X-Admin-Key`.
#[derive(Clone, Debug)]
pub struct AdminKey(pub SharedSecret);

impl AdminKey {
    pub fn new(key: Option<String>) -> Self {
        Self(SharedSecret::new(key))
    }
}

/// Token the external parser presents via `X-Parser-Token`.
#[derive(Clone, Debug)]
pub struct ParserToken(pub SharedSecret);

impl ParserToken {
    pub fn new(token: Option<String>) -> Self {
        Self(SharedSecret::new(token))
    }
}
