//! Signing and verification of session tokens.
//!
//! Tokens are HS256 JWTs keyed by the application secret.

use coursegate_core::Result;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::error::AuthenticationError;
use crate::session::TokenClaims;

/// Encodes and decodes session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Creates a codec for the given secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs the claims into a compact token.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, AuthenticationError> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(
            |e| AuthenticationError::TokenEncoding {
                reason: e.to_string(),
            },
        )?;
        Ok(token)
    }

    /// Verifies a token and returns its claims.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AuthenticationError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthenticationError::TokenExpired,
                _ => AuthenticationError::InvalidToken {
                    reason: e.to_string(),
                },
            },
        )?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}
