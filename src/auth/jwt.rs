use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::{Claims, StreamIdentity};

/// Verifies HS256 bearer tokens and resolves who the stream is for
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        match config.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            // Tokens minted for other audiences are still accepted when none is configured
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Check the token and return the tenant and user it grants a stream for
    pub fn authenticate(&self, token: &str) -> Result<StreamIdentity, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?
            .claims;

        claims.into_identity()
    }
}
