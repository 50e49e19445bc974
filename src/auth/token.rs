// Bearer tokens.
//
// JWT/HS256 via the `jsonwebtoken` crate. `Validation::algorithms` pins the
// accepted algorithm family so a token whose header claims `RS256` or
// `none` is rejected at decode time, before any claim is inspected — this
// is what defends against algorithm-confusion attacks.

use super::role::Role;
use crate::error::{ErrorKind, ServiceError};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}
impl TokenService {
    pub fn new(
        secret: &str,
        ttl: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<String, ServiceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_owned(),
            role,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| ServiceError::new(ErrorKind::Internal, error))
    }

    /// Validation rejects: empty/whitespace-only, structurally invalid,
    /// expired, unknown role, missing required claims, wrong algorithm.
    pub fn validate(
        &self,
        token: &str,
    ) -> Result<Claims, ServiceError> {
        if token.trim().is_empty() {
            return Err(ServiceError::from_kind(ErrorKind::AuthInvalid));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| ServiceError::from_kind(ErrorKind::AuthInvalid))?;
        Ok(data.claims)
    }
}
