// JWT issuing and verification. Tokens carry the user id and role; the role
// decides which notification scopes a viewer sees and who counts as staff.

use crate::core::notifications::Viewer;
use crate::web::error::ApiError;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub exp: i64,
}

impl Claims {
    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.sub, self.role.clone())
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    pub fn issue(&self, user_id: i64, role: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.ttl_hours);
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            exp: exp.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| ApiError::unauthorized(format!("invalid token: {err}")))
    }

    /// Bearer token from the Authorization header, if one was sent.
    pub fn optional_viewer(&self, headers: &HeaderMap) -> Result<Option<Viewer>, ApiError> {
        let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
            return Ok(None);
        };
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("invalid authorization header format"))?;

        Ok(Some(self.verify(token)?.viewer()))
    }

    pub fn viewer(&self, headers: &HeaderMap) -> Result<Viewer, ApiError> {
        self.optional_viewer(headers)?
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))
    }
}
