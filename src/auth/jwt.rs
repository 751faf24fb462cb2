use std::str::FromStr;

use axum::extract::FromRef;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState};

/// Tokens signed with anything outside this family are refused.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// What a successful signup or login hands back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Credential {
    pub api_key: String,
    pub jwt_token: String,
}

#[derive(Debug, thiserror::Error)]
#[error("jwt signing failed: {0}")]
pub struct SigningError(String);

/// Why a bearer token was refused. Callers answer every variant with the
/// same 401; the variant only goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("unexpected signing algorithm")]
    WrongAlgorithm,
    #[error("token expired")]
    Expired,
}

/// Process-wide HMAC keys, built once from config and read-only afterwards.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    has_secret: bool,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::seconds(cfg.ttl_days.saturating_mul(86_400)),
            has_secret: !cfg.secret.is_empty(),
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<Credential, SigningError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<Credential, SigningError> {
        if !self.has_secret {
            return Err(SigningError("signing secret is empty".into()));
        }
        if !self.ttl.is_positive() {
            return Err(SigningError("token lifetime must be positive".into()));
        }
        let exp = now
            .checked_add(self.ttl)
            .ok_or_else(|| SigningError("token expiry out of range".into()))?;
        let api_key = Uuid::new_v4().to_string();
        let claims = Claims {
            sub: user_id.to_string(),
            api_key: api_key.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let jwt_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SigningError(e.to_string()))?;
        debug!(user_id, "jwt signed");
        Ok(Credential { api_key, jwt_token })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenRejection> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Expiry is checked against `now` here rather than inside jsonwebtoken,
    /// so there is no leeway: a token is valid strictly before `exp`.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenRejection> {
        check_header_alg(token)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                ErrorKind::InvalidAlgorithm => TokenRejection::WrongAlgorithm,
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                _ => TokenRejection::Malformed,
            }
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenRejection::Expired);
        }
        debug!(sub = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Reads `alg` from the raw header segment. jsonwebtoken cannot even parse a
/// header naming an algorithm it does not know (`none`), which would
/// otherwise surface as `Malformed`.
fn check_header_alg(token: &str) -> Result<(), TokenRejection> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| TokenRejection::Malformed)?;
    let header: RawHeader =
        serde_json::from_slice(&bytes).map_err(|_| TokenRejection::Malformed)?;
    match Algorithm::from_str(&header.alg) {
        Ok(alg) if ACCEPTED_ALGORITHMS.contains(&alg) => Ok(()),
        _ => Err(TokenRejection::WrongAlgorithm),
    }
}
