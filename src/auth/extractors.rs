use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use time::OffsetDateTime;
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Identity carried by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub api_key: String,
    pub expires_at: OffsetDateTime,
}

impl AuthUser {
    pub fn user_id(&self) -> Option<i64> {
        self.subject.parse().ok()
    }
}

fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".into()))?;

    let claims = keys.validate(token.trim()).map_err(|reason| {
        warn!(%reason, "bearer token rejected");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    Ok(AuthUser {
        subject: claims.sub,
        api_key: claims.api_key,
        expires_at,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already validated by `require_auth` on this route.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        let keys = JwtKeys::from_ref(state);
        authenticate(&parts.headers, &keys)
    }
}

/// Route-layer middleware: rejects the request with 401 unless it carries a
/// valid bearer token, and attaches the `AuthUser` to its extensions.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(req.headers(), &keys)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
