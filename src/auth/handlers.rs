use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, RegisterRequest},
        extractors::AuthUser,
        services::AccountService,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip_all)]
pub async fn register(
    State(accounts): State<AccountService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let (user, token) = accounts.signup(payload).await?;
    Ok(Json(AuthResponse::new(user, token)))
}

#[instrument(skip_all)]
pub async fn login(
    State(accounts): State<AccountService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let (user, token) = accounts.login(payload).await?;
    Ok(Json(AuthResponse::new(user, token)))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let Some(user_id) = auth.user_id() else {
        warn!(subject = %auth.subject, "token subject is not a user id");
        return Err(AppError::Unauthorized("Invalid or expired token".into()));
    };

    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id, "token subject no longer exists");
        AppError::Unauthorized("User not found".into())
    })?;

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        api_key: auth.api_key,
        expires_at: auth.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_exposes_only_public_fields() {
        let user = crate::users::repo_types::User {
            id: 3,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            phone_number: "555-0100".into(),
            role: "engineer".into(),
            created_at: time::OffsetDateTime::now_utc(),
            updated_at: time::OffsetDateTime::now_utc(),
        };
        let token = crate::auth::jwt::Credential {
            api_key: "key".into(),
            jwt_token: "jwt".into(),
        };

        let json = serde_json::to_value(AuthResponse::new(user, token)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "token": { "api_key": "key", "jwt_token": "jwt" },
                "user": { "id": 3, "email": "ada@example.com" }
            })
        );
    }
}
