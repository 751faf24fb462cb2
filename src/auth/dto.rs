use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::jwt::Credential;
use crate::users::repo_types::User;

/// Request body for user registration. Missing fields deserialize as empty
/// strings so validation can name them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub role: String,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: Credential,
    pub user: PublicUser,
}

impl AuthResponse {
    pub fn new(user: User, token: Credential) -> Self {
        Self {
            token,
            user: PublicUser {
                id: user.id,
                email: user.email,
            },
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub api_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
