use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use super::{
    dto::UpdateUserRequest,
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    auth::{
        dto::RegisterRequest,
        services::{check_email, check_password, normalize_email, require, validate_registration},
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    let user = state.users.find_by_id(id).await?.ok_or_else(not_found)?;
    Ok(Json(user))
}

/// Same payload and rules as `/register`, without issuing a token.
#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(mut payload) = payload?;
    payload.email = normalize_email(&payload.email);
    validate_registration(&payload)?;

    let password_hash = state
        .hasher
        .hash(&payload.password)
        .map_err(AppError::internal)?;

    let user = state
        .users
        .insert(NewUser {
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            email: payload.email,
            password_hash,
            phone_number: payload.phone_number.trim().to_string(),
            role: payload.role.trim().to_string(),
        })
        .await?;

    info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

fn present(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    match value {
        Some(v) => {
            require(field, &v)?;
            Ok(Some(v.trim().to_string()))
        }
        None => Ok(None),
    }
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;

    let email = match payload.email {
        Some(e) => {
            let e = normalize_email(&e);
            check_email(&e)?;
            Some(e)
        }
        None => None,
    };

    if let Some(p) = &payload.password {
        check_password(p)?;
    }
    let first_name = present("first_name", payload.first_name)?;
    let last_name = present("last_name", payload.last_name)?;
    let phone_number = present("phone_number", payload.phone_number)?;
    let role = present("role", payload.role)?;

    // Hash only once the payload is known good and the row exists.
    let password_hash = match payload.password {
        Some(p) => {
            if state.users.find_by_id(id).await?.is_none() {
                warn!(user_id = id, "update of unknown user");
                return Err(not_found());
            }
            Some(state.hasher.hash(&p).map_err(AppError::internal)?)
        }
        None => None,
    };

    let changes = UserChanges {
        first_name,
        last_name,
        email,
        password_hash,
        phone_number,
        role,
    };

    let user = state.users.update(id, changes).await?.ok_or_else(|| {
        warn!(user_id = id, "update of unknown user");
        not_found()
    })?;

    info!(user_id = user.id, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    if !state.users.delete(id).await? {
        return Err(not_found());
    }
    info!(user_id = id, "user deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
