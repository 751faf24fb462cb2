use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::{Credential, JwtKeys},
    password::PasswordHasher,
};
use crate::{
    error::{AppError, EMAIL_TAKEN},
    state::AppState,
    users::{
        repo::UserStore,
        repo_types::{NewUser, User},
    },
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn check_email(email: &str) -> Result<(), AppError> {
    require("email", email)?;
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    Ok(())
}

pub(crate) fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Checks a full registration payload. Expects an already normalized email.
pub(crate) fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    require("first_name", &req.first_name)?;
    require("last_name", &req.last_name)?;
    check_email(&req.email)?;
    require("password", &req.password)?;
    check_password(&req.password)?;
    require("phone_number", &req.phone_number)?;
    require("role", &req.role)?;
    Ok(())
}

/// Signup and login over an injected user store.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    keys: JwtKeys,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.hasher.clone(), state.jwt.clone())
    }
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self {
            users,
            hasher,
            keys,
        }
    }

    #[instrument(skip_all)]
    pub async fn signup(&self, mut req: RegisterRequest) -> Result<(User, Credential), AppError> {
        req.email = normalize_email(&req.email);
        validate_registration(&req)?;

        match self.users.find_by_email(&req.email).await {
            Ok(Some(_)) => {
                warn!(email = %req.email, "email already registered");
                return Err(AppError::Conflict(EMAIL_TAKEN.into()));
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "find_by_email failed");
                return Err(AppError::Store(e));
            }
        }

        let password_hash = self.hasher.hash(&req.password).map_err(AppError::internal)?;

        // A concurrent signup can win the race after our lookup; the unique
        // constraint turns that into StoreError::Duplicate -> Conflict.
        let user = self
            .users
            .insert(NewUser {
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                email: req.email,
                password_hash,
                phone_number: req.phone_number.trim().to_string(),
                role: req.role.trim().to_string(),
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "create user failed");
                AppError::from(e)
            })?;

        let credential = self.keys.issue(user.id).map_err(AppError::internal)?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok((user, credential))
    }

    #[instrument(skip_all)]
    pub async fn login(&self, mut req: LoginRequest) -> Result<(User, Credential), AppError> {
        req.email = normalize_email(&req.email);
        check_email(&req.email)?;
        require("password", &req.password)?;

        // Unknown email, lookup failure and wrong password all answer the
        // same way, and all pay for one Argon2 verification, so neither the
        // response nor its timing reveals whether an account exists.
        let user = match self.users.find_by_email(&req.email).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!(email = %req.email, "login unknown email");
                self.hasher.verify_dummy(&req.password);
                return Err(AppError::invalid_credentials());
            }
            Err(e) => {
                error!(error = %e, "find_by_email failed during login");
                self.hasher.verify_dummy(&req.password);
                return Err(AppError::invalid_credentials());
            }
        };

        let ok = self
            .hasher
            .verify(&user.password_hash, &req.password)
            .map_err(AppError::internal)?;
        if !ok {
            warn!(email = %req.email, user_id = user.id, "login invalid password");
            return Err(AppError::invalid_credentials());
        }

        let credential = self.keys.issue(user.id).map_err(AppError::internal)?;

        info!(user_id = user.id, email = %user.email, "user logged in");
        Ok((user, credential))
    }
}
