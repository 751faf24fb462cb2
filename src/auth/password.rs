use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashingError(String);

/// Argon2id hashing with a configurable work cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a throwaway password under the same cost, so a login for an
    /// unknown account costs as much as one with a wrong password.
    dummy: Arc<str>,
    #[cfg(test)]
    pub(crate) verifications: Arc<std::sync::atomic::AtomicUsize>,
}

impl PasswordHasher {
    pub fn new(cfg: &PasswordConfig) -> Result<Self, HashingError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| HashingError(e.to_string()))?;
        let mut hasher = Self {
            params,
            dummy: Arc::from(""),
            #[cfg(test)]
            verifications: Default::default(),
        };
        hasher.dummy = Arc::from(hasher.hash("dummy-password-never-matches")?);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `plain` with a fresh random salt, returning a PHC string.
    pub fn hash(&self, plain: &str) -> Result<String, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashingError(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// A mismatch is `Ok(false)`. Only an unparseable stored hash is an error.
    ///
    /// The salt and cost come from the stored hash, so hashes made under an
    /// older cost setting still verify.
    pub fn verify(&self, hash: &str, plain: &str) -> Result<bool, HashingError> {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            HashingError(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Runs a full verification that always fails. Used where there is no
    /// stored hash to check against.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(&self.dummy, plain);
    }
}
