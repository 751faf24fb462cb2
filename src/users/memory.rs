//! In-memory `UserStore` used by unit and router tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User, UserChanges};

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<BTreeMap<i64, User>>,
    next_id: Mutex<i64>,
    /// Every call fails with a backend error.
    unavailable: bool,
    /// Email lookups never see existing rows, as if another request inserted
    /// the same email between our lookup and our insert.
    stale_lookups: bool,
}

impl MemoryUserStore {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_stale_lookups() -> Self {
        Self {
            stale_lookups: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Backend(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn email_taken(rows: &BTreeMap<i64, User>, email: &str, except: Option<i64>) -> bool {
        rows.values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        if self.stale_lookups {
            return Ok(None);
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::email_taken(&rows, &user.email, None) {
            return Err(StoreError::Duplicate);
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: *next_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            phone_number: user.phone_number,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&id) {
            return Ok(None);
        }
        if let Some(email) = &changes.email {
            if Self::email_taken(&rows, email, Some(id)) {
                return Err(StoreError::Duplicate);
            }
        }
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.first_name {
            row.first_name = v;
        }
        if let Some(v) = changes.last_name {
            row.last_name = v;
        }
        if let Some(v) = changes.email {
            row.email = v;
        }
        if let Some(v) = changes.password_hash {
            row.password_hash = v;
        }
        if let Some(v) = changes.phone_number {
            row.phone_number = v;
        }
        if let Some(v) = changes.role {
            row.role = v;
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}
