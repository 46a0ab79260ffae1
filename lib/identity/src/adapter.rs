//! Session adapter: persistence of users, account links and session rows.
//!
//! The server uses a Postgres implementation; `MemoryAdapter` keeps the same
//! contract in process for tests and local runs without a database.

use async_trait::async_trait;
use chrono::Utc;
use coursegate_core::{Result, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::AuthenticationError;
use crate::session::SessionRecord;
use crate::user::{Account, User};

/// Storage contract for identity and session records.
///
/// Account links are keyed by `(provider, provider_account_id)`; linking the
/// same external account twice keeps a single link.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Inserts a new user. Fails with `DuplicateEmail` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), AuthenticationError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, AuthenticationError>;

    /// Finds the user with exactly this email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthenticationError>;

    /// Finds the user linked to an external provider account.
    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, AuthenticationError>;

    async fn update_user(&self, user: &User) -> Result<(), AuthenticationError>;

    /// Deletes a user together with its account links and sessions.
    async fn delete_user(&self, id: &UserId) -> Result<(), AuthenticationError>;

    /// Links an external account, replacing the stored tokens if the link exists.
    async fn link_account(&self, account: &Account) -> Result<(), AuthenticationError>;

    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), AuthenticationError>;

    async fn create_session(&self, session: &SessionRecord) -> Result<(), AuthenticationError>;

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<(SessionRecord, User)>, AuthenticationError>;

    async fn update_session(&self, session: &SessionRecord) -> Result<(), AuthenticationError>;

    async fn delete_session(&self, session_token: &str) -> Result<(), AuthenticationError>;

    /// Removes expired session rows, returning how many were deleted.
    async fn delete_expired_sessions(&self) -> Result<u64, AuthenticationError>;
}

/// In-process adapter backed by hash maps.
#[derive(Default)]
pub struct MemoryAdapter {
    users: RwLock<HashMap<UserId, User>>,
    accounts: RwLock<HashMap<(String, String), Account>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored account links.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }
}

#[async_trait]
impl SessionAdapter for MemoryAdapter {
    async fn create_user(&self, user: &User) -> Result<(), AuthenticationError> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email() == user.email()) {
            return Err(AuthenticationError::DuplicateEmail.into());
        }
        users.insert(user.id().clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, AuthenticationError> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthenticationError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email() == email)
            .cloned())
    }

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, AuthenticationError> {
        let key = (provider.to_string(), provider_account_id.to_string());
        let Some(user_id) = self.accounts.read().get(&key).map(|a| a.user_id.clone()) else {
            return Ok(None);
        };
        Ok(self.users.read().get(&user_id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), AuthenticationError> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|u| u.email() == user.email() && u.id() != user.id())
        {
            return Err(AuthenticationError::DuplicateEmail.into());
        }
        match users.get_mut(user.id()) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AuthenticationError::Adapter {
                details: format!("user '{}' does not exist", user.id()),
            }
            .into()),
        }
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), AuthenticationError> {
        self.users.write().remove(id);
        self.accounts.write().retain(|_, a| &a.user_id != id);
        self.sessions.write().retain(|_, s| &s.user_id != id);
        Ok(())
    }

    async fn link_account(&self, account: &Account) -> Result<(), AuthenticationError> {
        if !self.users.read().contains_key(&account.user_id) {
            return Err(AuthenticationError::Adapter {
                details: format!("user '{}' does not exist", account.user_id),
            }
            .into());
        }
        let key = (
            account.provider.clone(),
            account.provider_account_id.clone(),
        );
        self.accounts.write().insert(key, account.clone());
        Ok(())
    }

    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), AuthenticationError> {
        self.accounts
            .write()
            .remove(&(provider.to_string(), provider_account_id.to_string()));
        Ok(())
    }

    async fn create_session(&self, session: &SessionRecord) -> Result<(), AuthenticationError> {
        self.sessions
            .write()
            .insert(session.session_token.clone(), session.clone());
        Ok(())
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<(SessionRecord, User)>, AuthenticationError> {
        let Some(session) = self.sessions.read().get(session_token).cloned() else {
            return Ok(None);
        };
        Ok(self
            .users
            .read()
            .get(&session.user_id)
            .cloned()
            .map(|user| (session, user)))
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), AuthenticationError> {
        if let Some(existing) = self.sessions.write().get_mut(&session.session_token) {
            *existing = session.clone();
        }
        Ok(())
    }

    async fn delete_session(&self, session_token: &str) -> Result<(), AuthenticationError> {
        self.sessions.write().remove(session_token);
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<u64, AuthenticationError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::user::AccountKind;
    use chrono::Duration;

    fn google_account(user_id: &UserId, sub: &str) -> Account {
        Account::new(
            user_id.clone(),
            AccountKind::Oidc,
            "google".to_string(),
            sub.to_string(),
        )
    }

    #[tokio::test]
    async fn create_and_find_user_by_email() {
        let adapter = MemoryAdapter::new();
        let user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");

        let found = adapter
            .get_user_by_email("a@b.com")
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(found.id(), user.id());

        assert!(
            adapter
                .get_user_by_email("A@B.COM")
                .await
                .expect("query")
                .is_none(),
            "email match is exact"
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let adapter = MemoryAdapter::new();
        adapter
            .create_user(&User::new("a@b.com".to_string()))
            .await
            .expect("create");

        assert!(
            adapter
                .create_user(&User::new("a@b.com".to_string()))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn update_user_persists_role() {
        let adapter = MemoryAdapter::new();
        let mut user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");

        user.set_role(Some(Role::Trainee));
        adapter.update_user(&user).await.expect("update");

        let stored = adapter.get_user(user.id()).await.expect("query").expect("exists");
        assert_eq!(stored.role(), Some(Role::Trainee));
    }

    #[tokio::test]
    async fn link_account_is_idempotent() {
        let adapter = MemoryAdapter::new();
        let user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");

        let mut account = google_account(user.id(), "1098");
        adapter.link_account(&account).await.expect("first link");
        account.access_token = Some("newer".to_string());
        adapter.link_account(&account).await.expect("second link");

        assert_eq!(adapter.account_count(), 1);
        let linked = adapter
            .get_user_by_account("google", "1098")
            .await
            .expect("query")
            .expect("linked");
        assert_eq!(linked.id(), user.id());
    }

    #[tokio::test]
    async fn link_account_requires_existing_user() {
        let adapter = MemoryAdapter::new();
        let account = google_account(&UserId::from("ghost"), "1");
        assert!(adapter.link_account(&account).await.is_err());
    }

    #[tokio::test]
    async fn unlink_account_removes_link() {
        let adapter = MemoryAdapter::new();
        let user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");
        adapter
            .link_account(&google_account(user.id(), "1098"))
            .await
            .expect("link");

        adapter.unlink_account("google", "1098").await.expect("unlink");

        assert!(
            adapter
                .get_user_by_account("google", "1098")
                .await
                .expect("query")
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_user_cascades() {
        let adapter = MemoryAdapter::new();
        let user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");
        adapter
            .link_account(&google_account(user.id(), "1098"))
            .await
            .expect("link");
        adapter
            .create_session(&SessionRecord::new(
                "tok".to_string(),
                user.id().clone(),
                Duration::hours(1),
            ))
            .await
            .expect("session");

        adapter.delete_user(user.id()).await.expect("delete");

        assert_eq!(adapter.account_count(), 0);
        assert!(adapter.get_session_and_user("tok").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn session_round_trip_and_delete() {
        let adapter = MemoryAdapter::new();
        let user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");

        let mut session = SessionRecord::new("tok".to_string(), user.id().clone(), Duration::hours(1));
        adapter.create_session(&session).await.expect("create session");

        session.expires = session.expires + Duration::hours(1);
        adapter.update_session(&session).await.expect("update");

        let (stored, owner) = adapter
            .get_session_and_user("tok")
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(stored.expires, session.expires);
        assert_eq!(owner.id(), user.id());

        adapter.delete_session("tok").await.expect("delete");
        assert!(adapter.get_session_and_user("tok").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn delete_expired_sessions_counts_removed_rows() {
        let adapter = MemoryAdapter::new();
        let user = User::new("a@b.com".to_string());
        adapter.create_user(&user).await.expect("create");

        for (token, duration) in [
            ("live", Duration::hours(1)),
            ("dead-1", Duration::seconds(-5)),
            ("dead-2", Duration::seconds(-5)),
        ] {
            adapter
                .create_session(&SessionRecord::new(
                    token.to_string(),
                    user.id().clone(),
                    duration,
                ))
                .await
                .expect("create session");
        }

        assert_eq!(adapter.delete_expired_sessions().await.expect("cleanup"), 2);
        assert!(adapter.get_session_and_user("live").await.expect("query").is_some());
    }
}
