//! Postgres implementation of the session adapter.
//!
//! Tables follow the camelCase column layout already used by the course
//! platform's schema (`"user"`, `"account"`, `"session"`).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use coursegate_core::{Result, UserId};
use coursegate_identity::{
    Account, AuthenticationError, Role, SessionAdapter, SessionRecord, User,
};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{instrument, warn};

fn adapter_error(e: sqlx::Error) -> AuthenticationError {
    AuthenticationError::Adapter {
        details: e.to_string(),
    }
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    email: String,
    #[sqlx(rename = "emailVerified")]
    email_verified: Option<NaiveDateTime>,
    image: Option<String>,
    #[sqlx(rename = "hashedPassword")]
    hashed_password: Option<String>,
    role: Option<String>,
}

impl UserRow {
    fn into_user(self) -> User {
        let role = self.role.as_deref().and_then(|r| match Role::from_str(r) {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(user_id = %self.id, error = %e, "ignoring unknown stored role");
                None
            }
        });
        User::with_all_fields(
            UserId::from_stored(self.id),
            self.email,
            self.name,
            self.email_verified.map(|t| t.and_utc()),
            self.image,
            self.hashed_password,
            role,
        )
    }
}

/// Row type for session queries joined with their user.
#[derive(FromRow)]
struct SessionUserRow {
    #[sqlx(rename = "sessionToken")]
    session_token: String,
    expires: NaiveDateTime,
    #[sqlx(flatten)]
    user: UserRow,
}

const USER_COLUMNS: &str =
    r#"u.id, u.name, u.email, u."emailVerified", u.image, u."hashedPassword", u.role"#;

fn naive(ts: Option<DateTime<Utc>>) -> Option<NaiveDateTime> {
    ts.map(|t| t.naive_utc())
}

/// Session adapter backed by a Postgres pool.
#[derive(Clone)]
pub struct PgAdapter {
    pool: PgPool,
}

impl PgAdapter {
    /// Creates a new adapter.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(
        &self,
        filter: &str,
        args: &[&str],
    ) -> Result<Option<User>, AuthenticationError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" u {filter}"#);
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for arg in args {
            query = query.bind(*arg);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(row.map(UserRow::into_user))
    }
}

#[async_trait]
impl SessionAdapter for PgAdapter {
    #[instrument(skip_all, fields(user_id = %user.id()))]
    async fn create_user(&self, user: &User) -> Result<(), AuthenticationError> {
        sqlx::query(
            r#"
            INSERT INTO "user" (id, name, email, "emailVerified", image, "hashedPassword", role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id().as_str())
        .bind(user.name())
        .bind(user.email())
        .bind(naive(user.email_verified()))
        .bind(user.image())
        .bind(user.hashed_password())
        .bind(user.role().map(|r| r.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AuthenticationError::DuplicateEmail,
            _ => adapter_error(e),
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, AuthenticationError> {
        self.fetch_user("WHERE u.id = $1", &[id.as_str()]).await
    }

    #[instrument(skip_all)]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthenticationError> {
        self.fetch_user("WHERE u.email = $1 LIMIT 1", &[email]).await
    }

    #[instrument(skip(self))]
    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, AuthenticationError> {
        self.fetch_user(
            r#"JOIN "account" a ON a."userId" = u.id
               WHERE a.provider = $1 AND a."providerAccountId" = $2"#,
            &[provider, provider_account_id],
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user.id()))]
    async fn update_user(&self, user: &User) -> Result<(), AuthenticationError> {
        let result = sqlx::query(
            r#"
            UPDATE "user"
            SET name = $2, email = $3, "emailVerified" = $4, image = $5,
                "hashedPassword" = $6, role = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id().as_str())
        .bind(user.name())
        .bind(user.email())
        .bind(naive(user.email_verified()))
        .bind(user.image())
        .bind(user.hashed_password())
        .bind(user.role().map(|r| r.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AuthenticationError::DuplicateEmail,
            _ => adapter_error(e),
        })?;

        if result.rows_affected() == 0 {
            return Err(AuthenticationError::Adapter {
                details: format!("user '{}' does not exist", user.id()),
            }
            .into());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: &UserId) -> Result<(), AuthenticationError> {
        // Account and session rows cascade.
        sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(())
    }

    #[instrument(skip_all, fields(provider = %account.provider, user_id = %account.user_id))]
    async fn link_account(&self, account: &Account) -> Result<(), AuthenticationError> {
        sqlx::query(
            r#"
            INSERT INTO "account" (
                "userId", type, provider, "providerAccountId",
                refresh_token, access_token, expires_at, token_type, scope, id_token
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider, "providerAccountId") DO UPDATE SET
                "userId" = EXCLUDED."userId",
                type = EXCLUDED.type,
                refresh_token = COALESCE(EXCLUDED.refresh_token, "account".refresh_token),
                access_token = EXCLUDED.access_token,
                expires_at = EXCLUDED.expires_at,
                token_type = EXCLUDED.token_type,
                scope = EXCLUDED.scope,
                id_token = EXCLUDED.id_token
            "#,
        )
        .bind(account.user_id.as_str())
        .bind(account.kind.as_str())
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(account.refresh_token.as_deref())
        .bind(account.access_token.as_deref())
        .bind(account.expires_at)
        .bind(account.token_type.as_deref())
        .bind(account.scope.as_deref())
        .bind(account.id_token.as_deref())
        .execute(&self.pool)
        .await
        .map_err(adapter_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), AuthenticationError> {
        sqlx::query(r#"DELETE FROM "account" WHERE provider = $1 AND "providerAccountId" = $2"#)
            .bind(provider)
            .bind(provider_account_id)
            .execute(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %session.user_id))]
    async fn create_session(&self, session: &SessionRecord) -> Result<(), AuthenticationError> {
        sqlx::query(r#"INSERT INTO "session" ("sessionToken", "userId", expires) VALUES ($1, $2, $3)"#)
            .bind(&session.session_token)
            .bind(session.user_id.as_str())
            .bind(session.expires.naive_utc())
            .execute(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<(SessionRecord, User)>, AuthenticationError> {
        let sql = format!(
            r#"SELECT s."sessionToken", s.expires, {USER_COLUMNS}
               FROM "session" s JOIN "user" u ON u.id = s."userId"
               WHERE s."sessionToken" = $1"#
        );
        let row = sqlx::query_as::<_, SessionUserRow>(&sql)
            .bind(session_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(adapter_error)?;

        Ok(row.map(|row| {
            let user = row.user.into_user();
            let record = SessionRecord {
                session_token: row.session_token,
                user_id: user.id().clone(),
                expires: row.expires.and_utc(),
            };
            (record, user)
        }))
    }

    #[instrument(skip_all)]
    async fn update_session(&self, session: &SessionRecord) -> Result<(), AuthenticationError> {
        sqlx::query(r#"UPDATE "session" SET expires = $2 WHERE "sessionToken" = $1"#)
            .bind(&session.session_token)
            .bind(session.expires.naive_utc())
            .execute(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete_session(&self, session_token: &str) -> Result<(), AuthenticationError> {
        sqlx::query(r#"DELETE FROM "session" WHERE "sessionToken" = $1"#)
            .bind(session_token)
            .execute(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_expired_sessions(&self) -> Result<u64, AuthenticationError> {
        let result = sqlx::query(r#"DELETE FROM "session" WHERE expires < (NOW() AT TIME ZONE 'utc')"#)
            .execute(&self.pool)
            .await
            .map_err(adapter_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    const MIGRATION: &str = include_str!("../../migrations/0001_auth.sql");

    fn column_type(name: &str) -> Option<&'static str> {
        MIGRATION.lines().find_map(|line| {
            let mut parts = line.split_whitespace();
            (parts.next() == Some(name)).then(|| parts.next()).flatten()
        })
    }

    #[test]
    fn account_expiry_holds_timestamps_past_2038() {
        // Bound as i64 in link_account.
        assert_eq!(column_type("expires_at"), Some("BIGINT,"));
    }
}
