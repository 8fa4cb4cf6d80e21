use sqlx::{Executor, Sqlite, SqlitePool, Transaction};
use time::OffsetDateTime;
use tracing::error;

use crate::accounts::errors::AccountError;
use crate::accounts::repo_types::{MoodCount, NewLoginAttempt, NewUserRow, PublicUser, User};

impl User {
    /// Find a user by exact email.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, AccountError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, password_salt, mood,
                   agreed_to_terms, created_at, last_login
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn username_exists(db: &SqlitePool, username: &str) -> Result<bool, AccountError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(db)
            .await?;
        Ok(found.is_some())
    }

    pub async fn email_exists(db: &SqlitePool, email: &str) -> Result<bool, AccountError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(found.is_some())
    }

    /// Insert a new user. UNIQUE violations come back as the matching duplicate error.
    pub async fn create(db: &SqlitePool, row: &NewUserRow<'_>) -> Result<PublicUser, AccountError> {
        sqlx::query_as::<_, PublicUser>(
            r#"
            INSERT INTO users
                (username, email, password_hash, password_salt, mood, agreed_to_terms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, username, email, mood, created_at
            "#,
        )
        .bind(row.username)
        .bind(row.email)
        .bind(row.password_hash)
        .bind(row.password_salt)
        .bind(row.mood)
        .bind(row.agreed_to_terms)
        .bind(row.created_at)
        .fetch_one(db)
        .await
        .map_err(map_insert_error)
    }

    /// Set `last_login` within a transaction.
    pub async fn touch_last_login_tx(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: i64,
        at: OffsetDateTime,
    ) -> Result<(), AccountError> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// All users, newest first.
    pub async fn list_public(db: &SqlitePool) -> Result<Vec<PublicUser>, AccountError> {
        let rows = sqlx::query_as::<_, PublicUser>(
            r#"
            SELECT id, username, email, mood, created_at
            FROM users
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, AccountError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(n)
    }

    pub async fn count_created_since(
        db: &SqlitePool,
        since: OffsetDateTime,
    ) -> Result<i64, AccountError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE created_at >= ?")
            .bind(since)
            .fetch_one(db)
            .await?;
        Ok(n)
    }

    pub async fn mood_distribution(db: &SqlitePool) -> Result<Vec<MoodCount>, AccountError> {
        let rows = sqlx::query_as::<_, MoodCount>(
            r#"
            SELECT mood, COUNT(*) AS count
            FROM users
            WHERE mood IS NOT NULL
            GROUP BY mood
            ORDER BY count DESC, mood ASC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

impl NewLoginAttempt<'_> {
    /// Append to the audit log. Works on the pool or inside a transaction.
    pub async fn insert<'e, E>(&self, exec: E) -> Result<(), AccountError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (email, attempt_time, success, origin_address)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(self.email)
        .bind(self.attempt_time)
        .bind(self.success)
        .bind(self.origin_address)
        .execute(exec)
        .await?;
        Ok(())
    }
}

fn map_insert_error(e: sqlx::Error) -> AccountError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            let msg = db.message();
            if msg.contains("users.username") {
                return AccountError::DuplicateUsername;
            }
            if msg.contains("users.email") {
                return AccountError::DuplicateEmail;
            }
        }
    }
    error!(error = %e, "failed to create user");
    AccountError::from(e)
}
