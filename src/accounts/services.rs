use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use crate::accounts::errors::AccountError;
use crate::accounts::password::{dummy_verify, hash_password, verify_password};
use crate::accounts::repo_types::{
    AuthenticatedUser, NewLoginAttempt, NewUserRow, PublicUser, Stats, User,
};
use crate::accounts::validation::{validate_email, validate_password, validate_username};

/// Signup input as received from a client.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub mood: Option<String>,
    pub agreed_to_terms: bool,
}

/// Window used for `recent_signups`, in calendar days.
const RECENT_SIGNUP_DAYS: i64 = 7;

/// Current UTC time truncated to whole seconds, so stored timestamps sort as text.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

#[instrument(skip(db, input), fields(username = %input.username, email = %input.email))]
pub async fn register(db: &SqlitePool, input: NewUser) -> Result<PublicUser, AccountError> {
    validate_username(&input.username)?;
    validate_email(&input.email)?;
    validate_password(&input.password)?;

    if !input.agreed_to_terms {
        warn!("terms not accepted");
        return Err(AccountError::TermsNotAccepted);
    }

    // Fast path only; the UNIQUE constraints settle races on insert.
    if User::username_exists(db, &input.username).await? {
        warn!("username already exists");
        return Err(AccountError::DuplicateUsername);
    }
    if User::email_exists(db, &input.email).await? {
        warn!("email already registered");
        return Err(AccountError::DuplicateEmail);
    }

    let user = store_new_user(db, input).await?;
    info!(user_id = user.id, "user registered");
    Ok(user)
}

/// Hash and insert without the existence pre-check; a concurrent signup that
/// slipped past it surfaces here as a duplicate error from the UNIQUE constraints.
async fn store_new_user(db: &SqlitePool, input: NewUser) -> Result<PublicUser, AccountError> {
    let NewUser {
        username,
        email,
        password,
        mood,
        agreed_to_terms,
    } = input;

    let (password_hash, password_salt) =
        tokio::task::spawn_blocking(move || hash_password(&password, None))
            .await
            .map_err(|e| AccountError::Internal(format!("hash task failed: {}", e)))?;

    let mood = mood.as_deref().filter(|m| !m.trim().is_empty());

    User::create(
        db,
        &NewUserRow {
            username: &username,
            email: &email,
            password_hash: &password_hash,
            password_salt: &password_salt,
            mood,
            agreed_to_terms,
            created_at: now_utc(),
        },
    )
    .await
}

/// Check `password` against the account registered under `email`.
///
/// Every call leaves one row in `login_attempts`.
#[instrument(skip(db, password))]
pub async fn verify(
    db: &SqlitePool,
    email: &str,
    password: &str,
    origin: Option<&str>,
) -> Result<AuthenticatedUser, AccountError> {
    let attempt = |success| NewLoginAttempt {
        email,
        success,
        origin_address: origin,
        attempt_time: now_utc(),
    };

    let Some(user) = User::find_by_email(db, email).await? else {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || dummy_verify(&password))
            .await
            .map_err(|e| AccountError::Internal(format!("hash task failed: {}", e)))?;
        attempt(false).insert(db).await?;
        warn!("login unknown email");
        return Err(AccountError::UserNotFound);
    };

    let (password, salt, stored) = (
        password.to_owned(),
        user.password_salt.clone(),
        user.password_hash.clone(),
    );
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &salt, &stored))
        .await
        .map_err(|e| AccountError::Internal(format!("hash task failed: {}", e)))?;

    if !ok {
        attempt(false).insert(db).await?;
        warn!(user_id = user.id, "login invalid password");
        return Err(AccountError::InvalidCredentials);
    }

    let mut tx = db.begin().await?;
    User::touch_last_login_tx(&mut tx, user.id, now_utc()).await?;
    attempt(true).insert(&mut *tx).await?;
    tx.commit().await?;

    info!(user_id = user.id, "user logged in");
    Ok(user.into())
}

#[instrument(skip(db))]
pub async fn list_users(db: &SqlitePool) -> Result<Vec<PublicUser>, AccountError> {
    let users = User::list_public(db).await?;
    debug!(count = users.len(), "listed users");
    Ok(users)
}

pub async fn stats(db: &SqlitePool) -> Result<Stats, AccountError> {
    stats_at(db, now_utc()).await
}

/// Stats relative to `now`: the recent window starts at midnight UTC seven
/// calendar days before `now`'s date.
#[instrument(skip(db))]
pub async fn stats_at(db: &SqlitePool, now: OffsetDateTime) -> Result<Stats, AccountError> {
    let since = now
        .date()
        .checked_sub(Duration::days(RECENT_SIGNUP_DAYS))
        .unwrap_or(time::Date::MIN)
        .midnight()
        .assume_utc();

    let total_users = User::count(db).await?;
    let recent_signups = User::count_created_since(db, since).await?;
    let mood_distribution = User::mood_distribution(db).await?;

    Ok(Stats {
        total_users,
        recent_signups,
        mood_distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::errors::ValidationError;
    use crate::accounts::repo_types::MoodCount;
    use crate::db::test_pool;
    use time::macros::datetime;

    fn alice() -> NewUser {
        NewUser {
            username: "alice_1".into(),
            email: "a@b.com".into(),
            password: "Abcdef1!".into(),
            mood: Some("happy".into()),
            agreed_to_terms: true,
        }
    }

    async fn attempts(db: &SqlitePool) -> Vec<(String, bool, Option<String>)> {
        sqlx::query_as("SELECT email, success, origin_address FROM login_attempts ORDER BY id")
            .fetch_all(db)
            .await
            .unwrap()
    }

    async fn insert_at(db: &SqlitePool, username: &str, mood: Option<&str>, at: OffsetDateTime) {
        let email = format!("{username}@example.com");
        User::create(
            db,
            &NewUserRow {
                username,
                email: &email,
                password_hash: "h",
                password_salt: "s",
                mood,
                agreed_to_terms: true,
                created_at: at,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn signup_and_login_scenario() {
        let db = test_pool().await;

        let created = register(&db, alice()).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.username, "alice_1");
        assert_eq!(created.email, "a@b.com");
        assert_eq!(created.mood.as_deref(), Some("happy"));

        let mut same_email = alice();
        same_email.username = "alice_2".into();
        let err = register(&db, same_email).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail), "{err:?}");

        let user = verify(&db, "a@b.com", "Abcdef1!", None).await.unwrap();
        assert_eq!(
            user,
            AuthenticatedUser {
                id: 1,
                username: "alice_1".into(),
                email: "a@b.com".into(),
            }
        );

        let err = verify(&db, "a@b.com", "wrong", None).await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials), "{err:?}");
    }

    #[tokio::test]
    async fn stored_credentials_are_hashed() {
        let db = test_pool().await;
        register(&db, alice()).await.unwrap();

        let row = User::find_by_email(&db, "a@b.com").await.unwrap().unwrap();
        assert_ne!(row.password_hash, "Abcdef1!");
        assert_eq!(row.password_salt.len(), 32);
        assert_eq!(
            hash_password("Abcdef1!", Some(&row.password_salt)).0,
            row.password_hash
        );
    }

    #[tokio::test]
    async fn duplicate_username_wins_over_duplicate_email() {
        let db = test_pool().await;
        register(&db, alice()).await.unwrap();

        let err = register(&db, alice()).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername), "{err:?}");

        let mut new_email = alice();
        new_email.email = "other@b.com".into();
        let err = register(&db, new_email).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername), "{err:?}");
    }

    #[tokio::test]
    async fn validation_runs_before_terms_and_storage() {
        let db = test_pool().await;

        let mut bad = alice();
        bad.username = "al".into();
        bad.agreed_to_terms = false;
        let err = register(&db, bad).await.unwrap_err();
        assert!(matches!(
            err,
            AccountError::Validation(ValidationError::InvalidFormat(_))
        ));

        let mut weak = alice();
        weak.password = "longenough".into();
        let err = register(&db, weak).await.unwrap_err();
        assert!(matches!(
            err,
            AccountError::Validation(ValidationError::WeakPassword(_))
        ));

        let mut no_terms = alice();
        no_terms.agreed_to_terms = false;
        let err = register(&db, no_terms).await.unwrap_err();
        assert!(matches!(err, AccountError::TermsNotAccepted));

        assert_eq!(User::count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_mood_is_stored_as_null() {
        let db = test_pool().await;
        let mut input = alice();
        input.mood = Some("   ".into());
        let user = register(&db, input).await.unwrap();
        assert_eq!(user.mood, None);
    }

    #[tokio::test]
    async fn padded_mood_is_kept_as_sent() {
        let db = test_pool().await;
        let mut input = alice();
        input.mood = Some(" happy ".into());
        let user = register(&db, input).await.unwrap();
        assert_eq!(user.mood.as_deref(), Some(" happy "));
    }

    #[tokio::test]
    async fn insert_race_still_reports_duplicate_username() {
        let db = test_pool().await;
        // Another signup lands after the pre-check passed.
        insert_at(&db, "alice_1", None, datetime!(2026-10-16 09:00:00 UTC)).await;

        let err = store_new_user(&db, alice()).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername), "{err:?}");

        let mut other_name = alice();
        other_name.username = "alice_2".into();
        other_name.email = "alice_1@example.com".into();
        let err = store_new_user(&db, other_name).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail), "{err:?}");
        assert_eq!(User::count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn verify_unknown_email_is_user_not_found() {
        let db = test_pool().await;
        let err = verify(&db, "nobody@b.com", "Abcdef1!", Some("10.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::UserNotFound));
        assert_eq!(
            attempts(&db).await,
            vec![("nobody@b.com".to_string(), false, Some("10.0.0.1".to_string()))]
        );
    }

    #[tokio::test]
    async fn every_verify_records_one_attempt() {
        let db = test_pool().await;
        register(&db, alice()).await.unwrap();

        verify(&db, "a@b.com", "nope", None).await.unwrap_err();
        verify(&db, "a@b.com", "Abcdef1!", Some("127.0.0.1")).await.unwrap();

        let rows = attempts(&db).await;
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].1);
        assert!(rows[1].1);
        assert_eq!(rows[1].2.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn successful_verify_sets_last_login() {
        let db = test_pool().await;
        register(&db, alice()).await.unwrap();

        let before = User::find_by_email(&db, "a@b.com").await.unwrap().unwrap();
        assert!(before.last_login.is_none());

        verify(&db, "a@b.com", "wrong", None).await.unwrap_err();
        let after_fail = User::find_by_email(&db, "a@b.com").await.unwrap().unwrap();
        assert!(after_fail.last_login.is_none());

        verify(&db, "a@b.com", "Abcdef1!", None).await.unwrap();
        let after = User::find_by_email(&db, "a@b.com").await.unwrap().unwrap();
        assert!(after.last_login.is_some());
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn list_users_is_newest_first() {
        let db = test_pool().await;
        insert_at(&db, "old_one", None, datetime!(2026-01-01 00:00:00 UTC)).await;
        insert_at(&db, "newest", None, datetime!(2026-10-16 00:00:00 UTC)).await;
        insert_at(&db, "middle", None, datetime!(2026-05-01 00:00:00 UTC)).await;

        let names: Vec<String> = list_users(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["newest", "middle", "old_one"]);
    }

    #[tokio::test]
    async fn stats_window_and_moods() {
        let db = test_pool().await;
        let now = datetime!(2026-10-16 15:00:00 UTC);

        // Window opens at 2026-10-09 00:00 UTC.
        insert_at(&db, "today", Some("happy"), datetime!(2026-10-16 08:00:00 UTC)).await;
        insert_at(&db, "edge_in", Some("happy"), datetime!(2026-10-09 00:00:00 UTC)).await;
        insert_at(&db, "edge_out", Some("sad"), datetime!(2026-10-08 23:59:59 UTC)).await;
        insert_at(&db, "long_ago", None, datetime!(2026-01-01 12:00:00 UTC)).await;
        insert_at(&db, "mid_week", Some("calm"), datetime!(2026-10-12 12:00:00 UTC)).await;

        let stats = stats_at(&db, now).await.unwrap();
        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.recent_signups, 3);
        assert_eq!(
            stats.mood_distribution,
            vec![
                MoodCount { mood: "happy".into(), count: 2 },
                MoodCount { mood: "calm".into(), count: 1 },
                MoodCount { mood: "sad".into(), count: 1 },
            ]
        );
        let mood_total: i64 = stats.mood_distribution.iter().map(|m| m.count).sum();
        assert!(mood_total <= stats.total_users);
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let db = test_pool().await;
        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.total_users, 0);
        assert_eq!(stats.recent_signups, 0);
        assert!(stats.mood_distribution.is_empty());
    }
}
