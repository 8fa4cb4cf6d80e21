use serde::{Serialize, Serializer};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String, // PBKDF2 hex digest
    pub password_salt: String, // hex, fed to PBKDF2 as-is
    pub mood: Option<String>,
    pub agreed_to_terms: bool,
    pub created_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

/// Fields safe to hand out: everything except the credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub mood: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What a successful verification returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for AuthenticatedUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}

/// Row to insert; hash and salt are already derived.
#[derive(Debug)]
pub struct NewUserRow<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub password_salt: &'a str,
    pub mood: Option<&'a str>,
    pub agreed_to_terms: bool,
    pub created_at: OffsetDateTime,
}

/// Audit row written on every verification, successful or not.
#[derive(Debug, Clone, Copy)]
pub struct NewLoginAttempt<'a> {
    pub email: &'a str,
    pub success: bool,
    pub origin_address: Option<&'a str>,
    pub attempt_time: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MoodCount {
    pub mood: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_users: i64,
    pub recent_signups: i64,
    /// Most common mood first; serialized as an object in that order.
    #[serde(serialize_with = "ordered_mood_map")]
    pub mood_distribution: Vec<MoodCount>,
}

fn ordered_mood_map<S: Serializer>(moods: &[MoodCount], s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(moods.iter().map(|m| (&m.mood, m.count)))
}
