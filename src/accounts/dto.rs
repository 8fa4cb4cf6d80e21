use std::collections::BTreeMap;

use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

use crate::accounts::errors::AccountError;
use crate::accounts::repo_types::{AuthenticatedUser, PublicUser};
use crate::accounts::services::NewUser;

/// Request body for signup. Required fields are checked by hand so a missing
/// one is reported by name.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub agreed_to_terms: bool,
}

impl TryFrom<SignupRequest> for NewUser {
    type Error = AccountError;

    fn try_from(r: SignupRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            username: r.username.ok_or(AccountError::MissingField("username"))?,
            email: r.email.ok_or(AccountError::MissingField("email"))?,
            password: r.password.ok_or(AccountError::MissingField("password"))?,
            mood: r.mood,
            agreed_to_terms: r.agreed_to_terms,
        })
    }
}

/// Request body for credential verification.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl VerifyRequest {
    pub fn into_credentials(self) -> Result<(String, String), AccountError> {
        match (self.email, self.password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(AccountError::MissingCredentials),
        }
    }
}

/// Any JSON value, judged the way web clients expect a checkbox flag to be.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<IgnoredAny>),
    Object(BTreeMap<String, IgnoredAny>),
}

fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(d)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Float(f)) => f != 0.0,
        Some(Flag::Text(s)) => !s.is_empty(),
        Some(Flag::List(l)) => !l.is_empty(),
        Some(Flag::Object(m)) => !m.is_empty(),
    })
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: AuthenticatedUser,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
    pub count: usize,
}
