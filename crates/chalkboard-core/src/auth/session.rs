use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::accounts::decode_claims;

/// Role of the logged-in user.
///
/// The API names the student role `aluno`; `student` is accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Role {
    #[serde(rename = "professor")]
    Professor,
    #[serde(rename = "aluno", alias = "student")]
    Student,
}

impl Role {
    /// Parse a wire role name
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "professor" => Some(Role::Professor),
            "aluno" | "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Name used in the stored record and in token claims
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::Professor => "professor",
            Role::Student => "aluno",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Professor => write!(f, "Professor"),
            Role::Student => write!(f, "Student"),
        }
    }
}

/// Where the session state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Stored session not read yet
    Loading,
    Unauthenticated,
    Authenticated(Role),
}

impl AuthState {
    pub fn role(&self) -> Option<Role> {
        match self {
            AuthState::Authenticated(role) => Some(*role),
            _ => None,
        }
    }
}

/// The authenticated identity. Either fully present or absent.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Why a stored session record was discarded
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Stored session is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Stored session is missing `{0}`")]
    MissingField(&'static str),

    #[error("Stored session has unknown role `{0}`")]
    UnknownRole(String),

    #[error("Stored role `{stored}` does not match token role `{claimed}`")]
    RoleMismatch { stored: String, claimed: String },
}

/// The persisted shape: `{ username, name?, role, token, loginTime? }`.
///
/// Every field is optional here so that a partial record parses and can be
/// rejected with a precise reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(rename = "loginTime", default, skip_serializing_if = "Option::is_none")]
    pub login_time: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RecordError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(RecordError::MissingField(field))
}

impl Session {
    /// Parse and validate a stored record.
    ///
    /// `now` stands in for a missing or unreadable `loginTime`.
    pub fn from_stored(raw: &str, now: DateTime<Utc>) -> Result<Self, RecordError> {
        let record: SessionRecord = serde_json::from_str(raw)?;
        Self::from_record(record, now)
    }

    pub fn from_record(record: SessionRecord, now: DateTime<Utc>) -> Result<Self, RecordError> {
        let username = required(record.username, "username")?.to_lowercase();
        let role_name = required(record.role, "role")?;
        let token = required(record.token, "token")?;

        let role =
            Role::from_wire(&role_name).ok_or_else(|| RecordError::UnknownRole(role_name.clone()))?;

        let claims = decode_claims(&token);
        if let Some(claimed) = claims.as_ref().and_then(|c| c.role.as_deref()) {
            if Role::from_wire(claimed) != Some(role) {
                return Err(RecordError::RoleMismatch {
                    stored: role_name,
                    claimed: claimed.to_string(),
                });
            }
        }

        let display_name = record
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| claims.and_then(|c| c.name))
            .unwrap_or_else(|| username.clone());

        let issued_at = record
            .login_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now);

        Ok(Self {
            username,
            display_name,
            role,
            token,
            issued_at,
        })
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            username: Some(self.username.clone()),
            name: Some(self.display_name.clone()),
            role: Some(self.role.as_wire().to_string()),
            token: Some(self.token.clone()),
            login_time: Some(self.issued_at.to_rfc3339()),
        }
    }
}
