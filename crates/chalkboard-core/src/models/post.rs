use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::comment::Comment;

/// Reading time as stored by the API: a plain number of minutes or free
/// text such as "5 min".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(untagged)]
pub enum ReadTime {
    Minutes(u32),
    Text(String),
}

impl fmt::Display for ReadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadTime::Minutes(m) => write!(f, "{} min", m),
            ReadTime::Text(t) => write!(f, "{}", t),
        }
    }
}

/// Minutes shown when a post carries no reading time
pub const DEFAULT_READ_TIME_MINUTES: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "isActive", default = "default_active")]
    pub is_active: bool,
    #[serde(rename = "readTime", alias = "reading_time", default)]
    pub read_time: Option<ReadTime>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

fn default_active() -> bool {
    true
}

impl Post {
    /// Reading time for display, falling back to the default estimate
    pub fn read_time_display(&self) -> String {
        self.read_time
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| ReadTime::Minutes(DEFAULT_READ_TIME_MINUTES).to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("Please fill in all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Payload for creating or updating a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub author: String,
    pub description: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "readTime")]
    pub read_time: Option<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<String>,
}

impl PostDraft {
    /// Empty draft for a new post, active by default
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            is_active: true,
            ..Default::default()
        }
    }

    /// Pre-fill a draft from an existing post for editing
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            description: post.description.clone(),
            is_active: post.is_active,
            read_time: post.read_time.as_ref().map(|r| match r {
                ReadTime::Minutes(m) => m.to_string(),
                ReadTime::Text(t) => t.clone(),
            }),
            created_at: None,
            updated_at: None,
        }
    }

    /// Trim every field and check the required ones.
    ///
    /// Returns the normalized draft; a blank optional reading time becomes
    /// `None`.
    pub fn validated(&self) -> Result<Self, DraftError> {
        let title = self.title.trim();
        let content = self.content.trim();
        let author = self.author.trim();
        let description = self.description.trim();

        let missing: Vec<&'static str> = [
            ("title", title),
            ("description", description),
            ("author", author),
            ("content", content),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(DraftError::MissingFields(missing));
        }

        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
            author: author.to_string(),
            description: description.to_string(),
            is_active: self.is_active,
            read_time: self
                .read_time
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        })
    }

    pub fn stamped_created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at.to_rfc3339());
        self
    }

    pub fn stamped_updated(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at.to_rfc3339());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_accepts_mongo_style_id() {
        let json = r#"{"_id":"abc123","title":"Hello","author":"Matheus"}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, "abc123");
        assert!(post.is_active);
        assert!(post.comments.is_empty());
    }

    #[test]
    fn test_read_time_number_or_text() {
        let a: Post = serde_json::from_str(r#"{"id":"1","title":"t","readTime":7}"#).unwrap();
        let b: Post =
            serde_json::from_str(r#"{"id":"2","title":"t","readTime":"3 minutos"}"#).unwrap();
        let c: Post = serde_json::from_str(r#"{"id":"3","title":"t"}"#).unwrap();

        assert_eq!(a.read_time_display(), "7 min");
        assert_eq!(b.read_time_display(), "3 minutos");
        assert_eq!(c.read_time_display(), "5 min");
    }

    #[test]
    fn test_draft_rejects_blank_required_fields() {
        let draft = PostDraft {
            title: "  ".to_string(),
            content: "body".to_string(),
            author: "Matheus".to_string(),
            description: "".to_string(),
            ..Default::default()
        };

        let err = draft.validated().unwrap_err();
        assert_eq!(err, DraftError::MissingFields(vec!["title", "description"]));
    }

    #[test]
    fn test_draft_trims_and_drops_blank_read_time() {
        let draft = PostDraft {
            title: " Title ".to_string(),
            content: "\nbody\n".to_string(),
            author: "Matheus ".to_string(),
            description: " desc".to_string(),
            is_active: false,
            read_time: Some("   ".to_string()),
            ..Default::default()
        };

        let clean = draft.validated().unwrap();
        assert_eq!(clean.title, "Title");
        assert_eq!(clean.content, "body");
        assert_eq!(clean.author, "Matheus");
        assert_eq!(clean.description, "desc");
        assert!(!clean.is_active);
        assert_eq!(clean.read_time, None);
    }

    #[test]
    fn test_draft_serializes_null_read_time_and_skips_stamps() {
        let draft = PostDraft::new("Matheus");
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value["readTime"].is_null());
        assert_eq!(value["isActive"], serde_json::json!(true));
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_draft_from_post_round_trips_fields() {
        let post: Post = serde_json::from_str(
            r#"{"id":"1","title":"T","description":"D","content":"C","author":"A","isActive":false,"readTime":4}"#,
        )
        .unwrap();
        let draft = PostDraft::from_post(&post);
        assert_eq!(draft.title, "T");
        assert!(!draft.is_active);
        assert_eq!(draft.read_time.as_deref(), Some("4"));
    }
}
