use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::post::{DraftError, Post};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Comment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(alias = "content", default)]
    pub text: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "parentId", alias = "parent_id", default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

/// A comment positioned in display order with its nesting depth.
#[derive(Debug, Clone, Copy)]
pub struct ThreadEntry<'a> {
    pub depth: usize,
    pub comment: &'a Comment,
}

/// Flatten a comment thread into display order.
///
/// Threads arrive either nested (`replies`) or flat (`parent_id`); both are
/// handled, and a comment whose parent is unknown is shown at top level.
pub fn flatten_thread(comments: &[Comment]) -> Vec<ThreadEntry<'_>> {
    let mut known_ids = HashSet::new();
    collect_ids(comments, &mut known_ids);

    let mut children: HashMap<&str, Vec<&Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in comments {
        match comment.parent_id.as_deref() {
            Some(parent) if parent != comment.id && known_ids.contains(parent) => {
                children.entry(parent).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    let mut out = Vec::with_capacity(known_ids.len());
    let mut visited = HashSet::new();
    for root in roots {
        visit(root, 0, &children, &mut visited, &mut out);
    }

    // Parent cycles leave comments unreachable from any root
    for comment in comments {
        if !visited.contains(comment.id.as_str()) {
            visit(comment, 0, &children, &mut visited, &mut out);
        }
    }

    out
}

fn collect_ids<'a>(comments: &'a [Comment], ids: &mut HashSet<&'a str>) {
    for c in comments {
        ids.insert(c.id.as_str());
        collect_ids(&c.replies, ids);
    }
}

fn visit<'a>(
    comment: &'a Comment,
    depth: usize,
    children: &HashMap<&str, Vec<&'a Comment>>,
    visited: &mut HashSet<&'a str>,
    out: &mut Vec<ThreadEntry<'a>>,
) {
    if !visited.insert(comment.id.as_str()) {
        return;
    }
    out.push(ThreadEntry { depth, comment });
    for reply in &comment.replies {
        visit(reply, depth + 1, children, visited, out);
    }
    if let Some(kids) = children.get(comment.id.as_str()) {
        for kid in kids {
            visit(kid, depth + 1, children, visited, out);
        }
    }
}

/// Count every comment in a thread, nested replies included
pub fn count_comments(comments: &[Comment]) -> usize {
    comments.iter().map(|c| 1 + count_comments(&c.replies)).sum()
}

/// Replace a comment with the same id anywhere in the thread, or append it
/// under its parent (top level when the parent is not found).
pub fn upsert_comment(comments: &mut Vec<Comment>, updated: Comment) {
    if let Some(existing) = find_mut(comments, &updated.id) {
        let replies = std::mem::take(&mut existing.replies);
        *existing = updated;
        if existing.replies.is_empty() {
            existing.replies = replies;
        }
        return;
    }
    if let Some(parent_id) = updated.parent_id.clone() {
        if let Some(parent) = find_mut(comments, &parent_id) {
            parent.replies.push(updated);
            return;
        }
    }
    comments.push(updated);
}

/// Remove a comment (and its nested replies) from the thread.
/// Returns true if something was removed.
pub fn remove_comment(comments: &mut Vec<Comment>, id: &str) -> bool {
    let before = comments.len();
    comments.retain(|c| c.id != id);
    if comments.len() != before {
        return true;
    }
    comments.iter_mut().any(|c| remove_comment(&mut c.replies, id))
}

fn find_mut<'a>(comments: &'a mut [Comment], id: &str) -> Option<&'a mut Comment> {
    for c in comments.iter_mut() {
        if c.id == id {
            return Some(c);
        }
        if let Some(found) = find_mut(&mut c.replies, id) {
            return Some(found);
        }
    }
    None
}

/// Response shapes accepted from comment mutation endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommentMutation {
    Post(Post),
    Comments(Vec<Comment>),
    Comment(Comment),
}

impl CommentMutation {
    /// Apply the server's answer to the locally held thread
    pub fn apply_to(self, comments: &mut Vec<Comment>) {
        match self {
            CommentMutation::Post(post) => *comments = post.comments,
            CommentMutation::Comments(list) => *comments = list,
            CommentMutation::Comment(comment) => upsert_comment(comments, comment),
        }
    }
}

/// Payload for creating or editing a comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CommentDraft {
    pub author: String,
    pub text: String,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl CommentDraft {
    pub fn validated(&self) -> Result<Self, DraftError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(DraftError::MissingFields(vec!["comment"]));
        }
        let author = self.author.trim();
        Ok(Self {
            author: if author.is_empty() {
                "Anonymous".to_string()
            } else {
                author.to_string()
            },
            text: text.to_string(),
            parent_id: self.parent_id.clone(),
        })
    }
}
