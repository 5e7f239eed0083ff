//! Data models for blog entities.
//!
//! - `Post`, `ReadTime`: posts as returned by the API
//! - `Comment`, `ThreadEntry`: comments and their flattened thread order
//! - `PostDraft`, `CommentDraft`: validated request payloads

pub mod comment;
pub mod post;

pub use comment::{
    count_comments, flatten_thread, remove_comment, upsert_comment, Comment, CommentDraft,
    CommentMutation, ThreadEntry,
};
pub use post::{DraftError, Post, PostDraft, ReadTime};
