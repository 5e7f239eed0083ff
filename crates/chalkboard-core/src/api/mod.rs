//! REST API client module for the blog service.
//!
//! This module provides the `BlogClient` for fetching and mutating posts
//! and comments, and the `RequestPipeline` every call passes through.
//!
//! The API authenticates with a bearer token taken from the active
//! session. A 401 on any endpoint except search ends the session.

pub mod client;
pub mod error;
pub mod pipeline;
pub mod sequencer;

pub use client::{BlogClient, Listing, REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, ApiResult};
pub use pipeline::{RequestPipeline, SessionEvent};
pub use sequencer::{RequestSequencer, Ticket};
