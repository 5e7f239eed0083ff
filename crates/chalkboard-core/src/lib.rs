//! Core library for chalkboard.
//!
//! This crate holds everything the terminal front-end needs that is not
//! drawing: the session state machine, the authenticated request pipeline
//! in front of the blog API, the route table and its guard, and the wire
//! models.
//!
//! - `auth`: credential store, demo account table, session manager
//! - `api`: blog client, request pipeline, error taxonomy, sequencer
//! - `routes` / `guard`: route surface and access decisions
//! - `models`: posts, comments and drafts
//! - `config`: persisted application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;
pub mod routes;
pub mod utils;

pub use api::{ApiError, BlogClient, RequestPipeline, SessionEvent};
pub use auth::{AuthState, Role, Session, SessionManager};
pub use config::Config;
pub use guard::{Decision, Requirement};
pub use routes::Route;
