//! Per-route content rendering.

pub mod admin;
pub mod form;
pub mod home;
pub mod post;
