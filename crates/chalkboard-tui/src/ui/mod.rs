//! Terminal UI module using ratatui.
//!
//! This module provides the TUI rendering and input handling:
//!
//! - `render`: Main frame rendering, overlays and guard placeholders
//! - `input`: Keyboard event handling
//! - `styles`: Color schemes and text styling
//! - `markdown`: Post body rendering
//! - `views`: Route-specific content (post list, reader, form, admin)

pub mod input;
pub mod markdown;
pub mod render;
pub mod styles;
pub mod views;
