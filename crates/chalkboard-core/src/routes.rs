//! The view surface and its access requirements.

use std::fmt;

use crate::guard::Requirement;

/// A navigable view, addressed by a path like `/post/42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Route {
    /// Post list and search
    #[default]
    Home,
    /// Read a post and its comments
    Post(String),
    Create,
    Edit(String),
    /// Professor dashboard
    Admin,
    Login,
}

impl Route {
    /// Parse a path. Trailing slashes are ignored; unknown paths yield None.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path
            .trim()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Some(Route::Home),
            ["post", id] => Some(Route::Post(id.to_string())),
            ["create"] => Some(Route::Create),
            ["edit", id] => Some(Route::Edit(id.to_string())),
            ["admin"] => Some(Route::Admin),
            ["login"] => Some(Route::Login),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Post(id) => format!("/post/{}", id),
            Route::Create => "/create".to_string(),
            Route::Edit(id) => format!("/edit/{}", id),
            Route::Admin => "/admin".to_string(),
            Route::Login => "/login".to_string(),
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Route::Home | Route::Post(_) | Route::Login => Requirement::Public,
            Route::Create | Route::Edit(_) | Route::Admin => Requirement::Professor,
        }
    }

    /// Title shown in the navigation bar
    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Posts",
            Route::Post(_) => "Post",
            Route::Create => "New Post",
            Route::Edit(_) => "Edit Post",
            Route::Admin => "Admin",
            Route::Login => "Login",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}
