//! Authenticated request pipeline.
//!
//! Every outgoing call passes through `before_request`, and every failed
//! call through `on_response`. The pipeline attaches the bearer token and
//! reacts to 401s, but it never navigates: it reports an invalidated
//! session over a channel owned by the routing layer.

use std::sync::Arc;

use reqwest::{header, RequestBuilder, Url};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::error::ApiError;
use crate::auth::SessionManager;
use crate::routes::Route;

/// Path segment identifying search endpoints
const SEARCH_SEGMENT: &str = "search";

/// Notifications from the pipeline to the routing layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The API rejected the session token; the session has been cleared
    Invalidated { url: String },
}

/// What to do with a 401
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedAction {
    /// Search endpoints fail softly; the session stays
    KeepSession,
    /// Already on the login view; nothing to redirect
    AlreadyAtLogin,
    Invalidate,
}

pub fn is_search_request(url: &Url) -> bool {
    url.path_segments()
        .is_some_and(|mut segments| segments.any(|s| s == SEARCH_SEGMENT))
}

/// Decide how a 401 from `url` is handled while the user is on `route`
pub fn classify_unauthorized(url: &Url, route: &Route) -> UnauthorizedAction {
    if *route == Route::Login {
        UnauthorizedAction::AlreadyAtLogin
    } else if is_search_request(url) {
        UnauthorizedAction::KeepSession
    } else {
        UnauthorizedAction::Invalidate
    }
}

pub struct RequestPipeline {
    session: Arc<SessionManager>,
    route: watch::Receiver<Route>,
    events: mpsc::Sender<SessionEvent>,
}

impl RequestPipeline {
    pub fn new(
        session: Arc<SessionManager>,
        route: watch::Receiver<Route>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            route,
            events,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Decorate a request with JSON content type and, when logged in, the
    /// bearer token.
    pub fn before_request(&self, request: RequestBuilder) -> RequestBuilder {
        self.authorize(request).0
    }

    /// Like `before_request`, also handing back the token that was attached
    /// so a rejection can be matched to the session that caused it.
    pub fn authorize(&self, request: RequestBuilder) -> (RequestBuilder, Option<String>) {
        let request = request.header(header::CONTENT_TYPE, "application/json");
        match self.session.current_token() {
            Some(token) => (request.bearer_auth(&token), Some(token)),
            None => (request, None),
        }
    }

    /// Pass results through, reacting to authentication failures.
    ///
    /// `sent_token` is what `authorize` attached to the request. The error
    /// is always handed back to the caller so it can fall back locally.
    pub fn on_response<T>(
        &self,
        url: &Url,
        sent_token: Option<&str>,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        if let Err(ApiError::Unauthorized) = &result {
            self.handle_unauthorized(url, sent_token);
        }
        result
    }

    fn handle_unauthorized(&self, url: &Url, sent_token: Option<&str>) {
        let route = self.route.borrow().clone();
        match classify_unauthorized(url, &route) {
            UnauthorizedAction::KeepSession => {
                debug!(path = url.path(), "Search rejected, keeping session");
            }
            UnauthorizedAction::AlreadyAtLogin => {
                debug!(path = url.path(), "Unauthorized while on login view");
            }
            UnauthorizedAction::Invalidate => {
                if !self.session.invalidate_token(sent_token) {
                    debug!(path = url.path(), "Rejection does not concern the current session");
                    return;
                }
                let event = SessionEvent::Invalidated {
                    url: url.path().to_string(),
                };
                if let Err(e) = self.events.try_send(event) {
                    warn!(error = %e, "Failed to deliver session event");
                }
            }
        }
    }
}
