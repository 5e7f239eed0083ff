//! Application state management for chalkboard.
//!
//! This module contains the core `App` struct that owns the session
//! manager, the blog client, the current route and all view state. It is
//! also the routing layer: it publishes the current route to the request
//! pipeline and is the single receiver of its session events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use chalkboard_core::api::{
    BlogClient, Listing, RequestPipeline, RequestSequencer, SessionEvent, Ticket,
};
use chalkboard_core::auth::{AuthState, CredentialStore, SessionManager};
use chalkboard_core::config::Config;
use chalkboard_core::guard::{self, Decision, Requirement};
use chalkboard_core::models::{
    flatten_thread, Comment, CommentDraft, CommentMutation, Post, PostDraft,
};
use chalkboard_core::utils::contains_ignore_case;
use chalkboard_core::Route;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Buffer size for session events from the request pipeline.
const SESSION_EVENT_BUFFER_SIZE: usize = 8;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for a comment.
const MAX_COMMENT_LENGTH: usize = 2000;

/// Number of rows to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Quiet period after the last keystroke before a search is sent.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// How long a status notice stays on screen.
const STATUS_TTL: Duration = Duration::from_secs(6);

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    LoggingIn,
    Composing,
    ConfirmingDelete,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Field of the post form that has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Author,
    ReadTime,
    Active,
    Content,
}

impl FormField {
    pub fn label(&self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::Author => "Author",
            FormField::ReadTime => "Read time (min)",
            FormField::Active => "Active",
            FormField::Content => "Content (Markdown)",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Author,
            FormField::Author => FormField::ReadTime,
            FormField::ReadTime => FormField::Active,
            FormField::Active => FormField::Content,
            FormField::Content => FormField::Title,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            FormField::Title => FormField::Content,
            FormField::Description => FormField::Title,
            FormField::Author => FormField::Description,
            FormField::ReadTime => FormField::Author,
            FormField::Active => FormField::ReadTime,
            FormField::Content => FormField::Active,
        }
    }
}

/// State of the create/edit form
#[derive(Debug, Clone)]
pub struct PostForm {
    pub draft: PostDraft,
    /// Id of the post being edited, None when creating
    pub editing: Option<String>,
    pub focus: FormField,
    pub error: Option<String>,
    pub loading: bool,
    pub submitting: bool,
}

impl PostForm {
    pub fn create(author: &str) -> Self {
        Self {
            draft: PostDraft::new(author),
            editing: None,
            focus: FormField::Title,
            error: None,
            loading: false,
            submitting: false,
        }
    }

    pub fn edit(id: &str) -> Self {
        Self {
            draft: PostDraft::default(),
            editing: Some(id.to_string()),
            focus: FormField::Title,
            error: None,
            loading: true,
            submitting: false,
        }
    }

    /// Text buffer behind the focused field. None for the active toggle.
    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Title => Some(&mut self.draft.title),
            FormField::Description => Some(&mut self.draft.description),
            FormField::Author => Some(&mut self.draft.author),
            FormField::ReadTime => Some(self.draft.read_time.get_or_insert_with(String::new)),
            FormField::Active => None,
            FormField::Content => Some(&mut self.draft.content),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        if self.focus == FormField::ReadTime && !c.is_ascii_digit() {
            return;
        }
        if c.is_control() {
            return;
        }
        if let Some(text) = self.text_mut() {
            text.push(c);
        }
    }

    /// Newlines are only allowed in the content field
    pub fn insert_newline(&mut self) {
        if self.focus == FormField::Content {
            self.draft.content.push('\n');
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = self.text_mut() {
            text.pop();
        }
    }

    pub fn toggle_active(&mut self) {
        self.draft.is_active = !self.draft.is_active;
    }

    pub fn value(&self, field: FormField) -> String {
        match field {
            FormField::Title => self.draft.title.clone(),
            FormField::Description => self.draft.description.clone(),
            FormField::Author => self.draft.author.clone(),
            FormField::ReadTime => self.draft.read_time.clone().unwrap_or_default(),
            FormField::Active => {
                let mark = if self.draft.is_active { "[x]" } else { "[ ]" };
                mark.to_string()
            }
            FormField::Content => self.draft.content.clone(),
        }
    }
}

/// A comment being written, replied or edited
#[derive(Debug, Clone, Default)]
pub struct Composer {
    pub text: String,
    pub parent_id: Option<String>,
    /// Id of the comment being edited
    pub editing: Option<String>,
    pub submitting: bool,
}

impl Composer {
    pub fn title(&self) -> &'static str {
        if self.editing.is_some() {
            " Edit comment "
        } else if self.parent_id.is_some() {
            " Reply "
        } else {
            " New comment "
        }
    }
}

/// What a delete confirmation will remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDelete {
    Post { id: String, title: String },
    Comment { post_id: String, comment_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    shown_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Add,
    Edit,
    Delete,
}

impl CommentAction {
    fn verb(&self) -> &'static str {
        match self {
            CommentAction::Add => "add",
            CommentAction::Edit => "update",
            CommentAction::Delete => "delete",
        }
    }

    fn done(&self) -> &'static str {
        match self {
            CommentAction::Add => "Comment added",
            CommentAction::Edit => "Comment updated",
            CommentAction::Delete => "Comment deleted",
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from spawned API tasks back to the main loop.
enum FetchResult {
    /// Home/admin listing for a sequenced request
    Listing(Ticket, Result<Listing, String>),
    /// Post opened for reading (post_id, result)
    Post(String, Result<Post, String>),
    /// Post loaded into the edit form (post_id, result)
    FormPost(String, Result<Post, String>),
    PostSaved {
        created: bool,
        result: Result<Post, String>,
    },
    /// Post deleted (post_id on success)
    PostDeleted(Result<String, String>),
    Comments {
        post_id: String,
        action: CommentAction,
        result: Result<Option<CommentMutation>, String>,
    },
}

/// Full error chain on one line
fn describe(e: &anyhow::Error) -> String {
    format!("{:#}", e)
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub api: BlogClient,
    persist_config: bool,

    // Routing
    pub route: Route,
    route_tx: watch::Sender<Route>,
    session_events: mpsc::Receiver<SessionEvent>,
    auth_rx: watch::Receiver<AuthState>,
    /// Where to go after a login that interrupted navigation
    login_return: Option<Route>,

    // UI State
    pub state: AppState,
    pub status: Option<StatusMessage>,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Listing (home and admin)
    pub posts: Vec<Post>,
    pub posts_loading: bool,
    pub search_query: String,
    search_edited_at: Option<Instant>,
    sequencer: Arc<RequestSequencer>,
    pub home_selection: usize,
    pub admin_selection: usize,

    // Reading a post
    pub current_post: Option<Post>,
    pub post_loading: bool,
    pub post_error: Option<String>,
    pub post_scroll: u16,
    pub comment_selection: usize,
    pub composer: Option<Composer>,

    // Create/edit
    pub form: Option<PostForm>,

    pub pending_delete: Option<PendingDelete>,

    // Background task channel
    fetch_rx: mpsc::Receiver<FetchResult>,
    fetch_tx: mpsc::Sender<FetchResult>,
}

impl App {
    /// Create the application using the configured credential store
    pub fn new(config: Config) -> Result<Self> {
        let store = config.credential_store()?;
        let mut app = Self::with_store(config, store)?;
        app.persist_config = true;
        Ok(app)
    }

    /// Create the application over an explicit credential store. The config
    /// is never written back.
    pub fn with_store(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        debug!(api = %config.api_base_url, backend = ?config.session_backend, "Creating app");

        let session = Arc::new(SessionManager::new(store));
        let (route_tx, route_rx) = watch::channel(Route::Home);
        let (events_tx, session_events) = mpsc::channel(SESSION_EVENT_BUFFER_SIZE);
        let pipeline = Arc::new(RequestPipeline::new(session.clone(), route_rx, events_tx));
        let api = BlogClient::with_timeout(&config.api_base_url, pipeline, config.request_timeout())?;
        let auth_rx = session.subscribe();

        let (fetch_tx, fetch_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_username = config.last_username.clone().unwrap_or_default();

        Ok(Self {
            config,
            session,
            api,
            persist_config: false,

            route: Route::Home,
            route_tx,
            session_events,
            auth_rx,
            login_return: None,

            state: AppState::Normal,
            status: None,

            login_username,
            login_password: String::new(),
            login_focus: LoginFocus::Username,
            login_error: None,

            posts: Vec::new(),
            posts_loading: false,
            search_query: String::new(),
            search_edited_at: None,
            sequencer: Arc::new(RequestSequencer::new()),
            home_selection: 0,
            admin_selection: 0,

            current_post: None,
            post_loading: false,
            post_error: None,
            post_scroll: 0,
            comment_selection: 0,
            composer: None,

            form: None,
            pending_delete: None,

            fetch_rx,
            fetch_tx,
        })
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn auth_state(&self) -> AuthState {
        self.session.state()
    }

    /// Guard decision for the current route
    pub fn decision(&self) -> Decision {
        guard::check(self.auth_state(), self.route.requirement())
    }

    /// Name for the navigation bar greeting
    pub fn display_name(&self) -> Option<String> {
        self.session.current_session().map(|s| s.display_name)
    }

    /// Read the stored session and settle the route the user started on
    pub fn restore_session(&mut self) {
        let state = self.session.restore();
        self.mark_auth_seen();
        info!(?state, "Session restore finished");
        if self.route != Route::Login {
            self.navigate(self.route.clone());
        } else if self.state != AppState::LoggingIn {
            self.enter_route();
        }
    }

    fn mark_auth_seen(&mut self) {
        self.auth_rx.borrow_and_update();
    }

    /// Show the login overlay
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Leave the login view without logging in
    pub fn cancel_login(&mut self) {
        self.login_password.clear();
        self.login_error = None;
        self.state = AppState::Normal;
        self.login_return = None;
        self.navigate(Route::Home);
    }

    /// Attempt login with the credentials from the login form.
    /// Returns true on success.
    pub fn attempt_login(&mut self) -> bool {
        if self.login_username.trim().is_empty() || self.login_password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return false;
        }

        let result = self.session.login(&self.login_username, &self.login_password);
        self.login_password.clear();

        match result {
            Ok(session) => {
                self.mark_auth_seen();
                self.login_error = None;
                self.state = AppState::Normal;

                self.login_username = session.username.clone();
                self.config.last_username = Some(session.username.clone());
                if self.persist_config {
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                }

                self.set_status(
                    format!("Welcome, {}!", session.display_name),
                    StatusKind::Success,
                );

                let landing = self
                    .login_return
                    .take()
                    .filter(|r| {
                        *r != Route::Login
                            && guard::check(self.session.state(), r.requirement()) == Decision::Render
                    })
                    .unwrap_or_else(|| self.landing_route());
                self.navigate(landing);
                true
            }
            Err(e) => {
                self.login_error = Some(e.to_string());
                false
            }
        }
    }

    /// Professors land on the dashboard, everyone else on the post list
    fn landing_route(&self) -> Route {
        if self.session.is_professor() {
            Route::Admin
        } else {
            Route::Home
        }
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.mark_auth_seen();
        self.composer = None;
        self.set_status("Logged out", StatusKind::Success);
        self.navigate(Route::Home);
    }

    /// Open the login view, coming back to `return_to` afterwards
    fn redirect_to_login(&mut self, return_to: Option<Route>) {
        self.login_return = return_to;
        self.composer = None;
        self.pending_delete = None;
        self.set_route(Route::Login);
        self.start_login();
    }

    /// Handle events from the request pipeline
    fn process_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Invalidated { url } => {
                warn!(path = %url, "Session rejected by API");
                self.mark_auth_seen();
                self.set_status("Session expired. Please log in again.", StatusKind::Error);
                if self.route != Route::Login {
                    let from = self.route.clone();
                    self.redirect_to_login(Some(from));
                }
            }
        }
    }

    /// React to auth transitions not initiated by this struct
    fn process_auth_change(&mut self, state: AuthState) {
        debug!(?state, "Auth state changed");
        if state != AuthState::Loading && self.route != Route::Login {
            self.navigate(self.route.clone());
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn set_route(&mut self, route: Route) {
        self.route = route.clone();
        self.route_tx.send_replace(route);
    }

    /// Go to `route`, applying the guard
    pub fn navigate(&mut self, route: Route) {
        debug!(path = %route, "Navigating");
        if self.state == AppState::Searching || self.state == AppState::Composing {
            self.state = AppState::Normal;
        }
        self.set_route(route.clone());

        match guard::check(self.session.state(), route.requirement()) {
            // Requests sent now would go out without the stored token
            Decision::Render if self.session.is_loading() => {
                debug!(path = %route, "Deferring load until session restore");
                if matches!(route, Route::Home | Route::Admin) {
                    self.posts_loading = true;
                }
            }
            Decision::Render => self.enter_route(),
            Decision::RedirectToLogin => {
                info!(path = %route, "Login required");
                self.redirect_to_login(Some(route));
            }
            // Rendered as placeholder or notice
            Decision::Waiting | Decision::AccessDenied => {}
        }
    }

    /// Load whatever the current route shows
    fn enter_route(&mut self) {
        match self.route.clone() {
            Route::Home | Route::Admin => self.refresh_listing(),
            Route::Post(id) => {
                self.composer = None;
                self.load_post(&id);
            }
            Route::Create => {
                let author = self.display_name().unwrap_or_default();
                self.form = Some(PostForm::create(&author));
            }
            Route::Edit(id) => self.load_form_post(&id),
            Route::Login => self.start_login(),
        }
    }

    /// Back out of the current view
    pub fn go_back(&mut self) {
        match self.route {
            Route::Create | Route::Edit(_) => self.navigate(Route::Admin),
            Route::Home => {}
            _ => self.navigate(Route::Home),
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn set_status(&mut self, text: impl Into<String>, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
            shown_at: Instant::now(),
        });
    }

    fn expire_status(&mut self, now: Instant) {
        if let Some(ref status) = self.status {
            if now.duration_since(status.shown_at) >= STATUS_TTL {
                self.status = None;
            }
        }
    }

    // =========================================================================
    // Listing and Search
    // =========================================================================

    /// Fetch the listing for the current search query
    pub fn refresh_listing(&mut self) {
        let ticket = self.sequencer.issue();
        self.posts_loading = true;
        self.search_edited_at = None;

        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        let query = self.search_query.clone();
        debug!(?ticket, query = %query, "Loading listing");

        tokio::spawn(async move {
            let result = api.load_listing(&query).await.map_err(|e| describe(&e));
            Self::send_result(&tx, FetchResult::Listing(ticket, result)).await;
        });
    }

    /// Record a search edit; the request goes out once typing pauses
    pub fn search_changed(&mut self) {
        self.search_edited_at = Some(Instant::now());
        self.home_selection = 0;
    }

    pub fn clear_search(&mut self) {
        if !self.search_query.is_empty() {
            self.search_query.clear();
            self.search_changed();
        }
    }

    fn poll_search_debounce(&mut self, now: Instant) {
        if let Some(at) = self.search_edited_at {
            if now.duration_since(at) >= SEARCH_DEBOUNCE {
                self.refresh_listing();
            }
        }
    }

    /// Posts shown on the home view. Inactive posts are only listed for
    /// professors.
    pub fn visible_posts(&self) -> Vec<&Post> {
        let professor = self.session.is_professor();
        self.posts
            .iter()
            .filter(|p| professor || p.is_active)
            .collect()
    }

    /// Whether a post matches the current query locally, for highlighting
    pub fn matches_query(&self, post: &Post) -> bool {
        let q = self.search_query.trim();
        !q.is_empty() && (contains_ignore_case(&post.title, q) || contains_ignore_case(&post.description, q))
    }

    pub fn selected_home_post(&self) -> Option<&Post> {
        self.visible_posts().get(self.home_selection).copied()
    }

    pub fn selected_admin_post(&self) -> Option<&Post> {
        self.posts.get(self.admin_selection)
    }

    fn clamp_selections(&mut self) {
        let visible = self.visible_posts().len();
        self.home_selection = self.home_selection.min(visible.saturating_sub(1));
        self.admin_selection = self.admin_selection.min(self.posts.len().saturating_sub(1));
    }

    pub fn open_post(&mut self, id: &str) {
        self.navigate(Route::Post(id.to_string()));
    }

    // =========================================================================
    // Reading
    // =========================================================================

    fn load_post(&mut self, id: &str) {
        if self.current_post.as_ref().map(|p| p.id.as_str()) != Some(id) {
            self.current_post = None;
            self.post_scroll = 0;
            self.comment_selection = 0;
        }
        self.post_loading = true;
        self.post_error = None;

        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = api.get_post(&id).await.map_err(|e| describe(&e));
            Self::send_result(&tx, FetchResult::Post(id, result)).await;
        });
    }

    /// Comments of the open post in display order
    pub fn thread(&self) -> Vec<(usize, &Comment)> {
        match self.current_post {
            Some(ref post) => flatten_thread(&post.comments)
                .into_iter()
                .map(|e| (e.depth, e.comment))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn selected_comment(&self) -> Option<&Comment> {
        self.thread().get(self.comment_selection).map(|(_, c)| *c)
    }

    /// Professors moderate every comment; others only their own
    pub fn can_modify_comment(&self, comment: &Comment) -> bool {
        match self.session.current_session() {
            Some(session) => {
                self.session.is_professor() || session.display_name == comment.author
            }
            None => false,
        }
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Comment mutations need a session; redirect to login otherwise
    fn require_authenticated(&mut self, what: &str) -> bool {
        match guard::check(self.session.state(), Requirement::Authenticated) {
            Decision::Render => true,
            Decision::RedirectToLogin => {
                self.set_status(format!("Log in to {}", what), StatusKind::Info);
                let from = self.route.clone();
                self.redirect_to_login(Some(from));
                false
            }
            Decision::Waiting | Decision::AccessDenied => false,
        }
    }

    pub fn start_comment(&mut self, reply: bool) {
        if self.current_post.is_none() || !self.require_authenticated("comment") {
            return;
        }
        let parent_id = if reply {
            match self.selected_comment() {
                Some(c) => Some(c.id.clone()),
                None => return,
            }
        } else {
            None
        };
        self.composer = Some(Composer {
            parent_id,
            ..Composer::default()
        });
        self.state = AppState::Composing;
    }

    pub fn start_edit_comment(&mut self) {
        if !self.require_authenticated("edit comments") {
            return;
        }
        let Some(comment) = self.selected_comment().cloned() else {
            return;
        };
        if !self.can_modify_comment(&comment) {
            self.set_status("You can only edit your own comments", StatusKind::Error);
            return;
        }
        self.composer = Some(Composer {
            text: comment.text,
            parent_id: comment.parent_id,
            editing: Some(comment.id),
            submitting: false,
        });
        self.state = AppState::Composing;
    }

    pub fn cancel_comment(&mut self) {
        self.composer = None;
        self.state = AppState::Normal;
    }

    pub fn composer_insert(&mut self, c: char) {
        if let Some(ref mut composer) = self.composer {
            if !composer.submitting && can_add_comment_char(composer.text.chars().count(), c) {
                composer.text.push(c);
            }
        }
    }

    pub fn composer_newline(&mut self) {
        if let Some(ref mut composer) = self.composer {
            if composer.text.chars().count() < MAX_COMMENT_LENGTH {
                composer.text.push('\n');
            }
        }
    }

    pub fn composer_backspace(&mut self) {
        if let Some(ref mut composer) = self.composer {
            composer.text.pop();
        }
    }

    pub fn submit_comment(&mut self) {
        let Some(post_id) = self.current_post.as_ref().map(|p| p.id.clone()) else {
            return;
        };
        let author = self.display_name().unwrap_or_default();
        let Some(composer) = self.composer.as_mut() else {
            return;
        };
        if composer.submitting {
            return;
        }

        let draft = CommentDraft {
            author,
            text: composer.text.clone(),
            parent_id: composer.parent_id.clone(),
        };
        let draft = match draft.validated() {
            Ok(d) => d,
            Err(e) => {
                self.set_status(e.to_string(), StatusKind::Error);
                return;
            }
        };
        composer.submitting = true;
        let editing = composer.editing.clone();

        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let (action, result) = match editing {
                Some(comment_id) => (
                    CommentAction::Edit,
                    api.update_comment(&post_id, &comment_id, &draft).await,
                ),
                None => (CommentAction::Add, api.add_comment(&post_id, &draft).await),
            };
            let result = result.map_err(|e| describe(&e));
            Self::send_result(&tx, FetchResult::Comments { post_id, action, result }).await;
        });
    }

    pub fn request_delete_comment(&mut self) {
        if !self.require_authenticated("delete comments") {
            return;
        }
        let Some(post_id) = self.current_post.as_ref().map(|p| p.id.clone()) else {
            return;
        };
        let Some(comment) = self.selected_comment().cloned() else {
            return;
        };
        if !self.can_modify_comment(&comment) {
            self.set_status("You can only delete your own comments", StatusKind::Error);
            return;
        }
        self.pending_delete = Some(PendingDelete::Comment {
            post_id,
            comment_id: comment.id,
        });
        self.state = AppState::ConfirmingDelete;
    }

    // =========================================================================
    // Create / Edit / Delete Posts
    // =========================================================================

    fn load_form_post(&mut self, id: &str) {
        self.form = Some(PostForm::edit(id));
        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = api.get_post(&id).await.map_err(|e| describe(&e));
            Self::send_result(&tx, FetchResult::FormPost(id, result)).await;
        });
    }

    /// Validate and send the form. Invalid drafts never reach the network.
    pub fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        if form.loading || form.submitting {
            return;
        }

        let draft = match form.draft.validated() {
            Ok(d) => d,
            Err(e) => {
                let msg = e.to_string();
                form.error = Some(msg.clone());
                self.set_status(msg, StatusKind::Error);
                return;
            }
        };
        form.error = None;
        form.submitting = true;
        let editing = form.editing.clone();

        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        let now = Utc::now();
        tokio::spawn(async move {
            let (created, result) = match editing {
                Some(id) => (false, api.update_post(&id, &draft.stamped_updated(now)).await),
                None => (true, api.create_post(&draft.stamped_created(now)).await),
            };
            let result = result.map_err(|e| describe(&e));
            Self::send_result(&tx, FetchResult::PostSaved { created, result }).await;
        });
    }

    pub fn request_delete_post(&mut self, id: &str, title: &str) {
        if guard::check(self.session.state(), Requirement::Professor) != Decision::Render {
            self.set_status("Only professors can delete posts", StatusKind::Error);
            return;
        }
        self.pending_delete = Some(PendingDelete::Post {
            id: id.to_string(),
            title: title.to_string(),
        });
        self.state = AppState::ConfirmingDelete;
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.state = AppState::Normal;
    }

    pub fn confirm_delete(&mut self) {
        self.state = AppState::Normal;
        let Some(pending) = self.pending_delete.take() else {
            return;
        };

        let api = self.api.clone();
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let message = match pending {
                PendingDelete::Post { id, .. } => {
                    let result = api.delete_post(&id).await.map(|_| id).map_err(|e| describe(&e));
                    FetchResult::PostDeleted(result)
                }
                PendingDelete::Comment {
                    post_id,
                    comment_id,
                } => {
                    let result = api
                        .delete_comment(&post_id, &comment_id)
                        .await
                        .map_err(|e| describe(&e));
                    FetchResult::Comments {
                        post_id,
                        action: CommentAction::Delete,
                        result,
                    }
                }
            };
            Self::send_result(&tx, message).await;
        });
    }

    // =========================================================================
    // Background Results
    // =========================================================================

    /// Helper to send results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<FetchResult>, result: FetchResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send fetch result - channel closed");
        }
    }

    /// Drain background results, session events and timers
    pub fn check_background_tasks(&mut self) {
        let now = Instant::now();

        let mut results = Vec::new();
        while let Ok(result) = self.fetch_rx.try_recv() {
            results.push(result);
        }
        for result in results {
            self.process_fetch_result(result);
        }

        let mut events = Vec::new();
        while let Ok(event) = self.session_events.try_recv() {
            events.push(event);
        }
        for event in events {
            self.process_session_event(event);
        }

        if self.auth_rx.has_changed().unwrap_or(false) {
            let state = *self.auth_rx.borrow_and_update();
            self.process_auth_change(state);
        }

        self.poll_search_debounce(now);
        self.expire_status(now);
    }

    fn process_fetch_result(&mut self, result: FetchResult) {
        match result {
            FetchResult::Listing(ticket, result) => {
                if !self.sequencer.accept(ticket) {
                    debug!(?ticket, "Discarding superseded listing");
                    return;
                }
                if self.sequencer.is_latest(ticket) {
                    self.posts_loading = false;
                }
                match result {
                    Ok(listing) => {
                        if listing.fell_back {
                            self.set_status(
                                "Search unavailable, showing all posts",
                                StatusKind::Info,
                            );
                        }
                        self.posts = listing.posts;
                        self.clamp_selections();
                    }
                    Err(e) => {
                        warn!(error = %e, "Listing failed");
                        self.set_status(format!("Failed to load posts: {}", e), StatusKind::Error);
                    }
                }
            }
            FetchResult::Post(id, result) => {
                if self.route != Route::Post(id.clone()) {
                    return;
                }
                self.post_loading = false;
                match result {
                    Ok(post) => {
                        self.current_post = Some(post);
                        let count = self.thread().len();
                        self.comment_selection = self.comment_selection.min(count.saturating_sub(1));
                    }
                    Err(e) => {
                        warn!(error = %e, post_id = %id, "Failed to load post");
                        self.post_error = Some(e.clone());
                        self.set_status(e, StatusKind::Error);
                    }
                }
            }
            FetchResult::FormPost(id, result) => {
                let Some(form) = self.form.as_mut() else {
                    return;
                };
                if form.editing.as_deref() != Some(id.as_str()) {
                    return;
                }
                form.loading = false;
                match result {
                    Ok(post) => form.draft = PostDraft::from_post(&post),
                    Err(e) => {
                        form.error = Some(e.clone());
                        self.set_status(e, StatusKind::Error);
                    }
                }
            }
            FetchResult::PostSaved { created, result } => {
                if let Some(form) = self.form.as_mut() {
                    form.submitting = false;
                }
                match result {
                    Ok(post) => {
                        info!(id = %post.id, created, "Post saved");
                        let msg = if created { "Post created" } else { "Post updated" };
                        self.set_status(msg, StatusKind::Success);
                        self.form = None;
                        if matches!(self.route, Route::Create | Route::Edit(_)) {
                            self.navigate(Route::Admin);
                        }
                    }
                    Err(e) => {
                        let verb = if created { "create" } else { "update" };
                        if let Some(form) = self.form.as_mut() {
                            form.error = Some(e.clone());
                        }
                        self.set_status(format!("Failed to {} post: {}", verb, e), StatusKind::Error);
                    }
                }
            }
            FetchResult::PostDeleted(result) => match result {
                Ok(id) => {
                    self.posts.retain(|p| p.id != id);
                    self.clamp_selections();
                    self.set_status("Post deleted", StatusKind::Success);
                    if self.route == Route::Post(id) {
                        self.navigate(Route::Home);
                    }
                }
                Err(e) => {
                    self.set_status(format!("Failed to delete post: {}", e), StatusKind::Error);
                }
            },
            FetchResult::Comments {
                post_id,
                action,
                result,
            } => {
                if let Some(ref mut composer) = self.composer {
                    composer.submitting = false;
                }
                match result {
                    Ok(mutation) => {
                        if action != CommentAction::Delete {
                            self.composer = None;
                            if self.state == AppState::Composing {
                                self.state = AppState::Normal;
                            }
                        }
                        self.set_status(action.done(), StatusKind::Success);
                        self.apply_comment_mutation(&post_id, mutation);
                    }
                    Err(e) => {
                        self.set_status(
                            format!("Failed to {} comment: {}", action.verb(), e),
                            StatusKind::Error,
                        );
                    }
                }
            }
        }
    }

    fn apply_comment_mutation(&mut self, post_id: &str, mutation: Option<CommentMutation>) {
        let Some(post) = self.current_post.as_mut().filter(|p| p.id == post_id) else {
            return;
        };
        match mutation {
            Some(mutation) => {
                mutation.apply_to(&mut post.comments);
                let count = self.thread().len();
                self.comment_selection = self.comment_selection.min(count.saturating_sub(1));
            }
            None => {
                // No body in the response; reload the thread
                let id = post_id.to_string();
                self.load_post(&id);
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a comment character should be accepted
pub fn can_add_comment_char(current_len: usize, c: char) -> bool {
    current_len < MAX_COMMENT_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
