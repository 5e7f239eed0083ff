//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Overlays take keys first, then the post form,
//! then the global and per-route bindings.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use chalkboard_core::{Decision, Route};

use crate::app::{
    can_add_password_char, can_add_username_char, App, AppState, FormField, LoginFocus,
    PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key),
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_delete(),
                _ => {}
            }
            return Ok(false);
        }
        AppState::Composing => {
            handle_composer_input(app, key);
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // The form swallows printable keys
    if app.form.is_some()
        && matches!(app.route, Route::Create | Route::Edit(_))
        && app.decision() == Decision::Render
    {
        handle_form_input(app, key);
        return Ok(false);
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        KeyCode::Char('1') => {
            app.navigate(Route::Home);
            return Ok(false);
        }
        KeyCode::Char('2') => {
            app.navigate(Route::Admin);
            return Ok(false);
        }
        KeyCode::Char('l') => {
            if app.session.is_authenticated() {
                app.logout();
            } else if !app.session.is_loading() {
                app.navigate(Route::Login);
            }
            return Ok(false);
        }
        KeyCode::Char('u') => {
            app.navigate(app.route.clone());
            return Ok(false);
        }
        KeyCode::Esc => {
            app.go_back();
            return Ok(false);
        }
        _ => {}
    }

    if app.decision() != Decision::Render {
        return Ok(false);
    }

    match app.route {
        Route::Home => handle_home_input(app, key),
        Route::Post(_) => handle_post_input(app, key),
        Route::Admin => handle_admin_input(app, key),
        Route::Create | Route::Edit(_) | Route::Login => {}
    }
    Ok(false)
}

/// Move a list selection. Returns the new index.
fn move_selection(current: usize, len: usize, key: KeyCode) -> usize {
    let max_index = len.saturating_sub(1);
    match key {
        KeyCode::Up | KeyCode::Char('k') => current.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => (current + 1).min(max_index),
        KeyCode::PageUp => current.saturating_sub(PAGE_SCROLL_SIZE),
        KeyCode::PageDown => (current + PAGE_SCROLL_SIZE).min(max_index),
        KeyCode::Home => 0,
        KeyCode::End => max_index,
        _ => current,
    }
}

fn handle_home_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('/') => {
            app.state = AppState::Searching;
        }
        KeyCode::Enter => {
            if let Some(id) = app.selected_home_post().map(|p| p.id.clone()) {
                app.open_post(&id);
            }
        }
        KeyCode::Char('n') => app.navigate(Route::Create),
        code => {
            let len = app.visible_posts().len();
            app.home_selection = move_selection(app.home_selection, len, code);
        }
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.clear_search();
        }
        KeyCode::Enter => {
            app.state = AppState::Normal;
            // Send now instead of waiting for the debounce
            app.refresh_listing();
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            app.search_changed();
        }
        KeyCode::Char(c) if !c.is_control() => {
            app.search_query.push(c);
            app.search_changed();
        }
        _ => {}
    }
}

fn handle_post_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::PageDown | KeyCode::Char(' ') => {
            app.post_scroll = app.post_scroll.saturating_add(PAGE_SCROLL_SIZE as u16);
        }
        KeyCode::PageUp => {
            app.post_scroll = app.post_scroll.saturating_sub(PAGE_SCROLL_SIZE as u16);
        }
        KeyCode::Home => app.post_scroll = 0,
        KeyCode::Char('c') => app.start_comment(false),
        KeyCode::Char('r') => app.start_comment(true),
        KeyCode::Char('e') => app.start_edit_comment(),
        KeyCode::Char('d') => app.request_delete_comment(),
        code @ (KeyCode::Up | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('k')) => {
            let len = app.thread().len();
            app.comment_selection = move_selection(app.comment_selection, len, code);
        }
        _ => {}
    }
}

fn handle_admin_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('n') => app.navigate(Route::Create),
        KeyCode::Enter => {
            if let Some(id) = app.selected_admin_post().map(|p| p.id.clone()) {
                app.open_post(&id);
            }
        }
        KeyCode::Char('e') => {
            if let Some(id) = app.selected_admin_post().map(|p| p.id.clone()) {
                app.navigate(Route::Edit(id));
            }
        }
        KeyCode::Char('d') => {
            if let Some((id, title)) = app
                .selected_admin_post()
                .map(|p| (p.id.clone(), p.title.clone()))
            {
                app.request_delete_post(&id, &title);
            }
        }
        code => {
            let len = app.posts.len();
            app.admin_selection = move_selection(app.admin_selection, len, code);
        }
    }
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if key.code == KeyCode::Char('s') {
            app.submit_form();
        }
        return;
    }
    if key.code == KeyCode::Esc {
        app.go_back();
        return;
    }

    let Some(form) = app.form.as_mut() else {
        return;
    };
    if form.submitting {
        return;
    }
    let in_content = form.focus == FormField::Content;

    match key.code {
        KeyCode::Tab => form.focus = form.focus.next(),
        KeyCode::BackTab => form.focus = form.focus.prev(),
        KeyCode::Down if !in_content => form.focus = form.focus.next(),
        KeyCode::Up if !in_content => form.focus = form.focus.prev(),
        KeyCode::Enter if in_content => form.insert_newline(),
        KeyCode::Enter => form.focus = form.focus.next(),
        KeyCode::Char(' ') if form.focus == FormField::Active => form.toggle_active(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) => form.insert_char(c),
        _ => {}
    }
}

fn handle_composer_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_comment(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => app.composer_newline(),
        KeyCode::Enter => app.submit_comment(),
        KeyCode::Backspace => app.composer_backspace(),
        KeyCode::Char(c) => app.composer_insert(c),
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            app.cancel_login();
        }
        KeyCode::Down | KeyCode::Tab => {
            // Move to next field
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            // Move to previous field
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => {
                app.login_focus = LoginFocus::Password;
            }
            LoginFocus::Password | LoginFocus::Button => {
                // On failure login_error is set and the overlay stays
                app.attempt_login();
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {
                // Ignore character input on button
            }
        },
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chalkboard_core::auth::MemoryCredentialStore;
    use chalkboard_core::Config;

    fn test_app() -> App {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        App::with_store(config, Arc::new(MemoryCredentialStore::default())).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_move_selection() {
        assert_eq!(move_selection(0, 5, KeyCode::Up), 0);
        assert_eq!(move_selection(0, 5, KeyCode::Down), 1);
        assert_eq!(move_selection(4, 5, KeyCode::Char('j')), 4);
        assert_eq!(move_selection(2, 30, KeyCode::PageDown), 12);
        assert_eq!(move_selection(2, 5, KeyCode::PageDown), 4);
        assert_eq!(move_selection(3, 5, KeyCode::Home), 0);
        assert_eq!(move_selection(0, 5, KeyCode::End), 4);
        assert_eq!(move_selection(0, 0, KeyCode::Down), 0);
    }

    #[tokio::test]
    async fn test_login_through_keyboard() {
        let mut app = test_app();
        app.restore_session();

        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.login_focus, LoginFocus::Username);

        type_str(&mut app, "professor");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "1234");
        assert!(!press(&mut app, KeyCode::Enter));

        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.route, Route::Admin);
        assert!(app.session.is_professor());
    }

    #[tokio::test]
    async fn test_escape_leaves_login_without_quitting() {
        let mut app = test_app();
        app.restore_session();
        press(&mut app, KeyCode::Char('l'));

        assert!(!press(&mut app, KeyCode::Esc));
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.route, Route::Home);
    }

    #[tokio::test]
    async fn test_quit_confirmation() {
        let mut app = test_app();
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!press(&mut app, KeyCode::Char('n')));
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Char('q'));
        assert!(press(&mut app, KeyCode::Char('y')));
    }

    #[tokio::test]
    async fn test_form_captures_printable_keys() {
        let mut app = test_app();
        app.restore_session();
        app.session.login("professor", "1234").unwrap();
        app.navigate(Route::Create);
        assert!(app.form.is_some());

        // 'q' types into the title instead of asking to quit
        type_str(&mut app, "quiz");
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.form.as_ref().unwrap().draft.title, "quiz");

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.form.as_ref().unwrap().focus, FormField::Description);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.route, Route::Admin);
    }

    #[tokio::test]
    async fn test_search_typing_is_debounced() {
        let mut app = test_app();
        app.restore_session();

        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.state, AppState::Searching);
        type_str(&mut app, "rust");
        assert_eq!(app.search_query, "rust");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Normal);
        assert!(app.search_query.is_empty());
    }
}
