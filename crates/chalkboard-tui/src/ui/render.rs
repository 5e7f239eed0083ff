use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use chalkboard_core::{Decision, Route};

use crate::app::{App, AppState, LoginFocus, PendingDelete};

use super::styles;
use super::views::{admin, form, home, post};

const LOGO: [&str; 3] = [
    "   ╔═╗╦ ╦╔═╗╦  ╦╔═╔╗ ╔═╗╔═╗╦═╗╔╦╗",
    "   ║  ╠═╣╠═╣║  ╠╩╗╠╩╗║ ║╠═╣╠╦╝ ║║",
    "   ╚═╝╩ ╩╩ ╩╩═╝╩ ╩╚═╝╚═╝╩ ╩╩╚══╩╝",
];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Navigation
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_nav(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::ConfirmingDelete => render_delete_overlay(frame, app),
        AppState::Composing => render_composer_overlay(frame, app),
        AppState::Normal | AppState::Searching | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Chalkboard";
    let greeting = match app.display_name() {
        Some(name) => format!("Hello, {}  [l] Logout", name),
        None if app.session.is_loading() => String::new(),
        None => "[l] Login".to_string(),
    };
    let help_hint = "  [?] Help";

    let used = title.chars().count() + greeting.chars().count() + help_hint.chars().count() + 2;
    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(greeting, styles::highlight_style()),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_nav(frame: &mut Frame, app: &App, area: Rect) {
    let mut tabs = vec![("[1] Posts", app.route == Route::Home)];
    if app.session.is_professor() {
        tabs.push(("[2] Admin", app.route == Route::Admin));
        tabs.push((
            "[n] New Post",
            matches!(app.route, Route::Create | Route::Edit(_)),
        ));
    }

    let mut spans = vec![Span::raw(" ")];
    for (i, (label, selected)) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        if *selected {
            spans.push(Span::styled(*label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(*label, styles::muted_style()));
        }
    }

    // Current path on the right
    let path = app.route.path();
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let padding = (area.width as usize).saturating_sub(used + path.len() + 2);
    spans.push(Span::raw(" ".repeat(padding)));
    spans.push(Span::styled(path, styles::muted_style()));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.decision() {
        Decision::Render => {}
        Decision::Waiting => {
            render_notice(frame, area, "Checking session...", styles::muted_style());
            return;
        }
        Decision::AccessDenied => {
            render_notice(
                frame,
                area,
                "Access denied. Only professors can open this page.",
                styles::error_style(),
            );
            return;
        }
        Decision::RedirectToLogin => {
            render_notice(frame, area, "Log in to continue.", styles::muted_style());
            return;
        }
    }

    match app.route {
        Route::Home => home::render(frame, app, area),
        Route::Post(_) => post::render(frame, app, area),
        Route::Create | Route::Edit(_) => form::render(frame, app, area),
        Route::Admin => admin::render(frame, app, area),
        Route::Login => render_notice(frame, area, "Log in to continue.", styles::muted_style()),
    }
}

fn render_notice(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", text), style)),
        Line::from(""),
        Line::from(Span::styled("  [1] Back to posts", styles::muted_style())),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn shortcuts(app: &App) -> &'static str {
    match app.route {
        Route::Home => "[/]search [Enter]open [u]pdate [q]uit",
        Route::Post(_) => "[PgUp/PgDn]scroll [Esc]back [u]pdate [q]uit",
        Route::Create | Route::Edit(_) => "[Ctrl+S]save [Esc]cancel",
        Route::Admin => "[n]ew [e]dit [d]elete [u]pdate [q]uit",
        Route::Login => "[Esc]cancel",
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (left_text, left_style) = match app.status {
        Some(ref status) => (format!(" {} ", status.text), styles::status_style(status.kind)),
        None => (format!(" {} ", app.route.title()), styles::muted_style()),
    };
    let right_text = format!(" {} ", shortcuts(app));

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn logo_lines() -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|l| Line::from(Span::styled(*l, styles::title_style())))
        .collect()
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 30, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let mut help_text = logo_lines();
    help_text.extend([
        Line::from(Span::styled(
            format!("              version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1 / 2", "Posts / Admin"),
        help_line("↑/↓", "Navigate list"),
        help_line("Enter", "Open post"),
        help_line("Esc", "Go back"),
        help_line("/", "Search posts"),
        help_line("u", "Reload current view"),
        Line::from(""),
        Line::from(Span::styled(" Reading", styles::highlight_style())),
        help_line("PgUp/PgDn", "Scroll post"),
        help_line("c / r", "Comment / reply"),
        help_line("e / d", "Edit / delete comment"),
        Line::from(""),
        Line::from(Span::styled(" Professors", styles::highlight_style())),
        help_line("n", "New post"),
        help_line("e / d", "Edit / delete post (admin)"),
        help_line("Ctrl+S", "Save form"),
        Line::from(""),
        help_line("l", "Login / logout"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 14 } else { 12 };
    let area = centered_rect_fixed(46, height, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));

    let username_focused = app.login_focus == LoginFocus::Username;
    let username_style = if username_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let username_display = format!("{:<16}", app.login_username);
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(format!("{}{}", username_display, cursor), username_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked: String = "*".repeat(app.login_password.chars().count().min(16));
    let password_display = format!("{:<16}", password_masked);
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{}{}", password_display, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(Line::from(""));
    let label = if button_focused { " ▶ Login ◀ " } else { "   Login   " };
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_confirm_overlay(frame: &mut Frame, question: String, action: &'static str) {
    let area = centered_rect_fixed(46, 10, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(format!(" to {}, ", action), styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    render_confirm_overlay(frame, "Are you sure you want to quit?".to_string(), "quit");
}

fn render_delete_overlay(frame: &mut Frame, app: &App) {
    let question = match app.pending_delete {
        Some(PendingDelete::Post { ref title, .. }) => {
            format!("Delete \"{}\"?", chalkboard_core::utils::truncate_string(title, 26))
        }
        Some(PendingDelete::Comment { .. }) => "Delete this comment?".to_string(),
        None => return,
    };
    render_confirm_overlay(frame, question, "delete");
}

fn render_composer_overlay(frame: &mut Frame, app: &App) {
    let Some(ref composer) = app.composer else {
        return;
    };
    let area = centered_rect_fixed(64, 12, frame.area());

    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = composer
        .text
        .split('\n')
        .map(|l| Line::from(l.to_string()))
        .collect();
    if let Some(last) = lines.last_mut() {
        last.spans.push(Span::styled("▌", styles::highlight_style()));
    }

    let footer = if composer.submitting {
        " Sending... "
    } else {
        " [Enter] send  [Alt+Enter] newline  [Esc] cancel "
    };

    let block = Block::default()
        .title(composer.title())
        .title_style(styles::title_style())
        .title_bottom(Line::from(Span::styled(footer, styles::muted_style())))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(styles::list_item_style())
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
