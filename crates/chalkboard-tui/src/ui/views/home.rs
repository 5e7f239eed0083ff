use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use chalkboard_core::models::count_comments;
use chalkboard_core::utils::{format_date, truncate_string};

use crate::app::{App, AppState};
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    render_search_bar(frame, app, rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);

    render_post_list(frame, app, chunks[0]);
    render_preview(frame, app, chunks[1]);
}

fn render_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let searching = app.state == AppState::Searching;

    let line = if app.search_query.is_empty() && !searching {
        Line::from(Span::styled(" Press / to search posts", styles::muted_style()))
    } else {
        let cursor = if searching { "▌" } else { "" };
        Line::from(vec![
            Span::styled(" / ", styles::search_style()),
            Span::styled(format!("{}{}", app.search_query, cursor), styles::list_item_style()),
        ])
    };

    let block = Block::default()
        .title(" Search ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(searching));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_post_list(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([Cell::from("Title"), Cell::from("Author"), Cell::from("Date")])
        .style(styles::title_style())
        .height(1);

    let posts = app.visible_posts();
    let rows: Vec<Row> = posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let style = if i == app.home_selection {
                styles::selected_style()
            } else if app.matches_query(post) {
                styles::highlight_style()
            } else if !post.is_active {
                styles::muted_style()
            } else {
                styles::list_item_style()
            };
            let date = post.created_at.as_deref().map(format_date).unwrap_or_default();

            Row::new(vec![
                Cell::from(post.title.clone()),
                Cell::from(post.author.clone()),
                Cell::from(date),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Fill(1),
        Constraint::Length(16),
        Constraint::Length(14),
    ];

    let title = if app.posts_loading {
        " Posts - loading... ".to_string()
    } else if app.search_query.trim().is_empty() {
        format!(" Posts ({}) ", posts.len())
    } else {
        format!(" Posts ({}) - \"{}\" ", posts.len(), truncate_string(app.search_query.trim(), 20))
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !posts.is_empty() {
        state.select(Some(app.home_selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Preview ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let lines = match app.selected_home_post() {
        Some(post) => {
            let mut lines = vec![
                Line::from(Span::styled(post.title.clone(), styles::title_style())),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Author:    ", styles::muted_style()),
                    Span::raw(post.author.clone()),
                ]),
                Line::from(vec![
                    Span::styled("Read time: ", styles::muted_style()),
                    Span::raw(post.read_time_display()),
                ]),
            ];
            if let Some(ref created) = post.created_at {
                lines.push(Line::from(vec![
                    Span::styled("Published: ", styles::muted_style()),
                    Span::raw(format_date(created)),
                ]));
            }
            lines.push(Line::from(vec![
                Span::styled("Comments:  ", styles::muted_style()),
                Span::raw(count_comments(&post.comments).to_string()),
            ]));
            if !post.is_active {
                lines.push(Line::from(Span::styled("Inactive", styles::error_style())));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(post.description.clone()));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Press Enter to read",
                styles::muted_style(),
            )));
            lines
        }
        None if app.posts_loading => vec![Line::from(Span::styled(
            "Loading posts...",
            styles::muted_style(),
        ))],
        None => vec![Line::from(Span::styled(
            "No posts found",
            styles::muted_style(),
        ))],
    };

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
