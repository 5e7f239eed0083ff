use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use chalkboard_core::utils::format_date;

use crate::app::App;
use crate::ui::{markdown, styles};

/// Indentation per reply level
const REPLY_INDENT: usize = 2;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_body(frame, app, chunks[0]);
    render_comments(frame, app, chunks[1]);
}

fn render_body(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let post = match app.current_post {
        Some(ref post) => post,
        None => {
            let (text, style) = match app.post_error {
                Some(ref e) => (format!("Could not load post: {}", e), styles::error_style()),
                None => ("Loading post...".to_string(), styles::muted_style()),
            };
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(text, style))).block(block),
                area,
            );
            return;
        }
    };

    let mut meta = vec![
        Span::styled("By ", styles::muted_style()),
        Span::styled(post.author.clone(), styles::highlight_style()),
        Span::styled(format!("  ·  {}", post.read_time_display()), styles::muted_style()),
    ];
    if let Some(ref created) = post.created_at {
        meta.push(Span::styled(
            format!("  ·  {}", format_date(created)),
            styles::muted_style(),
        ));
    }
    if !post.is_active {
        meta.push(Span::styled("  ·  inactive", styles::error_style()));
    }

    let mut lines = vec![
        Line::from(Span::styled(post.title.clone(), styles::title_style())),
        Line::from(meta),
    ];
    if !post.description.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            post.description.clone(),
            styles::quote_style(),
        )));
    }
    lines.push(Line::from(""));
    lines.extend(markdown::render_markdown(&post.content));

    let title = if app.post_loading { " Refreshing... " } else { "" };
    let paragraph = Paragraph::new(lines)
        .block(block.title(title).title_style(styles::muted_style()))
        .wrap(Wrap { trim: false })
        .scroll((app.post_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_comments(frame: &mut Frame, app: &App, area: Rect) {
    let thread = app.thread();

    let items: Vec<ListItem> = thread
        .iter()
        .map(|(depth, comment)| {
            let indent = " ".repeat(depth * REPLY_INDENT);
            let marker = if *depth > 0 { "↳ " } else { "" };
            let date = comment
                .created_at
                .as_deref()
                .map(|d| format!("  {}", format_date(d)))
                .unwrap_or_default();

            let mut lines = vec![Line::from(vec![
                Span::raw(format!("{}{}", indent, marker)),
                Span::styled(comment.author.clone(), styles::highlight_style()),
                Span::styled(date, styles::muted_style()),
            ])];
            for text_line in comment.text.lines() {
                lines.push(Line::from(format!("{}  {}", indent, text_line)));
            }
            ListItem::new(lines)
        })
        .collect();

    let hint = if app.session.is_authenticated() {
        "[c]omment [r]eply [e]dit [d]elete"
    } else {
        "log in to comment"
    };
    let title = format!(" Comments ({}) - {} ", thread.len(), hint);

    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    if items.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            " No comments yet",
            styles::muted_style(),
        )))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(styles::selected_style());

    let mut state = ListState::default();
    state.select(Some(app.comment_selection));
    frame.render_stateful_widget(list, area, &mut state);
}
