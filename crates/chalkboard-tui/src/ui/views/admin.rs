use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use chalkboard_core::models::count_comments;
use chalkboard_core::utils::format_date;

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([
        Cell::from("Title"),
        Cell::from("Author"),
        Cell::from("Created"),
        Cell::from("Comments"),
        Cell::from("Status"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let style = if i == app.admin_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let created = post.created_at.as_deref().map(format_date).unwrap_or_default();
            let status = if post.is_active {
                Cell::from("Active").style(styles::success_style())
            } else {
                Cell::from("Inactive").style(styles::muted_style())
            };

            Row::new(vec![
                Cell::from(post.title.clone()),
                Cell::from(post.author.clone()),
                Cell::from(created),
                Cell::from(count_comments(&post.comments).to_string()),
                status,
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Fill(1),
        Constraint::Length(16),
        Constraint::Length(14),
        Constraint::Length(9),
        Constraint::Length(9),
    ];

    let title = if app.posts_loading {
        " Manage Posts - loading... ".to_string()
    } else {
        format!(
            " Manage Posts ({}) - [n]ew [e]dit [d]elete [Enter] open ",
            app.posts.len()
        )
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
    if !app.posts.is_empty() {
        state.select(Some(app.admin_selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}
