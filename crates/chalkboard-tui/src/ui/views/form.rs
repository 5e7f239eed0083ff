use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, FormField, PostForm};
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let form = match app.form {
        Some(ref form) => form,
        None => return,
    };

    let title = match form.editing {
        Some(_) => " Edit Post ",
        None => " New Post ",
    };
    let outer = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    if form.loading {
        frame.render_widget(
            Paragraph::new(Span::styled(" Loading post...", styles::muted_style())),
            inner,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Description
            Constraint::Length(3), // Author / read time / active
            Constraint::Min(5),    // Content
            Constraint::Length(1), // Message line
        ])
        .split(inner);

    render_field(frame, form, FormField::Title, chunks[0]);
    render_field(frame, form, FormField::Description, chunks[1]);

    let row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
        ])
        .split(chunks[2]);
    render_field(frame, form, FormField::Author, row[0]);
    render_field(frame, form, FormField::ReadTime, row[1]);
    render_field(frame, form, FormField::Active, row[2]);

    render_field(frame, form, FormField::Content, chunks[3]);

    let message = if form.submitting {
        Line::from(Span::styled(" Saving...", styles::muted_style()))
    } else if let Some(ref error) = form.error {
        Line::from(Span::styled(format!(" {}", error), styles::error_style()))
    } else {
        Line::from(Span::styled(
            " [Tab] next field  [Ctrl+S] save  [Esc] cancel",
            styles::muted_style(),
        ))
    };
    frame.render_widget(Paragraph::new(message), chunks[4]);
}

fn render_field(frame: &mut Frame, form: &PostForm, field: FormField, area: Rect) {
    let focused = form.focus == field;
    let mut value = form.value(field);
    if focused && field != FormField::Active {
        value.push('▌');
    }

    let block = Block::default()
        .title(format!(" {} ", field.label()))
        .title_style(if focused {
            styles::highlight_style()
        } else {
            styles::muted_style()
        })
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    let lines: Vec<Line> = value.split('\n').map(|l| Line::from(l.to_string())).collect();

    // Keep the cursor line visible in the content area
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible.max(1)) as u16;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(styles::list_item_style())
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}
