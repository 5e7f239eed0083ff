//! Markdown rendering for post bodies.
//!
//! Converts CommonMark into styled ratatui lines. Wrapping is left to the
//! `Paragraph` the lines end up in.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use super::styles;

const BULLET: &str = "• ";
const QUOTE_PREFIX: &str = "│ ";
const CODE_INDENT: &str = "    ";

/// Render Markdown to terminal lines.
pub fn render_markdown(input: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(input, options) {
        renderer.event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// Next number for each open list, None for bullet lists
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    link: Option<String>,
}

impl Renderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let next = self.style().patch(patch);
        self.styles.push(next);
    }

    fn prefix(&self) -> Vec<Span<'static>> {
        let mut spans = Vec::new();
        for _ in 0..self.quote_depth {
            spans.push(Span::styled(QUOTE_PREFIX, styles::quote_style()));
        }
        spans
    }

    fn push_span(&mut self, text: String, style: Style) {
        if self.current.is_empty() {
            self.current = self.prefix();
        }
        self.current.push(Span::styled(text, style));
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    /// Separate blocks with a single empty line
    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| !is_blank(l)) {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    for line in text.lines() {
                        let mut spans = self.prefix();
                        spans.push(Span::styled(
                            format!("{}{}", CODE_INDENT, line),
                            styles::code_style(),
                        ));
                        self.lines.push(Line::from(spans));
                    }
                } else {
                    let style = self.style();
                    self.push_span(text.into_string(), style);
                }
            }
            Event::Code(code) => self.push_span(code.into_string(), styles::code_style()),
            Event::Html(html) | Event::InlineHtml(html) => {
                self.push_span(html.into_string(), styles::muted_style());
            }
            Event::SoftBreak => {
                let style = self.style();
                self.push_span(" ".to_string(), style);
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.blank();
                self.lines
                    .push(Line::from(Span::styled("─".repeat(40), styles::muted_style())));
                self.lines.push(Line::default());
            }
            Event::TaskListMarker(done) => {
                let mark = if done { "[x] " } else { "[ ] " };
                self.push_span(mark.to_string(), styles::muted_style());
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Heading { level, .. } => {
                self.blank();
                self.push_style(styles::heading_style(level as usize));
            }
            Tag::BlockQuote(_) => {
                self.blank();
                self.quote_depth += 1;
                self.push_style(styles::quote_style());
            }
            Tag::CodeBlock(kind) => {
                self.blank();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        let mut spans = self.prefix();
                        spans.push(Span::styled(lang.into_string(), styles::muted_style()));
                        self.lines.push(Line::from(spans));
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}{}", indent, BULLET),
                };
                self.push_span(marker, styles::highlight_style());
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.link = Some(dest_url.into_string());
                self.push_style(styles::link_style());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.flush();
            }
            TagEnd::BlockQuote(..) => {
                self.styles.pop();
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(url) = self.link.take() {
                    self.push_span(format!(" ({})", url), styles::muted_style());
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(is_blank) {
            self.lines.pop();
        }
        self.lines
    }
}

fn is_blank(line: &Line<'_>) -> bool {
    line.spans.iter().all(|s| s.content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn texts(input: &str) -> Vec<String> {
        render_markdown(input).iter().map(text).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(render_markdown("").is_empty());
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        assert_eq!(texts("First\nline\n\nSecond"), vec!["First line", "", "Second"]);
    }

    #[test]
    fn test_heading_is_bold() {
        let lines = render_markdown("# Title\n\nBody");
        assert_eq!(text(&lines[0]), "Title");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(text(&lines[2]), "Body");
    }

    #[test]
    fn test_inline_styles() {
        let lines = render_markdown("plain *it* **bold** `code`");
        let spans = &lines[0].spans;
        let italic = spans.iter().find(|s| s.content == "it").unwrap();
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
        let bold = spans.iter().find(|s| s.content == "bold").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let code = spans.iter().find(|s| s.content == "code").unwrap();
        assert_eq!(code.style, styles::code_style());
    }

    #[test]
    fn test_lists() {
        assert_eq!(texts("- one\n- two"), vec!["• one", "• two"]);
        assert_eq!(texts("3. c\n4. d"), vec!["3. c", "4. d"]);
        assert_eq!(texts("- a\n  - b"), vec!["• a", "  • b"]);
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let out = texts("```rust\nfn main() {\n}\n```");
        assert_eq!(out, vec!["rust", "    fn main() {", "    }"]);
    }

    #[test]
    fn test_link_shows_target() {
        let out = texts("see [docs](https://example.com)");
        assert_eq!(out, vec!["see docs (https://example.com)"]);
    }

    #[test]
    fn test_block_quote_prefix() {
        let out = texts("> quoted");
        assert_eq!(out, vec!["│ quoted"]);
    }
}
