//! Markdown to styled terminal lines.
//!
//! Covers what agent replies actually contain: headings, emphasis, inline
//! code, fenced code blocks, lists, block quotes and rules. Everything else
//! degrades to plain text.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

const CODE_GUTTER: &str = "  │ ";

/// Render `text` into lines no wider than `width` columns (code blocks
/// excepted; they are clipped by the buffer instead of wrapped).
pub fn render_markdown(text: &str, width: u16, base: Style) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(usize::from(width).max(10), base);
    for event in Parser::new(text) {
        renderer.handle(event);
    }
    renderer.finish()
}

/// Greedy word wrap over styled spans. `first_prefix` starts the first line,
/// `rest_prefix` every continuation line.
pub fn wrap_spans(
    spans: Vec<Span<'static>>,
    first_prefix: Span<'static>,
    rest_prefix: Span<'static>,
    width: usize,
) -> Vec<Line<'static>> {
    let first_width = first_prefix.content.chars().count();
    let rest_width = rest_prefix.content.chars().count();

    let mut lines = Vec::new();
    let mut current = vec![first_prefix];
    let mut used = first_width;
    let mut line_start = first_width;

    for span in spans {
        let style = span.style;
        for piece in span.content.split_inclusive(' ') {
            let visible = piece.trim_end().chars().count();
            if used + visible > width && used > line_start {
                lines.push(Line::from(std::mem::take(&mut current)));
                current.push(rest_prefix.clone());
                used = rest_width;
                line_start = rest_width;
                let piece = piece.trim_start();
                if piece.is_empty() {
                    continue;
                }
                used += piece.chars().count();
                current.push(Span::styled(piece.to_string(), style));
                continue;
            }
            used += piece.chars().count();
            current.push(Span::styled(piece.to_string(), style));
        }
    }

    if current.len() > 1 || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

struct Renderer {
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    item_marker: Option<String>,
    quote_depth: usize,
    code: Option<String>,
}

impl Renderer {
    fn new(width: usize, base: Style) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![base],
            lists: Vec::new(),
            item_marker: None,
            quote_depth: 0,
            code: None,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let style = f(self.style());
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code.as_mut() {
                Some(code) => code.push_str(&text),
                None => {
                    let style = self.style();
                    self.current.push(Span::styled(text.into_string(), style));
                }
            },
            Event::Code(code) => {
                let style = self.style().fg(Color::Yellow);
                self.current.push(Span::styled(code.into_string(), style));
            }
            Event::SoftBreak => {
                let style = self.style();
                self.current.push(Span::styled(" ", style));
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::styled(
                    "─".repeat(self.width.min(40)),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.current.push(Span::raw(marker));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let style = self.style();
                self.current.push(Span::styled(html.into_string(), style));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.push_style(|s| heading_style(s, level));
                let hashes = "#".repeat(level as usize);
                let style = self.style();
                self.current.push(Span::styled(format!("{hashes} "), style));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::styled(
                            format!("  ┌ {lang}"),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.item_marker = Some(marker);
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => self.push_style(|s| s.fg(Color::Blue).add_modifier(Modifier::UNDERLINED)),
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.flush();
                self.pop_style();
                self.blank();
            }
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::CodeBlock => {
                let code = self.code.take().unwrap_or_default();
                let style = Style::default().fg(Color::LightYellow);
                for line in code.trim_end_matches('\n').lines() {
                    self.lines.push(Line::from(vec![
                        Span::styled(CODE_GUTTER, Style::default().fg(Color::DarkGray)),
                        Span::styled(line.to_string(), style),
                    ]));
                }
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style()
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    /// Wrap the pending inline spans into finished lines.
    fn flush(&mut self) {
        let marker = self.item_marker.take();
        if self.current.is_empty() && marker.is_none() {
            return;
        }

        let quote = "│ ".repeat(self.quote_depth);
        let indent = "  ".repeat(self.lists.len().saturating_sub(1));
        let first = format!("{quote}{indent}{}", marker.as_deref().unwrap_or(""));
        let rest = format!(
            "{quote}{indent}{}",
            " ".repeat(marker.as_deref().map_or(0, |m| m.chars().count()))
        );
        let prefix_style = Style::default().fg(Color::DarkGray);

        let spans = std::mem::take(&mut self.current);
        self.lines.extend(wrap_spans(
            spans,
            Span::styled(first, prefix_style),
            Span::styled(rest, prefix_style),
            self.width,
        ));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

fn heading_style(base: Style, level: HeadingLevel) -> Style {
    let style = base.add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.fg(Color::LightCyan).add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style.fg(Color::LightCyan),
        _ => style,
    }
}
