//! Conversation history display component

use crate::agent::AgentInfo;
use crate::transcript::{Role, Transcript, Turn};
use crate::ui::markdown::{render_markdown, wrap_spans};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Renders a transcript bottom-anchored, with an optional scroll offset
/// counted in lines from the bottom.
pub struct HistoryView<'a> {
    pub transcript: &'a Transcript,
    pub agent: &'static AgentInfo,
    pub show_timestamps: bool,
    pub scroll_from_bottom: usize,
}

impl HistoryView<'_> {
    /// All rendered lines for a given inner width.
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines = Vec::new();
        for turn in self.transcript.turns() {
            all_lines.extend(self.render_turn(turn, width));
            all_lines.push(Line::default());
        }
        all_lines.pop();
        all_lines
    }

    /// Largest useful `scroll_from_bottom` when drawn into `area`.
    pub fn max_scroll(&self, area: Rect) -> usize {
        if self.transcript.is_empty() {
            return 0;
        }
        let inner_area = self.block().inner(area);
        self.lines(inner_area.width)
            .len()
            .saturating_sub(inner_area.height as usize)
    }

    fn block(&self) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!(" {} {} ", self.agent.icon, self.agent.display_name))
    }

    fn render_turn(&self, turn: &Turn, width: u16) -> Vec<Line<'static>> {
        let (icon, name, color) = match turn.role() {
            Role::User => ("👤", "You", Color::Blue),
            Role::Assistant => (self.agent.icon, self.agent.display_name, self.agent.accent),
        };

        let mut header = vec![
            Span::raw(format!("{icon} ")),
            Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ];
        if self.show_timestamps {
            header.push(Span::styled(
                format!("  {}", turn.timestamp().format("%H:%M:%S")),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut lines = vec![Line::from(header)];
        let body_width = width.saturating_sub(2);
        match turn.role() {
            Role::User => {
                for paragraph in turn.content().split('\n') {
                    lines.extend(wrap_spans(
                        vec![Span::raw(paragraph.to_string())],
                        Span::raw("  "),
                        Span::raw("  "),
                        usize::from(width),
                    ));
                }
            }
            Role::Assistant => {
                for line in render_markdown(turn.content(), body_width, Style::default()) {
                    let mut spans = vec![Span::raw("  ")];
                    spans.extend(line.spans);
                    lines.push(Line::from(spans));
                }
            }
        }
        lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = self.block();

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.transcript.is_empty() {
            let welcome_lines = vec![
                Line::from(Span::styled(
                    format!("New conversation with the {}.", self.agent.display_name),
                    Style::default().fg(self.agent.accent),
                )),
                Line::from(Span::styled(
                    self.agent.description,
                    Style::default().fg(Color::Gray),
                )),
                Line::default(),
                Line::from(Span::styled(
                    "Enter to send, Shift+Enter for a new line, / for commands.",
                    Style::default().fg(Color::DarkGray),
                )),
            ];

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        let all_lines = self.lines(inner_area.width);
        let height = inner_area.height as usize;
        let max_scroll = all_lines.len().saturating_sub(height);
        let end = all_lines.len() - self.scroll_from_bottom.min(max_scroll);
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn renders_user_and_assistant_turns_in_order() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("mesh a cube"));
        transcript.push(Turn::assistant("**Done.** Use `blockMesh`."));

        let view = HistoryView {
            transcript: &transcript,
            agent: AgentId::Mesh.info(),
            show_timestamps: false,
            scroll_from_bottom: 0,
        };
        let lines: Vec<String> = view.lines(60).iter().map(text).collect();

        assert_eq!(
            lines,
            vec![
                "👤 You",
                "  mesh a cube",
                "",
                "🕸 Meshing Agent",
                "  Done. Use blockMesh.",
            ]
        );
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let mut transcript = Transcript::new();
        for i in 0..20 {
            transcript.push(Turn::user(format!("message {i}")));
        }
        let view = HistoryView {
            transcript: &transcript,
            agent: AgentId::Cad.info(),
            show_timestamps: true,
            scroll_from_bottom: 10_000,
        };

        let area = Rect::new(0, 0, 40, 8);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);

        let first_row: String = (1..39)
            .map(|x| buf.get(x, 1).symbol().to_string())
            .collect();
        assert!(first_row.contains("You"));
    }
}
