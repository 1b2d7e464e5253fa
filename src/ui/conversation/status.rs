use crate::agent::AgentInfo;
use crate::session::DispatchPhase;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::Instant;

/// Severity of a one-line notice shown above the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, message: message.into() }
    }
}

/// Status line: the working indicator while awaiting, otherwise the latest
/// notice, otherwise a key hint.
pub struct StatusLine<'a> {
    pub agent: &'static AgentInfo,
    pub phase: DispatchPhase,
    pub notice: Option<&'a Notice>,
    pub now: Instant,
}

impl StatusLine<'_> {
    pub fn line(&self) -> Line<'static> {
        if let DispatchPhase::Awaiting { since, .. } = self.phase {
            let elapsed = self.now.saturating_duration_since(since);
            let dots = match (elapsed.as_millis() / 300) % 4 {
                0 => ".",
                1 => "..",
                2 => "...",
                _ => "   ",
            };
            let accent = Style::default().fg(self.agent.accent);
            return Line::from(vec![
                Span::styled(format!("{} ", self.agent.icon), accent),
                Span::styled(format!("{} is working", self.agent.display_name), accent),
                Span::styled(dots, Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!(" {}s", elapsed.as_secs()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
        }

        if let Some(notice) = self.notice {
            let (icon, color) = match notice.kind {
                NoticeKind::Info => ("ℹ ", Color::Blue),
                NoticeKind::Warning => ("⚠ ", Color::Yellow),
                NoticeKind::Error => ("✖ ", Color::Red),
            };
            return Line::from(vec![
                Span::styled(icon, Style::default().fg(color)),
                Span::raw(notice.message.clone()),
            ]);
        }

        Line::from(Span::styled(
            "/help for commands · PgUp/PgDn scroll · Ctrl+C quit",
            Style::default().fg(Color::DarkGray),
        ))
    }
}

impl Widget for StatusLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_line(area.x, area.y, &self.line(), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::session::ExchangeId;
    use std::time::Duration;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn awaiting_shows_working_indicator_over_notice() {
        let since = Instant::now();
        let notice = Notice::error("boom");
        let status = StatusLine {
            agent: AgentId::Simulation.info(),
            phase: DispatchPhase::Awaiting { exchange: ExchangeId(1), since },
            notice: Some(&notice),
            now: since + Duration::from_millis(3_100),
        };

        let line = text(&status.line());
        assert!(line.contains("Simulation Agent is working"));
        assert!(line.ends_with(" 3s"));
    }

    #[test]
    fn idle_shows_notice_then_hint() {
        let notice = Notice::warning("still waiting for the previous reply");
        let mut status = StatusLine {
            agent: AgentId::Cad.info(),
            phase: DispatchPhase::Idle,
            notice: Some(&notice),
            now: Instant::now(),
        };
        assert!(text(&status.line()).contains("still waiting"));

        status.notice = None;
        assert!(text(&status.line()).contains("/help"));
    }
}
