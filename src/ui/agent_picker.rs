//! Home screen: choose which agent to talk to.

use crate::agent::{self, AgentInfo};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

/// What the backend said the last time we asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Checking,
    Online(String),
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    None,
    Select(&'static AgentInfo),
    Exit,
}

pub struct AgentPicker {
    agents: Vec<&'static AgentInfo>,
    selected: usize,
}

impl Default for AgentPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentPicker {
    pub fn new() -> Self {
        Self {
            agents: agent::all().collect(),
            selected: 0,
        }
    }

    pub fn highlighted(&self) -> &'static AgentInfo {
        self.agents[self.selected]
    }

    /// Put the cursor on `agent`, e.g. when returning from a conversation.
    pub fn highlight(&mut self, agent: &AgentInfo) {
        if let Some(index) = self.agents.iter().position(|a| a.id == agent.id) {
            self.selected = index;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerAction {
        if key.kind != KeyEventKind::Press {
            return PickerAction::None;
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.checked_sub(1).unwrap_or(self.agents.len() - 1);
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected = (self.selected + 1) % self.agents.len();
            }
            KeyCode::Enter => return PickerAction::Select(self.highlighted()),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let index = c.to_digit(10).unwrap_or(0) as usize;
                if let Some(agent) = index.checked_sub(1).and_then(|i| self.agents.get(i)) {
                    return PickerAction::Select(agent);
                }
            }
            KeyCode::Char('q') | KeyCode::Esc => return PickerAction::Exit,
            _ => {}
        }
        PickerAction::None
    }

    pub fn render(&self, status: &BackendStatus, backend_url: &str, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(self.agents.len() as u16 + 2),
                Constraint::Min(4),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(vec![
            Line::from(Span::styled(
                "simcopilot",
                Style::default().fg(Color::LightCyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Pick an assistant. Each agent starts with a fresh conversation.",
                Style::default().fg(Color::Gray),
            )),
        ])
        .render(chunks[0], buf);

        let list_block = Block::default()
            .borders(Borders::ALL)
            .title(" Agents ")
            .border_style(Style::default().fg(Color::DarkGray));
        let list_area = list_block.inner(chunks[1]);
        list_block.render(chunks[1], buf);

        for (i, agent) in self.agents.iter().enumerate() {
            if i >= list_area.height as usize {
                break;
            }
            let selected = i == self.selected;
            let name_style = if selected {
                Style::default().fg(Color::Black).bg(agent.accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(agent.accent)
            };
            let line = Line::from(vec![
                Span::raw(if selected { "▶ " } else { "  " }),
                Span::styled(format!("{}. {} {}", i + 1, agent.icon, agent.display_name), name_style),
                Span::styled(format!("  {}", agent.description), Style::default().fg(Color::Gray)),
            ]);
            buf.set_line(list_area.x, list_area.y + i as u16, &line, list_area.width);
        }

        let agent = self.highlighted();
        let mut detail = vec![Line::from(Span::styled(
            format!("{} can help with:", agent.display_name),
            Style::default().fg(agent.accent).add_modifier(Modifier::BOLD),
        ))];
        detail.extend(
            agent
                .expertise
                .iter()
                .map(|item| Line::from(format!("  • {item}"))),
        );
        detail.push(Line::from(Span::styled(
            format!("  endpoint: {}", agent.endpoint_path),
            Style::default().fg(Color::DarkGray),
        )));
        Paragraph::new(detail)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);

        let (dot, text, color) = match status {
            BackendStatus::Checking => ("○", format!("checking {backend_url}…"), Color::DarkGray),
            BackendStatus::Online(message) => ("●", format!("{backend_url} · {message}"), Color::Green),
            BackendStatus::Unreachable(reason) => ("●", format!("{backend_url} unreachable: {reason}"), Color::Red),
        };
        let footer = Line::from(vec![
            Span::styled(format!("{dot} "), Style::default().fg(color)),
            Span::styled(text, Style::default().fg(Color::Gray)),
            Span::styled("   ↑/↓ choose · Enter open · q quit", Style::default().fg(Color::DarkGray)),
        ]);
        buf.set_line(chunks[3].x, chunks[3].y, &footer, chunks[3].width);
    }
}
