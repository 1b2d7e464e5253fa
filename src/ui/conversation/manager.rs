use crate::agent::AgentInfo;
use crate::session::SessionState;
use crate::ui::conversation::{
    get_help_text, ComposerResult, ConversationComposer, HistoryView, Notice, ParsedCommand,
    SlashCommand, StatusLine,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};
use std::time::Instant;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    /// Mirror the composer text into the session draft
    DraftChanged(String),
    Submit,
    SwitchAgent(&'static AgentInfo),
    /// Reselect the current agent with a fresh transcript
    Restart,
    GoToPicker,
    Exit,
    Notify(Notice),
}

/// Conversation screen: composer plus scroll state over the session
/// transcript. Owns no conversation data itself.
pub struct ConversationManager {
    agent: &'static AgentInfo,
    composer: ConversationComposer,
    scroll_from_bottom: usize,
    /// Scroll limit from the last render
    max_scroll: usize,
    show_timestamps: bool,
}

impl ConversationManager {
    pub fn new(agent: &'static AgentInfo, show_timestamps: bool) -> Self {
        Self {
            agent,
            composer: ConversationComposer::new(agent),
            scroll_from_bottom: 0,
            max_scroll: 0,
            show_timestamps,
        }
    }

    pub fn agent(&self) -> &'static AgentInfo {
        self.agent
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind == KeyEventKind::Press {
            match key.code {
                KeyCode::PageUp => {
                    self.scroll_from_bottom = (self.scroll_from_bottom + 5).min(self.max_scroll);
                    return ConversationAction::None;
                }
                KeyCode::PageDown => {
                    self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(5);
                    return ConversationAction::None;
                }
                _ => {}
            }
        }

        match self.composer.handle_key(key) {
            ComposerResult::Edited => ConversationAction::DraftChanged(self.composer.content().to_string()),
            ComposerResult::Submitted => ConversationAction::Submit,
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        }
    }

    /// The submission was accepted: the draft now lives in the transcript.
    pub fn on_submitted(&mut self) {
        self.composer.clear();
        self.scroll_from_bottom = 0;
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.composer.set_focus(has_focus);
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::Agent => match command.agent_target() {
                Some(Ok(agent)) => ConversationAction::SwitchAgent(agent),
                Some(Err(err)) => ConversationAction::Notify(Notice::error(err.to_string())),
                None => ConversationAction::GoToPicker,
            },
            SlashCommand::Agents => ConversationAction::GoToPicker,
            SlashCommand::New => ConversationAction::Restart,
            SlashCommand::Bye => ConversationAction::Exit,
            SlashCommand::Help => ConversationAction::Notify(Notice::info(get_help_text())),
        }
    }

    /// Render the conversation screen for `session`
    pub fn render(&mut self, session: &SessionState, notice: Option<&Notice>, area: Rect, buf: &mut Buffer) {
        self.composer.set_busy(session.is_pending());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(self.composer.desired_height()),
            ])
            .split(area);

        let mut history = HistoryView {
            transcript: session.transcript(),
            agent: self.agent,
            show_timestamps: self.show_timestamps,
            scroll_from_bottom: 0,
        };
        self.max_scroll = history.max_scroll(chunks[0]);
        self.scroll_from_bottom = self.scroll_from_bottom.min(self.max_scroll);
        history.scroll_from_bottom = self.scroll_from_bottom;
        history.render(chunks[0], buf);

        StatusLine {
            agent: self.agent,
            phase: session.phase(),
            notice,
            now: Instant::now(),
        }
        .render(chunks[1], buf);

        (&self.composer).render(chunks[2], buf);
    }
}
