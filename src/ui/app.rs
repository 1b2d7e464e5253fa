//! Terminal application: owns the dispatch controller and drives it from
//! keyboard input and settled exchanges.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::AgentInfo;
use crate::backend::AgentBackend;
use crate::config::Config;
use crate::dispatch::{transmit, DispatchController, Settlement};
use crate::error::{FailureKind, Rejection};
use crate::events::AppEvent;
use crate::ui::agent_picker::{AgentPicker, BackendStatus, PickerAction};
use crate::ui::conversation::{ConversationAction, ConversationManager, Notice};

const TICK_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Picker,
    Conversation,
}

pub struct App {
    controller: DispatchController,
    config: Config,
    screen: Screen,
    picker: AgentPicker,
    conversation: Option<ConversationManager>,
    notice: Option<Notice>,
    backend_status: BackendStatus,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    in_flight: Option<JoinHandle<()>>,
    exit: bool,
}

impl App {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        config: Config,
        events_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let controller = DispatchController::new(backend, config.request_timeout());
        Self {
            controller,
            config,
            screen: Screen::Picker,
            picker: AgentPicker::new(),
            conversation: None,
            notice: None,
            backend_status: BackendStatus::Checking,
            events_tx,
            in_flight: None,
            exit: false,
        }
    }

    pub fn controller(&self) -> &DispatchController {
        &self.controller
    }

    pub fn should_exit(&self) -> bool {
        self.exit
    }

    /// Start a fresh conversation with `agent` and show it.
    pub fn open_agent(&mut self, agent: &'static AgentInfo) {
        if let Some(task) = self.in_flight.take() {
            debug!("cancelling outstanding request");
            task.abort();
        }
        self.controller.select_agent(agent.id);
        self.picker.highlight(agent);
        let mut conversation = ConversationManager::new(agent, self.config.ui.show_timestamps);
        conversation.set_focus(true);
        self.conversation = Some(conversation);
        self.notice = None;
        self.screen = Screen::Conversation;
    }

    /// Run the startup health check in the background.
    pub fn check_backend(&self) {
        let backend = self.controller.backend();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.health().await;
            let _ = tx.send(AppEvent::BackendStatus(result));
        });
    }

    /// Apply one event. Returns true when the screen needs a redraw.
    pub fn handle_event(&mut self, event: AppEvent) -> bool {
        if event.is_noise() {
            return false;
        }
        let before = self.controller.session().revision();

        let ui_changed = match event {
            AppEvent::Terminal(Event::Key(key)) => self.handle_key(key),
            AppEvent::Terminal(Event::Paste(text)) if self.screen == Screen::Conversation => {
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                for c in text.chars() {
                    let code = if c == '\n' { KeyCode::Enter } else { KeyCode::Char(c) };
                    let modifiers = if c == '\n' { KeyModifiers::SHIFT } else { KeyModifiers::NONE };
                    self.handle_key(KeyEvent::new(code, modifiers));
                }
                true
            }
            AppEvent::Terminal(_) => true,
            AppEvent::ExchangeSettled { id, result } => {
                match self.controller.settle(id, result) {
                    Settlement::Replied => {
                        self.in_flight = None;
                        self.notice = None;
                    }
                    Settlement::Failed(kind) => {
                        self.in_flight = None;
                        self.notice = Some(match kind {
                            FailureKind::Timeout => Notice::warning("request timed out"),
                            _ => Notice::error("the agent backend returned an error"),
                        });
                    }
                    Settlement::Stale => {}
                }
                true
            }
            AppEvent::BackendStatus(result) => {
                self.backend_status = match result {
                    Ok(message) => BackendStatus::Online(message),
                    Err(err) => {
                        warn!(error = %err, "backend health check failed");
                        BackendStatus::Unreachable(err.to_string())
                    }
                };
                true
            }
            AppEvent::Tick => self.controller.session().is_pending(),
        };

        ui_changed || self.controller.session().revision() != before
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.exit = true;
            return true;
        }

        match self.screen {
            Screen::Picker => match self.picker.handle_key(key) {
                PickerAction::Select(agent) => self.open_agent(agent),
                PickerAction::Exit => self.exit = true,
                PickerAction::None => {}
            },
            Screen::Conversation => {
                let Some(conversation) = self.conversation.as_mut() else {
                    self.screen = Screen::Picker;
                    return true;
                };
                let action = conversation.handle_key(key);
                self.apply_conversation_action(action);
            }
        }
        true
    }

    fn apply_conversation_action(&mut self, action: ConversationAction) {
        match action {
            ConversationAction::None => {}
            ConversationAction::DraftChanged(text) => {
                self.notice = None;
                self.controller.update_draft(text);
            }
            ConversationAction::Submit => self.submit(),
            ConversationAction::SwitchAgent(agent) => self.open_agent(agent),
            ConversationAction::Restart => {
                if let Some(agent) = self.conversation.as_ref().map(|c| c.agent()) {
                    self.open_agent(agent);
                    self.notice = Some(Notice::info("started a new conversation"));
                }
            }
            ConversationAction::GoToPicker => {
                self.controller.update_draft(String::new());
                self.screen = Screen::Picker;
                self.notice = None;
            }
            ConversationAction::Exit => self.exit = true,
            ConversationAction::Notify(notice) => {
                // the composer already cleared the command text
                self.controller.update_draft(String::new());
                self.notice = Some(notice);
            }
        }
    }

    fn submit(&mut self) {
        match self.controller.begin_submit() {
            Ok(exchange) => {
                self.notice = None;
                if let Some(conversation) = self.conversation.as_mut() {
                    conversation.on_submitted();
                }

                let backend = self.controller.backend();
                let timeout = self.controller.timeout();
                let tx = self.events_tx.clone();
                self.in_flight = Some(tokio::spawn(async move {
                    let result = transmit(backend.as_ref(), &exchange, timeout).await;
                    let _ = tx.send(AppEvent::ExchangeSettled { id: exchange.id, result });
                }));
            }
            Err(Rejection::EmptyDraft) => {}
            Err(rejection @ Rejection::Busy) => {
                self.notice = Some(Notice::warning(rejection.to_string()));
            }
            Err(rejection @ Rejection::NoAgentSelected) => {
                self.notice = Some(Notice::error(rejection.to_string()));
                self.screen = Screen::Picker;
            }
        }
    }

    pub fn render(&mut self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        match (self.screen, self.conversation.as_mut()) {
            (Screen::Conversation, Some(conversation)) => {
                conversation.render(self.controller.session(), self.notice.as_ref(), area, buf);
            }
            _ => self
                .picker
                .render(&self.backend_status, &self.config.backend_url, area, buf),
        }
    }
}

type Tui = Terminal<CrosstermBackend<Stdout>>;

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the interactive client until the user quits.
///
/// With `initial_agent` the picker is skipped.
pub async fn run(
    backend: Arc<dyn AgentBackend>,
    config: Config,
    initial_agent: Option<&'static AgentInfo>,
) -> Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut app = App::new(backend, config, events_tx);
    app.check_backend();
    if let Some(agent) = initial_agent {
        app.open_agent(agent);
    }

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &mut app, events_rx).await;
    restore_terminal(&mut terminal)?;

    info!(session = %app.controller().session().id(), "session closed");
    result
}

async fn run_loop(
    terminal: &mut Tui,
    app: &mut App,
    mut events_rx: mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut terminal_events = EventStream::new();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut dirty = true;

    while !app.should_exit() {
        if dirty {
            terminal.draw(|frame| {
                let area = frame.size();
                app.render(area, frame.buffer_mut());
            })?;
        }

        let event = tokio::select! {
            maybe = terminal_events.next() => match maybe {
                Some(Ok(event)) => AppEvent::Terminal(event),
                Some(Err(err)) => return Err(err).context("Failed to read terminal event"),
                None => break,
            },
            Some(event) = events_rx.recv() => event,
            _ = ticker.tick() => AppEvent::Tick,
        };

        if !matches!(event, AppEvent::Tick) {
            debug!(?event, "event");
        }
        dirty = app.handle_event(event);
    }

    Ok(())
}
