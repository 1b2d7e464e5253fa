use crossterm::event::Event;

use crate::error::DispatchError;
use crate::session::ExchangeId;

/// Everything the TUI loop reacts to, funnelled through one channel.
#[derive(Debug)]
pub enum AppEvent {
    /// Key press, paste or resize from the terminal
    Terminal(Event),

    /// A spawned exchange finished (successfully or not)
    ExchangeSettled {
        id: ExchangeId,
        result: Result<String, DispatchError>,
    },

    /// Outcome of the startup health check
    BackendStatus(Result<String, DispatchError>),

    /// Periodic redraw while an exchange is outstanding
    Tick,
}

impl AppEvent {
    /// Terminal events that cannot change what is on screen.
    pub fn is_noise(&self) -> bool {
        matches!(
            self,
            AppEvent::Terminal(Event::FocusGained | Event::FocusLost | Event::Mouse(_))
        )
    }
}
