//! Conversation store: the single mutable state of a chat session.
//!
//! Mutators are crate-private; the dispatch controller is the only writer.
//! Everything else reads through the accessors.

use std::fmt;
use std::time::Instant;

use uuid::Uuid;

use crate::agent::{AgentId, AgentInfo};
use crate::transcript::{Transcript, Turn};

/// Identifies one `Idle -> Awaiting` transition within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub(crate) u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dispatch state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPhase {
    #[default]
    Idle,
    /// Exactly one exchange is outstanding.
    Awaiting { exchange: ExchangeId, since: Instant },
}

impl DispatchPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, DispatchPhase::Idle)
    }

    /// The outstanding exchange, if any.
    pub fn exchange(&self) -> Option<ExchangeId> {
        match self {
            DispatchPhase::Idle => None,
            DispatchPhase::Awaiting { exchange, .. } => Some(*exchange),
        }
    }
}

/// Session state: selected agent, transcript, dispatch phase and draft.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    selected_agent: Option<AgentId>,
    transcript: Transcript,
    phase: DispatchPhase,
    draft_input: String,
    revision: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            selected_agent: None,
            transcript: Transcript::new(),
            phase: DispatchPhase::Idle,
            draft_input: String::new(),
            revision: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn selected_agent(&self) -> Option<&'static AgentInfo> {
        self.selected_agent.map(AgentId::info)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    /// True while an exchange is outstanding.
    pub fn is_pending(&self) -> bool {
        !self.phase.is_idle()
    }

    pub fn draft_input(&self) -> &str {
        &self.draft_input
    }

    /// Bumped on every mutation. Observers compare it to detect changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Selects `agent` and starts a fresh, empty transcript. Reselecting the
    /// current agent also resets.
    pub(crate) fn select_agent(&mut self, agent: AgentId) {
        self.selected_agent = Some(agent);
        self.transcript = Transcript::new();
        self.phase = DispatchPhase::Idle;
        self.draft_input.clear();
        self.touch();
    }

    pub(crate) fn append_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
        self.touch();
    }

    pub(crate) fn set_phase(&mut self, phase: DispatchPhase) {
        self.phase = phase;
        self.touch();
    }

    pub(crate) fn set_draft_input(&mut self, text: impl Into<String>) {
        self.draft_input = text.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;

    fn awaiting(n: u64) -> DispatchPhase {
        DispatchPhase::Awaiting {
            exchange: ExchangeId(n),
            since: Instant::now(),
        }
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = SessionState::new();
        assert!(session.selected_agent().is_none());
        assert!(session.transcript().is_empty());
        assert!(!session.is_pending());
        assert_eq!(session.draft_input(), "");
    }

    #[test]
    fn selecting_resets_everything_every_time() {
        let mut session = SessionState::new();
        for agent in [AgentId::Mesh, AgentId::Mesh, AgentId::Cad, AgentId::Simulation] {
            session.append_turn(Turn::user("hello"));
            session.append_turn(Turn::assistant("hi"));
            session.set_draft_input("half-typed");
            session.set_phase(awaiting(1));

            session.select_agent(agent);

            assert_eq!(session.selected_agent().map(|a| a.id), Some(agent));
            assert!(session.transcript().is_empty());
            assert!(!session.is_pending());
            assert_eq!(session.draft_input(), "");
        }
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut session = SessionState::new();
        session.select_agent(AgentId::Cad);
        session.append_turn(Turn::user("one"));
        session.append_turn(Turn::assistant("two"));
        session.append_turn(Turn::assistant("three"));

        let roles: Vec<_> = session.transcript().turns().iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut session = SessionState::new();
        let start = session.revision();
        session.set_draft_input("x");
        session.set_phase(awaiting(3));
        session.set_phase(DispatchPhase::Idle);
        assert_eq!(session.revision(), start + 3);
    }

    #[test]
    fn phase_reports_outstanding_exchange() {
        assert_eq!(awaiting(7).exchange(), Some(ExchangeId(7)));
        assert_eq!(DispatchPhase::Idle.exchange(), None);
        assert_eq!(ExchangeId(7).to_string(), "#7");
    }
}
