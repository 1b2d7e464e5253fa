//! Dispatch controller: owns the session and runs the
//! submit → transmit → await → append state machine.
//!
//! ```text
//!            begin_submit (draft non-blank, agent selected)
//!   Idle ─────────────────────────────────────────────▶ Awaiting
//!    ▲                                                     │
//!    └──────────── settle (reply | failure | timeout) ─────┘
//! ```
//!
//! A submit while `Awaiting` is rejected without touching the session.
//! Backend failures never escape: they become an assistant turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::agent::{self, AgentId, AgentInfo};
use crate::backend::{AgentBackend, ChatRequest};
use crate::error::{DispatchError, FailureKind, RegistryError, Rejection};
use crate::session::{DispatchPhase, ExchangeId, SessionState};
use crate::transcript::Turn;

/// Assistant turn appended after a transport or malformed-response failure.
pub const FAILURE_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Assistant turn appended when the request timeout expires.
pub const TIMEOUT_APOLOGY: &str = "Sorry, the agent took too long to respond. Please try again.";

/// One outstanding request, produced by [`DispatchController::begin_submit`].
#[derive(Debug, Clone)]
pub struct Exchange {
    pub id: ExchangeId,
    pub agent: &'static AgentInfo,
    pub request: ChatRequest,
}

/// Result of applying a backend outcome to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The reply was appended as an assistant turn.
    Replied,
    /// An apology turn was appended.
    Failed(FailureKind),
    /// The exchange no longer matches the session (agent was reselected);
    /// nothing was appended.
    Stale,
}

/// Result of a full [`DispatchController::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(Rejection),
    Settled(Settlement),
}

/// Sole owner and writer of a [`SessionState`].
pub struct DispatchController {
    session: SessionState,
    backend: Arc<dyn AgentBackend>,
    timeout: Option<Duration>,
    next_exchange: u64,
}

impl DispatchController {
    /// `timeout` bounds each exchange; `None` waits forever.
    pub fn new(backend: Arc<dyn AgentBackend>, timeout: Option<Duration>) -> Self {
        Self {
            session: SessionState::new(),
            backend,
            timeout,
            next_exchange: 1,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn backend(&self) -> Arc<dyn AgentBackend> {
        Arc::clone(&self.backend)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Selects an agent with a fresh transcript. Any outstanding exchange is
    /// abandoned; its eventual result will settle as [`Settlement::Stale`].
    pub fn select_agent(&mut self, agent: AgentId) {
        if let Some(exchange) = self.session.phase().exchange() {
            info!(%exchange, "abandoning outstanding exchange on agent switch");
        }
        info!(session = %self.session.id(), %agent, "agent selected");
        self.session.select_agent(agent);
    }

    /// Like [`select_agent`](Self::select_agent) for a textual id. An id
    /// outside the registry is a caller bug and leaves the session untouched.
    pub fn select_agent_by_id(&mut self, id: &str) -> Result<&'static AgentInfo, RegistryError> {
        let info = agent::resolve(id)?;
        self.select_agent(info.id);
        Ok(info)
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.session.set_draft_input(text);
    }

    /// Guarded `Idle -> Awaiting` transition.
    ///
    /// On success the trimmed draft has become a user turn, the draft is
    /// cleared and the returned exchange carries the history as it stood
    /// before that turn.
    pub fn begin_submit(&mut self) -> Result<Exchange, Rejection> {
        if !self.session.phase().is_idle() {
            debug!("submit ignored: exchange outstanding");
            return Err(Rejection::Busy);
        }
        let Some(agent) = self.session.selected_agent() else {
            return Err(Rejection::NoAgentSelected);
        };
        let message = self.session.draft_input().trim().to_string();
        if message.is_empty() {
            return Err(Rejection::EmptyDraft);
        }

        let history = self.session.transcript().to_history();
        let id = ExchangeId(self.next_exchange);
        self.next_exchange += 1;

        self.session.set_draft_input(String::new());
        self.session.append_turn(Turn::user(message.clone()));
        self.session.set_phase(DispatchPhase::Awaiting {
            exchange: id,
            since: Instant::now(),
        });

        info!(
            session = %self.session.id(),
            agent = %agent.id,
            exchange = %id,
            history = history.len(),
            "exchange started"
        );

        Ok(Exchange {
            id,
            agent,
            request: ChatRequest { message, history },
        })
    }

    /// `Awaiting -> Idle` with the outcome of exchange `id`.
    pub fn settle(&mut self, id: ExchangeId, result: Result<String, DispatchError>) -> Settlement {
        let since = match self.session.phase() {
            DispatchPhase::Awaiting { exchange, since } if exchange == id => since,
            _ => {
                debug!(exchange = %id, "dropping result of abandoned exchange");
                return Settlement::Stale;
            }
        };
        let elapsed_ms = since.elapsed().as_millis() as u64;

        let settlement = match result {
            Ok(reply) => {
                info!(exchange = %id, elapsed_ms, chars = reply.len(), "reply received");
                self.session.append_turn(Turn::assistant(reply));
                Settlement::Replied
            }
            Err(err) => {
                let kind = err.kind();
                warn!(exchange = %id, elapsed_ms, ?kind, error = %err, "exchange failed");
                let apology = match kind {
                    FailureKind::Timeout => TIMEOUT_APOLOGY,
                    FailureKind::Transport | FailureKind::MalformedResponse => FAILURE_APOLOGY,
                };
                self.session.append_turn(Turn::assistant(apology));
                Settlement::Failed(kind)
            }
        };

        self.session.set_phase(DispatchPhase::Idle);
        settlement
    }

    /// Submits the current draft and waits for the exchange to settle.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let exchange = match self.begin_submit() {
            Ok(exchange) => exchange,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let result = transmit(self.backend.as_ref(), &exchange, self.timeout).await;
        SubmitOutcome::Settled(self.settle(exchange.id, result))
    }
}

/// Sends one exchange, bounded by `timeout` when set.
pub async fn transmit(
    backend: &dyn AgentBackend,
    exchange: &Exchange,
    timeout: Option<Duration>,
) -> Result<String, DispatchError> {
    let span = info_span!("transmit", agent = %exchange.agent.id, exchange = %exchange.id);
    let call = backend.chat(exchange.agent, &exchange.request).instrument(span);

    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(DispatchError::Timeout(limit))),
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Role, WireTurn};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a script and records every request it sees.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, DispatchError>>>,
        seen: Mutex<Vec<(AgentId, ChatRequest)>>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Result<String, DispatchError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            })
        }

        fn seen(&self) -> Vec<(AgentId, ChatRequest)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentBackend for ScriptedBackend {
        async fn chat(&self, agent: &AgentInfo, request: &ChatRequest) -> Result<String, DispatchError> {
            self.seen.lock().unwrap().push((agent.id, request.clone()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DispatchError::Transport("script exhausted".into())))
        }

        async fn health(&self) -> Result<String, DispatchError> {
            Ok("scripted".into())
        }
    }

    /// Never answers.
    struct SilentBackend;

    #[async_trait]
    impl AgentBackend for SilentBackend {
        async fn chat(&self, _: &AgentInfo, _: &ChatRequest) -> Result<String, DispatchError> {
            futures::future::pending().await
        }

        async fn health(&self) -> Result<String, DispatchError> {
            futures::future::pending().await
        }
    }

    fn controller(backend: Arc<dyn AgentBackend>) -> DispatchController {
        let mut controller = DispatchController::new(backend, Some(Duration::from_secs(60)));
        controller.select_agent(AgentId::Mesh);
        controller
    }

    fn contents(controller: &DispatchController) -> Vec<(Role, String)> {
        controller
            .session()
            .transcript()
            .turns()
            .iter()
            .map(|t| (t.role(), t.content().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn successful_exchange_appends_user_then_reply() {
        let backend = ScriptedBackend::with(vec![Ok("Here is a blockMeshDict...".into())]);
        let mut controller = controller(backend.clone());
        controller.update_draft("  generate a block mesh for a cube \n");

        let outcome = controller.submit().await;

        assert_eq!(outcome, SubmitOutcome::Settled(Settlement::Replied));
        assert_eq!(
            contents(&controller),
            vec![
                (Role::User, "generate a block mesh for a cube".to_string()),
                (Role::Assistant, "Here is a blockMeshDict...".to_string()),
            ]
        );
        assert!(!controller.session().is_pending());
        assert_eq!(controller.session().draft_input(), "");
        assert_eq!(backend.seen()[0].0, AgentId::Mesh);
    }

    #[tokio::test]
    async fn failures_append_apology_and_return_to_idle() {
        let backend = ScriptedBackend::with(vec![
            Err(DispatchError::Status { status: 500, body: String::new() }),
            Err(DispatchError::MalformedResponse("missing".into())),
            Err(DispatchError::Transport("refused".into())),
        ]);
        let mut controller = controller(backend);

        for (i, expected) in [
            FailureKind::Transport,
            FailureKind::MalformedResponse,
            FailureKind::Transport,
        ]
        .into_iter()
        .enumerate()
        {
            controller.update_draft(format!("attempt {i}"));
            let outcome = controller.submit().await;
            assert_eq!(outcome, SubmitOutcome::Settled(Settlement::Failed(expected)));
            assert!(!controller.session().is_pending());

            let turns = contents(&controller);
            assert_eq!(turns.len(), 2 * (i + 1));
            assert_eq!(turns[2 * i], (Role::User, format!("attempt {i}")));
            assert_eq!(turns[2 * i + 1], (Role::Assistant, FAILURE_APOLOGY.to_string()));
        }
    }

    #[tokio::test]
    async fn blank_drafts_are_rejected_without_side_effects() {
        let backend = ScriptedBackend::with(vec![]);
        let mut controller = controller(backend.clone());

        for draft in ["", "   ", "\n\t "] {
            controller.update_draft(draft);
            let revision = controller.session().revision();

            let outcome = controller.submit().await;

            assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::EmptyDraft));
            assert_eq!(controller.session().revision(), revision);
            assert_eq!(controller.session().draft_input(), draft);
        }
        assert!(controller.session().transcript().is_empty());
        assert!(backend.seen().is_empty());
    }

    #[tokio::test]
    async fn submit_without_agent_is_rejected() {
        let backend = ScriptedBackend::with(vec![]);
        let mut controller = DispatchController::new(backend, None);
        controller.update_draft("hello");

        assert_eq!(
            controller.submit().await,
            SubmitOutcome::Rejected(Rejection::NoAgentSelected)
        );
        assert_eq!(controller.session().draft_input(), "hello");
    }

    #[test]
    fn submit_while_awaiting_is_ignored() {
        let backend = ScriptedBackend::with(vec![]);
        let mut controller = controller(backend);
        controller.update_draft("first");
        let exchange = controller.begin_submit().unwrap();

        controller.update_draft("second");
        let revision = controller.session().revision();
        let transcript = controller.session().transcript().clone();

        assert_eq!(controller.begin_submit().unwrap_err(), Rejection::Busy);
        assert_eq!(controller.session().revision(), revision);
        assert_eq!(controller.session().transcript(), &transcript);
        assert_eq!(controller.session().draft_input(), "second");
        assert_eq!(controller.session().phase().exchange(), Some(exchange.id));
    }

    #[tokio::test]
    async fn history_excludes_the_turn_being_sent() {
        let backend = ScriptedBackend::with(vec![Ok("first reply".into()), Ok("second reply".into())]);
        let mut controller = controller(backend.clone());

        controller.update_draft("first");
        controller.submit().await;
        controller.update_draft("second");
        controller.submit().await;

        let seen = backend.seen();
        assert_eq!(seen[0].1.message, "first");
        assert!(seen[0].1.history.is_empty());
        assert_eq!(seen[1].1.message, "second");
        assert_eq!(
            seen[1].1.history,
            vec![
                WireTurn { role: Role::User, content: "first".into() },
                WireTurn { role: Role::Assistant, content: "first reply".into() },
            ]
        );
    }

    #[test]
    fn result_of_abandoned_exchange_is_dropped() {
        let backend = ScriptedBackend::with(vec![]);
        let mut controller = controller(backend);
        controller.update_draft("mesh this");
        let exchange = controller.begin_submit().unwrap();

        controller.select_agent(AgentId::Simulation);
        let settlement = controller.settle(exchange.id, Ok("late reply".into()));

        assert_eq!(settlement, Settlement::Stale);
        assert!(controller.session().transcript().is_empty());
        assert!(!controller.session().is_pending());
    }

    #[test]
    fn settle_with_wrong_id_keeps_awaiting() {
        let backend = ScriptedBackend::with(vec![]);
        let mut controller = controller(backend);
        controller.update_draft("one");
        let exchange = controller.begin_submit().unwrap();

        let settlement = controller.settle(ExchangeId(exchange.id.0 + 1), Ok("nope".into()));

        assert_eq!(settlement, Settlement::Stale);
        assert!(controller.session().is_pending());
        assert_eq!(controller.session().transcript().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_times_out_into_apology() {
        let mut controller = DispatchController::new(Arc::new(SilentBackend), Some(Duration::from_secs(30)));
        controller.select_agent(AgentId::Cad);
        controller.update_draft("design a bracket");

        let outcome = controller.submit().await;

        assert_eq!(outcome, SubmitOutcome::Settled(Settlement::Failed(FailureKind::Timeout)));
        assert_eq!(
            contents(&controller)[1],
            (Role::Assistant, TIMEOUT_APOLOGY.to_string())
        );
        assert!(!controller.session().is_pending());
    }

    #[test]
    fn unknown_agent_id_leaves_session_untouched() {
        let backend = ScriptedBackend::with(vec![]);
        let mut controller = controller(backend);
        controller.update_draft("keep me");

        let err = controller.select_agent_by_id("thermal").unwrap_err();

        assert_eq!(err, RegistryError::UnknownAgent("thermal".into()));
        assert_eq!(controller.session().selected_agent().map(|a| a.id), Some(AgentId::Mesh));
        assert_eq!(controller.session().draft_input(), "keep me");
    }

    #[tokio::test]
    async fn switching_agents_discards_previous_transcript() {
        let backend = ScriptedBackend::with(vec![Ok("ok".into()), Ok("fresh".into())]);
        let mut controller = controller(backend.clone());
        controller.update_draft("hello mesh");
        controller.submit().await;
        assert_eq!(controller.session().transcript().len(), 2);

        controller.select_agent_by_id("cad").unwrap();
        assert!(controller.session().transcript().is_empty());

        controller.update_draft("hello cad");
        controller.submit().await;
        let seen = backend.seen();
        assert_eq!(seen[1].0, AgentId::Cad);
        assert!(seen[1].1.history.is_empty());
    }
}
