//! Error types for the conversation core.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the agent registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The id is not one of the compiled-in agents.
    #[error("unknown agent: '{0}' (expected one of: cad, mesh, simulation)")]
    UnknownAgent(String),
}

/// Failures of a single backend exchange.
///
/// None of these reach the presentation layer as errors: the dispatch
/// controller turns every one of them into an assistant turn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Connection, DNS or IO failure before a response arrived.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Success status, but the body has no usable `response` string.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No answer within the configured bound.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Coarse classification of a [`DispatchError`], used for logging and for
/// picking the failure turn text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    MalformedResponse,
    Timeout,
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::Transport(_) | DispatchError::Status { .. } => FailureKind::Transport,
            DispatchError::MalformedResponse(_) => FailureKind::MalformedResponse,
            DispatchError::Timeout(_) => FailureKind::Timeout,
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DispatchError::MalformedResponse(err.to_string())
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}

/// Why a submission was not started. Rejections leave the session untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Draft input is empty after trimming.
    #[error("nothing to send")]
    EmptyDraft,

    /// An exchange is already outstanding.
    #[error("still waiting for the previous reply")]
    Busy,

    /// No agent has been selected yet.
    #[error("no agent selected")]
    NoAgentSelected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_classify_as_transport() {
        let err = DispatchError::Status {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.kind(), FailureKind::Transport);
        assert_eq!(err.to_string(), "backend returned HTTP 500: ");
    }

    #[test]
    fn timeout_keeps_its_own_kind() {
        let err = DispatchError::Timeout(Duration::from_secs(5));
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[test]
    fn unknown_agent_names_the_offending_id() {
        let err = RegistryError::UnknownAgent("thermal".to_string());
        assert!(err.to_string().contains("'thermal'"));
    }
}
