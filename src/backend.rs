//! Backend transport: one POST per exchange, one JSON reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::agent::AgentInfo;
use crate::error::DispatchError;
use crate::transcript::WireTurn;

/// Request body sent to an agent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The message just submitted.
    pub message: String,
    /// Prior turns only; never includes `message` itself.
    pub history: Vec<WireTurn>,
}

/// Something that can answer chat requests on behalf of an agent.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Send `request` to `agent` and return the reply text.
    async fn chat(&self, agent: &AgentInfo, request: &ChatRequest) -> Result<String, DispatchError>;

    /// Liveness probe. Returns the backend's status message.
    async fn health(&self) -> Result<String, DispatchError>;
}

/// `reqwest`-backed client for the agent HTTP service.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an agent's chat endpoint.
    pub fn endpoint_url(&self, agent: &AgentInfo) -> String {
        join_url(&self.base_url, agent.endpoint_path)
    }
}

/// Joins a base address and an absolute path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn chat(&self, agent: &AgentInfo, request: &ChatRequest) -> Result<String, DispatchError> {
        let url = self.endpoint_url(agent);
        debug!(%url, history = request.history.len(), "posting chat request");
        trace!(?request, "chat request body");

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        extract_reply(&text)
    }

    async fn health(&self) -> Result<String, DispatchError> {
        let url = join_url(&self.base_url, "/");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&response.text().await?)
            .map_err(|e| DispatchError::MalformedResponse(e.to_string()))?;
        Ok(value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("ok")
            .to_string())
    }
}

/// Pulls the `response` string out of a success body.
fn extract_reply(body: &str) -> Result<String, DispatchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DispatchError::MalformedResponse(format!("body is not JSON: {e}")))?;

    match value.get("response") {
        Some(Value::String(reply)) => Ok(reply.clone()),
        Some(other) => Err(DispatchError::MalformedResponse(format!(
            "`response` is not a string: {other}"
        ))),
        None => Err(DispatchError::MalformedResponse(
            "missing `response` field".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::error::FailureKind;
    use crate::transcript::Role;
    use mockito::{Matcher, Server};

    fn request() -> ChatRequest {
        ChatRequest {
            message: "refine the wall".to_string(),
            history: vec![
                WireTurn {
                    role: Role::User,
                    content: "mesh a pipe".to_string(),
                },
                WireTurn {
                    role: Role::Assistant,
                    content: "done".to_string(),
                },
            ],
        }
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://h:8000", "/agent/mesh/chat"), "http://h:8000/agent/mesh/chat");
        assert_eq!(join_url("http://h:8000/", "/agent/mesh/chat"), "http://h:8000/agent/mesh/chat");
        assert_eq!(join_url("http://h/api/", "agent/cad/chat"), "http://h/api/agent/cad/chat");
    }

    #[test]
    fn extract_reply_rules() {
        assert_eq!(extract_reply(r#"{"response":"hi"}"#).unwrap(), "hi");
        assert_eq!(extract_reply(r#"{"response":""}"#).unwrap(), "");
        assert!(matches!(extract_reply("{}"), Err(DispatchError::MalformedResponse(_))));
        assert!(matches!(extract_reply(r#"{"response":null}"#), Err(DispatchError::MalformedResponse(_))));
        assert!(matches!(extract_reply(r#"{"response":42}"#), Err(DispatchError::MalformedResponse(_))));
        assert!(matches!(extract_reply("<html>"), Err(DispatchError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn posts_message_and_history_to_agent_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/agent/mesh/chat")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "message": "refine the wall",
                "history": [
                    {"role": "user", "content": "mesh a pipe"},
                    {"role": "assistant", "content": "done"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response": "Here is a snappyHexMeshDict..."}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url()).unwrap();
        let reply = backend.chat(AgentId::Mesh.info(), &request()).await.unwrap();

        assert_eq!(reply, "Here is a snappyHexMeshDict...");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_a_status_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/agent/cad/chat")
            .with_status(500)
            .with_body(r#"{"detail": "boom"}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url()).unwrap();
        let err = backend.chat(AgentId::Cad.info(), &request()).await.unwrap_err();

        assert_eq!(
            err,
            DispatchError::Status {
                status: 500,
                body: r#"{"detail": "boom"}"#.to_string()
            }
        );
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[tokio::test]
    async fn success_without_response_field_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/agent/simulation/chat")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url()).unwrap();
        let err = backend
            .chat(AgentId::Simulation.info(), &request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::MalformedResponse);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_failure() {
        // Port 9 (discard) is closed on test hosts.
        let backend = HttpBackend::new("http://127.0.0.1:9").unwrap();
        let err = backend.chat(AgentId::Cad.info(), &request()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[tokio::test]
    async fn health_reads_root_message() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(r#"{"message": "Aerospace Design Agent backend is running."}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(format!("{}/", server.url())).unwrap();
        let message = backend.health().await.unwrap();
        assert_eq!(message, "Aerospace Design Agent backend is running.");
    }
}
