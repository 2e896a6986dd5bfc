//! Agent gateway notifications.
//!
//! Agents with a gateway expose an OpenAI-compatible chat endpoint. After an
//! assignment the agent is sent a task message; failures are reported in the
//! result and never fail the assignment itself.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::models::{GatewayConfig, Priority};

/// Session key used when the agent does not configure one.
pub const DEFAULT_SESSION_KEY: &str = "nexus-task";

const SESSION_HEADER: &str = "x-openclaw-session-key";
const MODEL: &str = "openclaw";
const USER_AGENT: &str = concat!("evox/", env!("CARGO_PKG_VERSION"));

/// Longest reply excerpt kept in a notification result.
const REPLY_LIMIT: usize = 200;

/// Errors from an agent gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to initialize gateway HTTP client: {0}")]
    Client(String),

    #[error("gateway request failed: {0}")]
    Http(String),

    #[error("Gateway error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse gateway response: {0}")]
    Parse(String),
}

impl From<GatewayError> for crate::Error {
    fn from(err: GatewayError) -> Self {
        crate::Error::Upstream(err.to_string())
    }
}

/// Task details sent to the assigned agent.
#[derive(Debug, Clone)]
pub struct TaskAssignment<'a> {
    pub task_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
    pub assigned_by: &'a str,
}

/// Outcome of a notification attempt, as reported to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationResult {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NotificationResult {
    pub fn not_configured() -> Self {
        Self {
            sent: false,
            response: None,
            error: None,
            reason: Some("Agent has no gateway config".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Markdown message announcing a new assignment.
pub fn assignment_message(task: &TaskAssignment<'_>) -> String {
    let context = format!(
        "[From: {}] [Task: {}] [Priority: {}]",
        task.assigned_by, task.title, task.priority
    );
    format!(
        "{}\n\n## New Task Assignment\n\n\
         **Task ID:** {}\n\
         **Title:** {}\n\
         **Priority:** {}\n\
         **Assigned by:** {}\n\n\
         ### Description:\n{}\n\n\
         ---\n\
         Please acknowledge receipt and provide your initial plan for completing this task.\n",
        context,
        task.task_id,
        task.title,
        task.priority.as_str().to_uppercase(),
        task.assigned_by,
        task.description
    )
}

/// Send one chat message to the gateway and return the agent's reply.
pub async fn send_message(config: &GatewayConfig, message: &str) -> Result<String, GatewayError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| GatewayError::Client(e.to_string()))?;

    let session_key = config
        .session_key
        .as_deref()
        .unwrap_or(DEFAULT_SESSION_KEY);
    let url = format!(
        "{}/v1/chat/completions",
        config.gateway_url.trim_end_matches('/')
    );

    let response = client
        .post(&url)
        .bearer_auth(&config.token)
        .header(SESSION_HEADER, session_key)
        .json(&json!({
            "model": MODEL,
            "messages": [{ "role": "user", "content": message }],
            "user": session_key,
        }))
        .send()
        .await
        .map_err(|e| GatewayError::Http(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(GatewayError::Status {
            status: status.as_u16(),
            body: truncate(&body, REPLY_LIMIT),
        });
    }

    let completion: ChatCompletion =
        serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    Ok(completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_else(|| "No response from agent.".to_string()))
}

/// Notify an agent of a new assignment. Never fails; errors land in the result.
pub async fn notify_assignment(
    config: &GatewayConfig,
    task: &TaskAssignment<'_>,
) -> NotificationResult {
    match send_message(config, &assignment_message(task)).await {
        Ok(reply) => {
            tracing::info!(task_id = task.task_id, gateway = %config.gateway_url, "agent notified");
            NotificationResult {
                sent: true,
                response: Some(truncate(&reply, REPLY_LIMIT)),
                error: None,
                reason: None,
            }
        }
        Err(e) => {
            tracing::warn!(task_id = task.task_id, gateway = %config.gateway_url, error = %e, "agent notification failed");
            NotificationResult {
                sent: false,
                response: None,
                error: Some(e.to_string()),
                reason: None,
            }
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskAssignment<'static> {
        TaskAssignment {
            task_id: "tsk-1234abcd5678",
            title: "Add login endpoint",
            description: "JWT based",
            priority: Priority::High,
            assigned_by: "max",
        }
    }

    fn gateway(url: String) -> GatewayConfig {
        GatewayConfig {
            gateway_url: url,
            token: "gw-token".to_string(),
            session_key: None,
        }
    }

    #[test]
    fn test_assignment_message_format() {
        let message = assignment_message(&task());
        assert!(message.starts_with("[From: max] [Task: Add login endpoint] [Priority: high]"));
        assert!(message.contains("## New Task Assignment"));
        assert!(message.contains("**Task ID:** tsk-1234abcd5678"));
        assert!(message.contains("**Priority:** HIGH"));
        assert!(message.contains("### Description:\nJWT based"));
        assert!(message.contains("Please acknowledge receipt"));
    }

    #[tokio::test]
    async fn test_notify_success_truncates_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer gw-token")
            .match_header("x-openclaw-session-key", DEFAULT_SESSION_KEY)
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "openclaw",
                "user": DEFAULT_SESSION_KEY
            })))
            .with_status(200)
            .with_body(
                json!({ "choices": [{ "message": { "content": "a".repeat(300) } }] }).to_string(),
            )
            .create_async()
            .await;

        // Trailing slash on the configured URL is tolerated.
        let result = notify_assignment(&gateway(format!("{}/", server.url())), &task()).await;
        mock.assert_async().await;
        assert!(result.sent);
        assert_eq!(result.response.unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_notify_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let result = notify_assignment(&gateway(server.url()), &task()).await;
        assert!(!result.sent);
        assert_eq!(result.error.as_deref(), Some("Gateway error: 502 - bad gateway"));
    }

    #[tokio::test]
    async fn test_empty_choices_yield_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let reply = send_message(&gateway(server.url()), "hi").await.unwrap();
        assert_eq!(reply, "No response from agent.");
    }
}
