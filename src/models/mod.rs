//! Data models for EVOX entities.
//!
//! This module defines the core data structures:
//! - `Task` - Work items, optionally bound to an external tracker issue
//! - `Agent` - Worker identities with a role, presence status and optional gateway
//! - `Project` / `Team` - Grouping entities tasks and agents hang off
//! - `Activity` - Entries in the dashboard activity feed
//!
//! All timestamps serialize as epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status on the kanban board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backlog" => Ok(TaskStatus::Backlog),
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Role an agent plays on the team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Master,
    Pm,
    Backend,
    Frontend,
    Fullstack,
    Qa,
    Research,
    Devops,
}

impl AgentRole {
    /// All roles in declaration order.
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Master,
        AgentRole::Pm,
        AgentRole::Backend,
        AgentRole::Frontend,
        AgentRole::Fullstack,
        AgentRole::Qa,
        AgentRole::Research,
        AgentRole::Devops,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Master => "master",
            AgentRole::Pm => "pm",
            AgentRole::Backend => "backend",
            AgentRole::Frontend => "frontend",
            AgentRole::Fullstack => "fullstack",
            AgentRole::Qa => "qa",
            AgentRole::Research => "research",
            AgentRole::Devops => "devops",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AgentRole::ALL
            .iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown agent role: {}", s))
    }
}

/// Agent presence status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Idle,
    Busy,
    #[default]
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
        }
    }

    /// Sort rank for availability (lower is more available).
    pub fn availability_rank(&self) -> u8 {
        match self {
            AgentStatus::Online => 0,
            AgentStatus::Idle => 1,
            AgentStatus::Busy => 2,
            AgentStatus::Offline => 3,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(AgentStatus::Online),
            "idle" => Ok(AgentStatus::Idle),
            "busy" => Ok(AgentStatus::Busy),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(format!("Invalid agent status: {}", s)),
        }
    }
}

/// Connection details for pushing messages to an agent's gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub gateway_url: String,

    /// Bearer token; never serialized into API or CLI output
    #[serde(skip_serializing, default)]
    pub token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

/// A work item on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier (e.g., "tsk-1a2b3c4d5e6f")
    pub id: String,

    /// Owning project
    pub project_id: String,

    pub title: String,

    /// Detailed description (may be empty)
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    /// Assigned agent ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Canonical name of the agent that owns the ticket, as parsed from the tracker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Tracker-internal issue ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Human-facing tracker identifier (e.g., "AGT-159")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_display_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new local task with the given ID, project and title.
    pub fn new(id: String, project_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            title,
            description: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            assignee: None,
            owner: None,
            external_id: None,
            external_display_id: None,
            external_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A worker identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique identifier (e.g., "agt-1a2b3c4d5e6f")
    pub id: String,

    /// Display name; matched case-insensitively
    pub name: String,

    pub role: AgentRole,

    #[serde(default)]
    pub status: AgentStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// Task the agent is currently working on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: String, name: String, role: AgentRole) -> Self {
        Self {
            id,
            name,
            role,
            status: AgentStatus::default(),
            team_id: None,
            gateway: None,
            current_task: None,
            last_seen: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// An entry in the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,

    /// Agent the activity is attributed to, when one could be resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Action name (e.g., "created_task", "status_changed")
    pub action: String,

    /// What the action applied to (task ID, tracker identifier, ...)
    pub target: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_accepts_aliases() {
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("DONE".parse::<TaskStatus>(), Ok(TaskStatus::Done));
        assert!("closed".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Backend".parse::<AgentRole>(), Ok(AgentRole::Backend));
        assert_eq!(" qa ".parse::<AgentRole>(), Ok(AgentRole::Qa));
        assert!("designer".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_task_serializes_timestamps_as_millis() {
        let mut task = Task::new("tsk-1".into(), "prj-1".into(), "Title".into());
        task.created_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        task.updated_at = task.created_at;
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["createdAt"], 1_700_000_000_123i64);
        assert_eq!(json["status"], "todo");
        assert_eq!(json["priority"], "medium");
        assert!(json.get("assignee").is_none());
    }

    #[test]
    fn test_gateway_token_is_not_serialized() {
        let gateway = GatewayConfig {
            gateway_url: "http://gw".into(),
            token: "secret-token".into(),
            session_key: None,
        };
        let json = serde_json::to_string(&gateway).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("gatewayUrl"));
    }

    #[test]
    fn test_availability_rank_orders_statuses() {
        let mut statuses = vec![
            AgentStatus::Offline,
            AgentStatus::Busy,
            AgentStatus::Online,
            AgentStatus::Idle,
        ];
        statuses.sort_by_key(|s| s.availability_rank());
        assert_eq!(
            statuses,
            vec![
                AgentStatus::Online,
                AgentStatus::Idle,
                AgentStatus::Busy,
                AgentStatus::Offline
            ]
        );
    }
}
