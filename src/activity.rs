//! Activity feed entries written by the sync and assignment pipelines.
//!
//! Metadata is sanitized before it is persisted: secret-like keys are
//! redacted, long strings truncated and large arrays summarized.

use serde_json::Value;

use crate::Result;
use crate::models::Activity;
use crate::storage::{NewActivity, Storage};

/// Activity actions recorded by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    CreatedTask,
    StatusChanged,
    AssignedTask,
    BulkSync,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::CreatedTask => "created_task",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::AssignedTask => "assigned_task",
            ActivityAction::BulkSync => "bulk_sync",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const MAX_STRING_CHARS: usize = 100;
const MAX_ARRAY_ITEMS: usize = 10;

/// Build an activity row with sanitized metadata.
///
/// Used directly when the entry must commit with a task write.
pub fn entry(
    agent: Option<&str>,
    action: ActivityAction,
    target: &str,
    metadata: Option<Value>,
) -> NewActivity {
    NewActivity {
        agent: agent.map(str::to_string),
        action: action.as_str().to_string(),
        target: target.to_string(),
        metadata: metadata.as_ref().map(sanitize_metadata),
    }
}

/// Record a standalone activity with sanitized metadata.
pub fn record(
    storage: &mut Storage,
    agent: Option<&str>,
    action: ActivityAction,
    target: &str,
    metadata: Option<Value>,
) -> Result<Activity> {
    let activity = storage.record_activity(entry(agent, action, target, metadata))?;
    tracing::debug!(
        action = action.as_str(),
        target = target,
        agent = agent.unwrap_or("-"),
        "activity recorded"
    );
    Ok(activity)
}

/// Sanitize metadata to remove sensitive data.
pub fn sanitize_metadata(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let key_lower = key.to_lowercase();
                if key_lower.contains("password")
                    || key_lower.contains("token")
                    || key_lower.contains("key")
                    || key_lower.contains("secret")
                    || key_lower.contains("signature")
                {
                    sanitized.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize_metadata(value));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => {
            if arr.len() > MAX_ARRAY_ITEMS {
                Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                Value::Array(arr.iter().map(sanitize_metadata).collect())
            }
        }
        Value::String(s) => {
            let len = s.chars().count();
            if len > MAX_STRING_CHARS {
                let head: String = s.chars().take(MAX_STRING_CHARS - 3).collect();
                Value::String(format!("{}... ({} chars)", head, len))
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}
