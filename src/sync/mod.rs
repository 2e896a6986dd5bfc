//! Tracker issue ingestion pipeline.
//!
//! Both the webhook and the bulk sync feed issues through the same steps:
//! validate the raw payload into an [`IssueSnapshot`], map status and
//! priority, resolve the owning agent, then upsert by external id.

pub mod bulk;
pub mod mapping;
pub mod owner;

pub use bulk::{SyncSummary, run_bulk_sync, sync_all};
pub use mapping::{map_priority, map_status};
pub use owner::{OwnerParser, OwnerSource, ParsedOwner};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::{self, ActivityAction};
use crate::config::Settings;
use crate::models::{Priority, Project, TaskStatus};
use crate::storage::{Storage, UpsertTask};
use crate::{Error, Result};

/// Title used when the tracker sends none.
pub const UNTITLED: &str = "Untitled";

/// State label used when the tracker sends none.
pub const DEFAULT_STATE: &str = "Todo";

/// `{ name }` reference inside tracker payloads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Issue as delivered by the tracker. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<NamedRef>,
    #[serde(default)]
    pub assignee: Option<NamedRef>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Validated issue with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueSnapshot {
    pub external_id: String,
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub state_name: String,
    pub assignee_name: Option<String>,
    pub priority: Option<f64>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssueSnapshot {
    /// Validate a raw issue. `id` and `identifier` are required.
    pub fn from_raw(raw: RawIssue) -> Result<Self> {
        let external_id = non_empty(raw.id)
            .ok_or_else(|| Error::Validation("issue is missing id".to_string()))?;
        let identifier = non_empty(raw.identifier).ok_or_else(|| {
            Error::Validation(format!("issue {} is missing identifier", external_id))
        })?;

        Ok(Self {
            external_id,
            identifier,
            title: non_empty(raw.title).unwrap_or_else(|| UNTITLED.to_string()),
            description: raw.description.unwrap_or_default(),
            state_name: non_empty(raw.state.and_then(|s| s.name))
                .unwrap_or_else(|| DEFAULT_STATE.to_string()),
            assignee_name: non_empty(raw.assignee.and_then(|a| a.name)),
            priority: raw.priority,
            url: non_empty(raw.url),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }

    pub fn status(&self) -> TaskStatus {
        map_status(&self.state_name)
    }

    pub fn priority(&self) -> Priority {
        map_priority(self.priority)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Which pipeline an issue came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOrigin {
    Webhook,
    BulkSync,
}

impl SyncOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOrigin::Webhook => "webhook",
            SyncOrigin::BulkSync => "bulk_sync",
        }
    }
}

/// Everything an upsert needs besides the issue itself.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Project synced tasks attach to
    pub project: Project,
    pub parser: OwnerParser,
    /// Linear workspace slug used to build missing issue URLs
    pub workspace: Option<String>,
}

impl SyncContext {
    /// Locate the target project and compile the owner parser.
    pub fn load(storage: &Storage, settings: &Settings) -> Result<Self> {
        let project = storage
            .find_project_by_name(&settings.target_project)?
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "{} project not found; run `evox seed` first",
                    settings.target_project
                ))
            })?;

        Ok(Self {
            project,
            parser: OwnerParser::new(&settings.roster)?,
            workspace: settings.linear.workspace.clone(),
        })
    }

    fn issue_url(&self, issue: &IssueSnapshot) -> Option<String> {
        issue.url.clone().or_else(|| {
            self.workspace
                .as_ref()
                .map(|ws| format!("https://linear.app/{}/issue/{}", ws, issue.identifier))
        })
    }
}

/// Result of pushing one issue through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedIssue {
    pub task_id: String,
    pub identifier: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub owner: ParsedOwner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub created: bool,
    pub status_changed: bool,
}

/// Map, resolve and upsert one issue.
///
/// A create or status change writes its activity in the upsert transaction.
pub fn apply_issue(
    storage: &mut Storage,
    ctx: &SyncContext,
    issue: &IssueSnapshot,
    origin: SyncOrigin,
) -> Result<AppliedIssue> {
    let status = issue.status();
    let priority = issue.priority();
    let owner = ctx
        .parser
        .parse(&issue.description, issue.assignee_name.as_deref());

    // A tracker assignee that names a stored agent is authoritative; otherwise
    // a parsed owner is explicit unless it came from the fallback.
    let tracker_agent = match issue.assignee_name.as_deref() {
        Some(name) => storage.find_agent_by_name(name)?,
        None => None,
    };
    let owner_agent = storage.find_agent_by_name(&owner.name)?;
    let (assignee, default_assignee) = match tracker_agent {
        Some(agent) => (Some(agent.id), None),
        None if owner.source.is_explicit_signal() => (owner_agent.map(|a| a.id), None),
        None => (None, owner_agent.map(|a| a.id)),
    };

    let now = Utc::now();
    let fields = UpsertTask {
        external_id: issue.external_id.clone(),
        external_display_id: issue.identifier.clone(),
        external_url: ctx.issue_url(issue),
        project_id: ctx.project.id.clone(),
        title: issue.title.clone(),
        description: issue.description.clone(),
        status,
        priority,
        owner: Some(owner.name.clone()),
        assignee,
        default_assignee,
        created_at: issue.created_at.unwrap_or(now),
        updated_at: issue.updated_at.unwrap_or(now),
    };

    let outcome = storage.upsert_task_by_external_id(&fields, |outcome| {
        let (action, metadata) = if outcome.created {
            (
                ActivityAction::CreatedTask,
                json!({
                    "identifier": issue.identifier,
                    "title": issue.title,
                    "status": status,
                    "priority": priority,
                    "owner": owner.name,
                    "origin": origin.as_str(),
                }),
            )
        } else if outcome.status_changed {
            (
                ActivityAction::StatusChanged,
                json!({
                    "identifier": issue.identifier,
                    "from": outcome.previous_status,
                    "to": status,
                    "origin": origin.as_str(),
                }),
            )
        } else {
            return None;
        };
        Some(activity::entry(
            outcome.assignee.as_deref(),
            action,
            &outcome.task_id,
            Some(metadata),
        ))
    })?;

    tracing::info!(
        identifier = %issue.identifier,
        origin = origin.as_str(),
        status = status.as_str(),
        owner = %owner.name,
        created = outcome.created,
        status_changed = outcome.status_changed,
        "issue synced"
    );

    Ok(AppliedIssue {
        task_id: outcome.task_id,
        identifier: issue.identifier.clone(),
        status,
        priority,
        owner,
        assignee: outcome.assignee,
        created: outcome.created,
        status_changed: outcome.status_changed,
    })
}
