//! Bulk sync: pull every issue of the configured Linear project and upsert it.

use serde::Serialize;
use serde_json::json;

use crate::activity::{self, ActivityAction};
use crate::config::Settings;
use crate::linear::{IssuePage, LinearClient};
use crate::storage::Storage;
use crate::sync::{IssueSnapshot, RawIssue, SyncContext, SyncOrigin, apply_issue};
use crate::{Error, Result};

/// Counts for one bulk sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    /// The tracker held more issues than the fetch limit
    pub truncated: bool,
}

impl SyncSummary {
    pub fn message(&self) -> String {
        let mut message = format!(
            "Synced {} tasks: {} created, {} updated",
            self.total, self.created, self.updated
        );
        if self.truncated {
            message.push_str(" (more issues remain past the fetch limit)");
        }
        message
    }
}

/// Fetch the project's issues from Linear in one request.
///
/// Missing credentials are a configuration error; any API failure fails the run.
/// A page cut short by the fetch limit is logged at warn level.
pub async fn fetch_issues(settings: &Settings) -> Result<IssuePage> {
    let api_key = settings.linear.api_key.as_deref().ok_or_else(|| {
        Error::Configuration("LINEAR_API_KEY is not set".to_string())
    })?;
    let project_id = settings.linear.project_id.as_deref().ok_or_else(|| {
        Error::Configuration("Linear project id is not configured (LINEAR_PROJECT_ID)".to_string())
    })?;

    let client = LinearClient::new(settings.linear.api_url.clone(), api_key)?;
    let page = client
        .fetch_project_issues(project_id, settings.linear.fetch_limit)
        .await?;
    tracing::debug!(count = page.issues.len(), project_id, "fetched Linear issues");
    if page.has_next_page {
        tracing::warn!(
            fetched = page.issues.len(),
            limit = settings.linear.fetch_limit,
            project_id,
            "Linear project has more issues than the fetch limit; the rest are not synced"
        );
    }
    Ok(page)
}

/// Upsert a fetched batch, sequentially.
///
/// The first failing issue aborts the run with an error naming it; issues
/// already upserted stay committed and are picked up again by the next run.
pub fn run_bulk_sync(
    storage: &mut Storage,
    ctx: &SyncContext,
    issues: Vec<RawIssue>,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();

    for raw in issues {
        let label = raw
            .identifier
            .clone()
            .or_else(|| raw.id.clone())
            .unwrap_or_else(|| "<unknown>".to_string());

        let applied = IssueSnapshot::from_raw(raw)
            .and_then(|issue| apply_issue(storage, ctx, &issue, SyncOrigin::BulkSync))
            .map_err(|e| {
                tracing::error!(identifier = %label, stage = "upsert", error = %e, "bulk sync aborted");
                with_issue_context(e, &label)
            })?;

        summary.total += 1;
        if applied.created {
            summary.created += 1;
        } else {
            summary.updated += 1;
        }
    }

    let owner = storage.find_agent_by_name(ctx.parser.roster().default_owner())?;
    match owner {
        Some(ref agent) => storage.touch_agent_last_seen(&agent.id)?,
        None => tracing::warn!(
            owner = ctx.parser.roster().default_owner(),
            "default owner agent not found; last_seen not updated"
        ),
    }

    activity::record(
        storage,
        owner.as_ref().map(|a| a.id.as_str()),
        ActivityAction::BulkSync,
        &ctx.project.name,
        Some(json!({
            "total": summary.total,
            "created": summary.created,
            "updated": summary.updated,
        })),
    )?;

    tracing::info!(
        total = summary.total,
        created = summary.created,
        updated = summary.updated,
        "bulk sync complete"
    );
    Ok(summary)
}

/// Fetch and upsert every issue of the configured project.
pub async fn sync_all(storage: &mut Storage, settings: &Settings) -> Result<SyncSummary> {
    let ctx = SyncContext::load(storage, settings)?;
    let page = fetch_issues(settings).await?;
    let mut summary = run_bulk_sync(storage, &ctx, page.issues)?;
    summary.truncated = page.has_next_page;
    Ok(summary)
}

fn with_issue_context(err: Error, label: &str) -> Error {
    match err {
        Error::Validation(msg) => Error::Validation(format!("issue {}: {}", label, msg)),
        Error::NotFound(msg) => Error::NotFound(format!("issue {}: {}", label, msg)),
        Error::Configuration(msg) => Error::Configuration(format!("issue {}: {}", label, msg)),
        Error::Upstream(msg) => Error::Upstream(format!("issue {}: {}", label, msg)),
        other => Error::Other(format!("issue {}: {}", label, other)),
    }
}
