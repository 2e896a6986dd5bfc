//! Linear webhook ingestion.
//!
//! One delivery goes through: verify signature, filter entity type,
//! classify action, normalize the issue, then the shared sync pipeline.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;

use crate::config::Settings;
use crate::storage::Storage;
use crate::sync::{AppliedIssue, IssueSnapshot, RawIssue, SyncContext, SyncOrigin, apply_issue};
use crate::{Error, Result};

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "linear-signature";

type HmacSha256 = Hmac<Sha256>;

/// How a delivery's signature was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Verified,
    /// No secret configured; verification skipped
    Skipped,
}

/// Verify `signature` against the HMAC-SHA256 of `body` keyed by `secret`.
///
/// Comparison is constant time. Without a secret the check is skipped and a
/// warning is logged.
pub fn verify_signature(
    body: &[u8],
    signature: Option<&str>,
    secret: Option<&str>,
) -> Result<SignatureCheck> {
    let Some(secret) = secret else {
        tracing::warn!("LINEAR_WEBHOOK_SECRET not set, skipping signature verification");
        return Ok(SignatureCheck::Skipped);
    };

    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Authentication("Missing signature".to_string()))?;
    let provided =
        hex::decode(signature).map_err(|_| Error::Authentication("Invalid signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Configuration(format!("webhook secret: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| Error::Authentication("Invalid signature".to_string()))?;

    Ok(SignatureCheck::Verified)
}

/// Hex HMAC-SHA256 signature of `body`, as Linear sends it.
pub fn sign(body: &[u8], secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Configuration(format!("webhook secret: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Envelope of one Linear webhook delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
    /// Entity body; only decoded as an issue once the type is known
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub updated_from: Option<UpdatedFrom>,
}

/// Previous values of changed fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedFrom {
    #[serde(default)]
    pub state_id: Option<String>,
}

/// What happened to a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Processed(AppliedIssue),
    Skipped { reason: String },
}

impl WebhookOutcome {
    /// Response body for the endpoint.
    pub fn to_json(&self) -> Value {
        match self {
            WebhookOutcome::Processed(applied) => json!({
                "success": true,
                "linearIdentifier": applied.identifier,
                "taskId": applied.task_id,
                "status": applied.status,
                "created": applied.created,
                "statusChanged": applied.status_changed,
            }),
            WebhookOutcome::Skipped { reason } => json!({
                "success": true,
                "skipped": true,
                "reason": reason,
            }),
        }
    }
}

/// Result of the filter and classify stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Issue(IssueSnapshot),
    Skip(String),
}

/// Decode the raw body.
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("invalid webhook payload: {}", e)))
}

/// Keep issue creations and issue updates that move the workflow state.
pub fn classify(payload: WebhookPayload) -> Result<Classified> {
    let entity_type = payload.entity_type.as_deref().unwrap_or("unknown");
    if entity_type != "Issue" {
        return Ok(Classified::Skip(format!("Ignoring {} event", entity_type)));
    }

    let action = payload.action.as_deref().unwrap_or_default();
    let state_change = action == "update"
        && payload
            .updated_from
            .as_ref()
            .and_then(|u| u.state_id.as_deref())
            .is_some();
    if action != "create" && !state_change {
        return Ok(Classified::Skip(
            "Not a state change or create event".to_string(),
        ));
    }

    let data = payload
        .data
        .ok_or_else(|| Error::Validation("issue event has no data".to_string()))?;
    let raw: RawIssue = serde_json::from_value(data)
        .map_err(|e| Error::Validation(format!("invalid issue data: {}", e)))?;
    Ok(Classified::Issue(IssueSnapshot::from_raw(raw)?))
}

/// Run one delivery end to end.
///
/// Nothing is read from or written to storage before the signature passes.
pub fn process_webhook(
    storage: &mut Storage,
    settings: &Settings,
    body: &[u8],
    signature: Option<&str>,
) -> Result<WebhookOutcome> {
    if let Err(e) = verify_signature(body, signature, settings.webhook_secret.as_deref()) {
        tracing::warn!(stage = "verify", error = %e, "webhook rejected");
        return Err(e);
    }

    let payload = parse_payload(body)?;
    tracing::debug!(
        entity_type = payload.entity_type.as_deref().unwrap_or("unknown"),
        action = payload.action.as_deref().unwrap_or("unknown"),
        "webhook received"
    );

    let issue = match classify(payload)? {
        Classified::Issue(issue) => issue,
        Classified::Skip(reason) => {
            tracing::debug!(reason = %reason, "webhook skipped");
            return Ok(WebhookOutcome::Skipped { reason });
        }
    };

    let ctx = SyncContext::load(storage, settings).map_err(|e| {
        tracing::error!(identifier = %issue.identifier, stage = "locate_project", error = %e, "webhook failed");
        e
    })?;
    let applied = apply_issue(storage, &ctx, &issue, SyncOrigin::Webhook).map_err(|e| {
        tracing::error!(identifier = %issue.identifier, stage = "upsert", error = %e, "webhook failed");
        e
    })?;

    Ok(WebhookOutcome::Processed(applied))
}

/// Static description served on `GET`.
pub fn describe() -> Value {
    json!({
        "status": "ok",
        "endpoint": "/api/webhooks/linear",
        "description": "Linear webhook endpoint for real-time issue sync",
        "signatureHeader": SIGNATURE_HEADER,
        "setup": {
            "step1": "Go to Linear Settings → Webhooks",
            "step2": "Create a webhook pointing at <your host>/api/webhooks/linear",
            "step3": "Select events: Issue → State Change, Issue → Create",
            "step4": "Copy the signing secret to the LINEAR_WEBHOOK_SECRET environment variable",
        },
    })
}
