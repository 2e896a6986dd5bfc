//! Command implementations for the EVOX CLI.
//!
//! Each command returns a value implementing [`Output`], printed as JSON by
//! default or as plain text with `-H`. Commands are grouped by entity:
//! - `seed` / `sync` - Pipeline setup and bulk sync
//! - `assign` / `suggest` - Auto-assignment
//! - `task_*`, `agent_*`, `team_*`, `project_*` - Minimal administration
//! - `activity_list`, `config_show` - Inspection

use serde::Serialize;

use crate::assign::{self, AssignRequest, AssignResponse, Suggestions};
use crate::config::{Settings, masked};
use crate::models::{Activity, Agent, AgentRole, AgentStatus, GatewayConfig, Project, Task, TaskStatus, Team};
use crate::storage::Storage;
use crate::sync::{self, SyncSummary};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_of<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
}

fn format_time(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

// === Seed ===

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub project: Project,
    pub project_created: bool,
    pub agents_created: Vec<String>,
    pub agents_existing: Vec<String>,
}

impl Output for SeedResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.project_created {
            lines.push(format!("Created project {} ({})", self.project.name, self.project.id));
        } else {
            lines.push(format!("Project {} already exists", self.project.name));
        }
        if !self.agents_created.is_empty() {
            lines.push(format!("Created agents: {}", self.agents_created.join(", ")));
        }
        if !self.agents_existing.is_empty() {
            lines.push(format!("Existing agents: {}", self.agents_existing.join(", ")));
        }
        lines.join("\n")
    }
}

/// Create the target project and one agent per roster entry, skipping what exists.
pub fn seed(storage: &mut Storage, settings: &Settings) -> Result<SeedResult> {
    let (project, project_created) = match storage.find_project_by_name(&settings.target_project)? {
        Some(project) => (project, false),
        None => (storage.create_project(&settings.target_project, None)?, true),
    };

    let mut agents_created = Vec::new();
    let mut agents_existing = Vec::new();
    for (role, name) in settings.roster.entries() {
        match storage.find_agent_by_name(name)? {
            Some(agent) => agents_existing.push(agent.name),
            None => {
                let agent = storage.create_agent(&name.to_uppercase(), *role, None)?;
                tracing::info!(agent = %agent.name, role = %role, "seeded agent");
                agents_created.push(agent.name);
            }
        }
    }

    Ok(SeedResult {
        project,
        project_created,
        agents_created,
        agents_existing,
    })
}

// === Sync ===

impl Output for SyncSummary {
    fn to_json(&self) -> String {
        json_of(&serde_json::json!({
            "success": true,
            "total": self.total,
            "created": self.created,
            "updated": self.updated,
            "truncated": self.truncated,
            "message": self.message(),
        }))
    }

    fn to_human(&self) -> String {
        self.message()
    }
}

/// Run a bulk sync against Linear.
pub async fn sync(storage: &mut Storage, settings: &Settings) -> Result<SyncSummary> {
    sync::sync_all(storage, settings).await
}

// === Assignment ===

impl Output for AssignResponse {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!(
                "Created {} and assigned it to {} ({})",
                self.task_id, self.assigned_to.name, self.assigned_to.role
            ),
            format!("Reason: {}", self.auto_assign_reason),
        ];
        let n = &self.notification;
        if n.sent {
            lines.push("Notification: sent".to_string());
        } else if let Some(ref error) = n.error {
            lines.push(format!("Notification failed: {}", error));
        } else if let Some(ref reason) = n.reason {
            lines.push(format!("Notification skipped: {}", reason));
        }
        lines.join("\n")
    }
}

/// Create a task, pick an agent and notify its gateway.
pub async fn assign(storage: &mut Storage, request: &AssignRequest) -> Result<AssignResponse> {
    let assignment = assign::create_and_assign(storage, request)?;
    Ok(assignment.notify().await)
}

impl Output for Suggestions {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Determined role: {}", self.determined_role)];
        if self.suggestions.is_empty() {
            lines.push("No matching agents.".to_string());
        }
        for s in &self.suggestions {
            lines.push(format!(
                "  {} {} [{}] {}{}",
                if s.recommended { "*" } else { " " },
                s.name,
                s.role,
                s.status,
                if s.has_gateway { " (gateway)" } else { "" }
            ));
        }
        lines.join("\n")
    }
}

pub fn suggest(storage: &Storage, title: &str, description: &str) -> Result<Suggestions> {
    let agents = storage.list_agents()?;
    Ok(assign::suggest(&agents, title, description))
}

// === Tasks ===

#[derive(Debug, Serialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub count: usize,
}

impl Output for TaskList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut lines = vec![format!("{} task(s):", self.count)];
        for task in &self.tasks {
            let external = task
                .external_display_id
                .as_deref()
                .map(|id| format!(" ({})", id))
                .unwrap_or_default();
            lines.push(format!(
                "  {} [{}] [{}] {}{}",
                task.id, task.status, task.priority, task.title, external
            ));
        }
        lines.join("\n")
    }
}

pub fn task_list(storage: &Storage, status: Option<TaskStatus>) -> Result<TaskList> {
    let tasks = storage.list_tasks(status)?;
    Ok(TaskList {
        count: tasks.len(),
        tasks,
    })
}

impl Output for Task {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} {}", self.id, self.title),
            format!("  Status:   {}", self.status),
            format!("  Priority: {}", self.priority),
        ];
        if let Some(ref assignee) = self.assignee {
            lines.push(format!("  Assignee: {}", assignee));
        }
        if let Some(ref owner) = self.owner {
            lines.push(format!("  Owner:    {}", owner));
        }
        if let Some(ref id) = self.external_display_id {
            lines.push(format!("  Linear:   {}", id));
        }
        if let Some(ref url) = self.external_url {
            lines.push(format!("  URL:      {}", url));
        }
        lines.push(format!("  Updated:  {}", format_time(self.updated_at)));
        if !self.description.is_empty() {
            lines.push(String::new());
            lines.push(self.description.clone());
        }
        lines.join("\n")
    }
}

pub fn task_show(storage: &Storage, id: &str) -> Result<Task> {
    storage.get_task(id)
}

/// Manually reassign a task to a named agent.
pub fn task_assign(storage: &mut Storage, id: &str, agent_name: &str) -> Result<Task> {
    let agent = find_agent(storage, agent_name)?;
    storage.assign_task(id, &agent.id)?;
    tracing::info!(task_id = id, agent = %agent.name, "task reassigned");
    storage.get_task(id)
}

// === Agents ===

impl Output for Agent {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut line = format!("{} {} [{}] {}", self.id, self.name, self.role, self.status);
        if let Some(ref task) = self.current_task {
            line.push_str(&format!(" working on {}", task));
        }
        if let Some(ref gateway) = self.gateway {
            line.push_str(&format!(" gateway={}", gateway.gateway_url));
        }
        line
    }
}

#[derive(Debug, Serialize)]
pub struct AgentList {
    pub agents: Vec<Agent>,
    pub count: usize,
}

impl Output for AgentList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents registered.".to_string();
        }
        let mut lines = vec![format!("{} agent(s):", self.count)];
        for agent in &self.agents {
            lines.push(format!(
                "  {} (last seen {})",
                agent.to_human(),
                format_time(agent.last_seen)
            ));
        }
        lines.join("\n")
    }
}

fn find_agent(storage: &Storage, name: &str) -> Result<Agent> {
    storage
        .find_agent_by_name(name)?
        .ok_or_else(|| Error::NotFound(format!("Agent not found: {}", name)))
}

/// Gateway options for `agent add`.
#[derive(Debug, Default)]
pub struct GatewayArgs {
    pub url: Option<String>,
    pub token: Option<String>,
    pub session_key: Option<String>,
}

impl GatewayArgs {
    fn into_config(self) -> Result<Option<GatewayConfig>> {
        match (self.url, self.token) {
            (None, None) => Ok(None),
            (Some(gateway_url), Some(token)) => Ok(Some(GatewayConfig {
                gateway_url,
                token,
                session_key: self.session_key,
            })),
            _ => Err(Error::Validation(
                "--gateway-url and --token must be given together".to_string(),
            )),
        }
    }
}

pub fn agent_add(
    storage: &mut Storage,
    name: &str,
    role: AgentRole,
    team: Option<&str>,
    gateway: GatewayArgs,
) -> Result<Agent> {
    let gateway = gateway.into_config()?;
    let team_id = match team {
        Some(team) => Some(
            storage
                .find_team_by_name(team)?
                .ok_or_else(|| Error::NotFound(format!("Team not found: {}", team)))?
                .id,
        ),
        None => None,
    };

    let agent = storage.create_agent(name, role, team_id.as_deref())?;
    if gateway.is_some() {
        storage.set_agent_gateway(&agent.id, gateway.as_ref())?;
    }
    storage.get_agent(&agent.id)
}

pub fn agent_list(storage: &Storage) -> Result<AgentList> {
    let agents = storage.list_agents()?;
    Ok(AgentList {
        count: agents.len(),
        agents,
    })
}

/// Heartbeat: set status and refresh `last_seen`.
pub fn agent_status(storage: &mut Storage, name: &str, status: AgentStatus) -> Result<Agent> {
    let agent = find_agent(storage, name)?;
    storage.set_agent_status(&agent.id, status)?;
    storage.get_agent(&agent.id)
}

// === Teams & projects ===

impl Output for Team {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!("{} {}", self.id, self.name)
    }
}

#[derive(Debug, Serialize)]
pub struct TeamList {
    pub teams: Vec<Team>,
}

impl Output for TeamList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.teams.is_empty() {
            return "No teams.".to_string();
        }
        self.teams
            .iter()
            .map(Output::to_human)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn team_add(storage: &mut Storage, name: &str) -> Result<Team> {
    storage.create_team(name)
}

pub fn team_list(storage: &Storage) -> Result<TeamList> {
    Ok(TeamList {
        teams: storage.list_teams()?,
    })
}

impl Output for Project {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        match self.description {
            Some(ref d) => format!("{} {} - {}", self.id, self.name, d),
            None => format!("{} {}", self.id, self.name),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
}

impl Output for ProjectList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects.".to_string();
        }
        self.projects
            .iter()
            .map(Output::to_human)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn project_add(storage: &mut Storage, name: &str, description: Option<&str>) -> Result<Project> {
    storage.create_project(name, description)
}

pub fn project_list(storage: &Storage) -> Result<ProjectList> {
    Ok(ProjectList {
        projects: storage.list_projects()?,
    })
}

// === Activity ===

#[derive(Debug, Serialize)]
pub struct ActivityList {
    pub activities: Vec<Activity>,
}

impl Output for ActivityList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.activities.is_empty() {
            return "No activity.".to_string();
        }
        self.activities
            .iter()
            .map(|a| {
                format!(
                    "{} {:<15} {} {}",
                    format_time(a.created_at),
                    a.action,
                    a.target,
                    a.agent.as_deref().unwrap_or("-")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn activity_list(storage: &Storage, limit: Option<usize>) -> Result<ActivityList> {
    Ok(ActivityList {
        activities: storage.list_activities(limit)?,
    })
}

// === Config ===

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: Option<String>,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigShow {
    pub settings: Vec<ConfigEntry>,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        self.settings
            .iter()
            .map(|e| {
                format!(
                    "{:<20} {:<40} ({})",
                    e.key,
                    e.value.as_deref().unwrap_or("(not set)"),
                    e.source
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Resolved settings with their sources. Secrets are masked.
pub fn config_show(settings: &Settings) -> ConfigShow {
    let roster = settings
        .roster
        .entries()
        .iter()
        .map(|(role, name)| format!("{}={}", role, name))
        .collect::<Vec<_>>()
        .join(", ");
    let linear = &settings.linear;

    let values: Vec<(&'static str, Option<String>)> = vec![
        ("database", Some(settings.database.display().to_string())),
        ("host", Some(settings.host.clone())),
        ("port", Some(settings.port.to_string())),
        ("target_project", Some(settings.target_project.clone())),
        ("webhook_secret", settings.webhook_secret.as_deref().map(masked)),
        ("linear.api_url", Some(linear.api_url.clone())),
        ("linear.api_key", linear.api_key.as_deref().map(masked)),
        ("linear.project_id", linear.project_id.clone()),
        ("linear.workspace", linear.workspace.clone()),
        ("linear.fetch_limit", Some(linear.fetch_limit.to_string())),
        ("roster", Some(roster)),
        ("log_level", Some(settings.log_level.clone())),
        ("log_format", Some(settings.log_format.to_string())),
        ("log_dir", settings.log_dir.as_ref().map(|d| d.display().to_string())),
    ];

    ConfigShow {
        settings: values
            .into_iter()
            .map(|(key, value)| ConfigEntry {
                key,
                value,
                source: settings.source_of(key).to_string(),
            })
            .collect(),
    }
}
