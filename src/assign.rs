//! Keyword-based auto-assignment of new tasks to agents.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::{self, ActivityAction};
use crate::gateway::{self, NotificationResult, TaskAssignment};
use crate::models::{Agent, AgentRole, AgentStatus, Priority, Project, Task, Team};
use crate::storage::{NewTask, Storage};
use crate::{Error, Result};

/// Role keyword table, in tie-break order.
pub const ROLE_KEYWORDS: &[(AgentRole, &[&str])] = &[
    (
        AgentRole::Backend,
        &[
            "api", "database", "server", "endpoint", "auth", "jwt", "prisma", "convex", "query",
            "mutation",
        ],
    ),
    (
        AgentRole::Frontend,
        &[
            "ui",
            "component",
            "react",
            "css",
            "style",
            "layout",
            "design",
            "responsive",
            "animation",
        ],
    ),
    (
        AgentRole::Fullstack,
        &["feature", "implement", "build", "create", "full", "integration"],
    ),
    (
        AgentRole::Qa,
        &["test", "bug", "fix", "verify", "validate", "quality", "regression"],
    ),
    (
        AgentRole::Devops,
        &["deploy", "ci", "cd", "docker", "kubernetes", "pipeline", "infrastructure"],
    ),
    (
        AgentRole::Research,
        &["research", "analyze", "investigate", "explore", "study", "compare"],
    ),
];

/// Role used when no keyword matches.
pub const DEFAULT_ROLE: AgentRole = AgentRole::Fullstack;

/// Name recorded as the assigner when the caller gives none.
pub const DEFAULT_ASSIGNER: &str = "evox";

/// Pick the role whose keywords occur most often in the title and description.
///
/// Keywords match as substrings of the lower-cased text. Ties keep the
/// earlier role in [`ROLE_KEYWORDS`]; no hits yield [`DEFAULT_ROLE`].
pub fn determine_role(title: &str, description: &str) -> AgentRole {
    let content = format!("{} {}", title, description).to_lowercase();

    let mut best = DEFAULT_ROLE;
    let mut max_hits = 0;
    for (role, keywords) in ROLE_KEYWORDS {
        let hits = keywords.iter().filter(|kw| content.contains(*kw)).count();
        if hits > max_hits {
            max_hits = hits;
            best = *role;
        }
    }
    best
}

/// Why an agent was picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    PreferredAgent,
    PreferredTeam(String),
    Role(AgentRole),
    Fallback(AgentRole),
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionReason::PreferredAgent => write!(f, "Preferred agent specified"),
            SelectionReason::PreferredTeam(team) => write!(f, "Best available in team: {}", team),
            SelectionReason::Role(role) => {
                write!(f, "Auto-assigned based on task content (role: {})", role)
            }
            SelectionReason::Fallback(role) => {
                write!(f, "No {} agent available; fell back to best available agent", role)
            }
        }
    }
}

/// First online member, else first idle, else first.
fn best_available<'a>(candidates: &[&'a Agent]) -> Option<&'a Agent> {
    candidates
        .iter()
        .find(|a| a.status == AgentStatus::Online)
        .or_else(|| candidates.iter().find(|a| a.status == AgentStatus::Idle))
        .or_else(|| candidates.first())
        .copied()
}

/// Choose an agent for a task of `role`.
///
/// Precedence: preferred agent by name, best available member of the
/// preferred team, best available agent with the role, then any non-offline
/// fullstack agent, any online agent, or the first agent. `None` only when
/// there are no agents.
pub fn select_agent(
    agents: &[Agent],
    teams: &[Team],
    role: AgentRole,
    preferred_agent: Option<&str>,
    preferred_team: Option<&str>,
) -> Option<(Agent, SelectionReason)> {
    if let Some(name) = preferred_agent {
        let wanted = name.trim().to_lowercase();
        if let Some(agent) = agents.iter().find(|a| a.name.to_lowercase() == wanted) {
            return Some((agent.clone(), SelectionReason::PreferredAgent));
        }
    }

    if let Some(team_name) = preferred_team {
        let wanted = team_name.trim().to_lowercase();
        if let Some(team) = teams.iter().find(|t| t.name.to_lowercase() == wanted) {
            let members: Vec<&Agent> = agents
                .iter()
                .filter(|a| a.team_id.as_deref() == Some(team.id.as_str()))
                .collect();
            if let Some(agent) = best_available(&members) {
                return Some((
                    agent.clone(),
                    SelectionReason::PreferredTeam(team.name.clone()),
                ));
            }
        }
    }

    let with_role: Vec<&Agent> = agents.iter().filter(|a| a.role == role).collect();
    if let Some(agent) = best_available(&with_role) {
        return Some((agent.clone(), SelectionReason::Role(role)));
    }

    agents
        .iter()
        .find(|a| a.role == AgentRole::Fullstack && a.status != AgentStatus::Offline)
        .or_else(|| agents.iter().find(|a| a.status == AgentStatus::Online))
        .or_else(|| agents.first())
        .map(|agent| (agent.clone(), SelectionReason::Fallback(role)))
}

/// One candidate in a suggestion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
    pub status: AgentStatus,
    pub recommended: bool,
    pub has_gateway: bool,
}

/// Suggestions for a task, without creating anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub determined_role: AgentRole,
    pub suggestions: Vec<Suggestion>,
}

/// Agents with the determined role or fullstack, recommended first, then by availability.
pub fn suggest(agents: &[Agent], title: &str, description: &str) -> Suggestions {
    let role = determine_role(title, description);
    let mut suggestions: Vec<Suggestion> = agents
        .iter()
        .filter(|a| a.role == role || a.role == AgentRole::Fullstack)
        .map(|a| Suggestion {
            id: a.id.clone(),
            name: a.name.clone(),
            role: a.role,
            status: a.status,
            recommended: a.role == role,
            has_gateway: a.gateway.is_some(),
        })
        .collect();
    suggestions.sort_by_key(|s| (!s.recommended, s.status.availability_rank()));

    Suggestions {
        determined_role: role,
        suggestions,
    }
}

/// Body of an auto-assign request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Project id, or project name
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub preferred_agent: Option<String>,
    #[serde(default)]
    pub preferred_team: Option<String>,
    #[serde(default)]
    pub assigned_by: Option<String>,
}

/// A created and assigned task, before notification.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub task: Task,
    pub agent: Agent,
    pub reason: SelectionReason,
    pub assigned_by: String,
}

/// `assignedTo` block of the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedAgent {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
    pub status: AgentStatus,
}

/// Response of a completed auto-assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub success: bool,
    pub task_id: String,
    pub assigned_to: AssignedAgent,
    pub auto_assign_reason: String,
    pub notification: NotificationResult,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn resolve_project(storage: &Storage, reference: &str) -> Result<Project> {
    match storage.get_project(reference) {
        Ok(project) => Ok(project),
        Err(Error::NotFound(_)) => storage
            .find_project_by_name(reference)?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", reference))),
        Err(e) => Err(e),
    }
}

/// Validate the request, pick an agent, and create the assigned task.
///
/// The task insert, the agent's `current_task` update and the `assigned_task`
/// activity commit together.
pub fn create_and_assign(storage: &mut Storage, request: &AssignRequest) -> Result<Assignment> {
    let (Some(title), Some(description), Some(priority), Some(project_ref)) = (
        required(&request.title),
        required(&request.description),
        required(&request.priority),
        required(&request.project_id),
    ) else {
        return Err(Error::Validation(
            "Missing required fields: title, description, priority, projectId".to_string(),
        ));
    };
    let priority: Priority = priority.parse().map_err(Error::Validation)?;
    let project = resolve_project(storage, project_ref)?;

    let agents = storage.list_agents()?;
    let teams = storage.list_teams()?;
    let role = determine_role(title, description);
    let (agent, reason) = select_agent(
        &agents,
        &teams,
        role,
        required(&request.preferred_agent),
        required(&request.preferred_team),
    )
    .ok_or_else(|| Error::NotFound("No suitable agent".to_string()))?;

    let assigned_by = required(&request.assigned_by)
        .unwrap_or(DEFAULT_ASSIGNER)
        .to_string();
    let task = storage.create_assigned_task(
        &NewTask {
            project_id: project.id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            priority,
            owner: None,
        },
        &agent.id,
        |task| {
            activity::entry(
                Some(&agent.id),
                ActivityAction::AssignedTask,
                &task.id,
                Some(json!({
                    "title": task.title,
                    "priority": task.priority,
                    "role": role,
                    "reason": reason.to_string(),
                    "assignedBy": assigned_by,
                })),
            )
        },
    )?;
    tracing::info!(task_id = %task.id, agent = %agent.name, reason = %reason, "task assigned");

    Ok(Assignment {
        task,
        agent,
        reason,
        assigned_by,
    })
}

impl Assignment {
    /// Notify the agent's gateway, if it has one, and build the response.
    pub async fn notify(self) -> AssignResponse {
        let notification = match self.agent.gateway {
            Some(ref config) => {
                let task = TaskAssignment {
                    task_id: &self.task.id,
                    title: &self.task.title,
                    description: &self.task.description,
                    priority: self.task.priority,
                    assigned_by: &self.assigned_by,
                };
                gateway::notify_assignment(config, &task).await
            }
            None => NotificationResult::not_configured(),
        };

        AssignResponse {
            success: true,
            task_id: self.task.id,
            assigned_to: AssignedAgent {
                id: self.agent.id,
                name: self.agent.name,
                role: self.agent.role,
                status: self.agent.status,
            },
            auto_assign_reason: self.reason.to_string(),
            notification,
        }
    }
}
