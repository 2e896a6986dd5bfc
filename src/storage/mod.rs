//! Storage layer for EVOX data.
//!
//! All records live in one SQLite database (`evox.db`):
//!
//! - `projects`, `teams`, `agents` - administrative records
//! - `tasks` - board tasks, optionally bound to an external tracker issue
//! - `activities` - append-only activity feed
//!
//! `tasks.external_id` is UNIQUE, so a tracker issue maps to at most one task.
//! Writes that touch both a task's assignee and an agent's `current_task`
//! run in a single transaction.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};

use crate::models::{
    Activity, Agent, AgentRole, AgentStatus, GatewayConfig, Priority, Project, Task, TaskStatus,
    Team,
};
use crate::{Error, Result};

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, assignee, owner, \
     external_id, external_display_id, external_url, created_at, updated_at";

const AGENT_COLUMNS: &str = "id, name, role, status, team_id, gateway_url, gateway_token, \
     gateway_session_key, current_task, last_seen";

/// Fields for creating or updating a task from a tracker issue.
#[derive(Debug, Clone)]
pub struct UpsertTask {
    pub external_id: String,
    pub external_display_id: String,
    pub external_url: Option<String>,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// Canonical name of the agent the issue text points at
    pub owner: Option<String>,
    /// Resolved agent id; overwrites the stored assignee when present
    pub assignee: Option<String>,
    /// Agent id used only when the task is created without an explicit assignee
    pub default_assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of [`Storage::upsert_task_by_external_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub task_id: String,
    pub created: bool,
    pub status_changed: bool,
    /// Status before the update (`None` on create)
    pub previous_status: Option<TaskStatus>,
    /// Assignee after the write
    pub assignee: Option<String>,
}

/// Fields for a task created directly by auto-assignment.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub owner: Option<String>,
}

/// Activity row written in the same transaction as the change it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub agent: Option<String>,
    pub action: String,
    pub target: String,
    pub metadata: Option<serde_json::Value>,
}

/// Storage manager over the EVOX SQLite database.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_name
                ON projects(name COLLATE NOCASE);

            CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_teams_name
                ON teams(name COLLATE NOCASE);

            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'offline',
                team_id TEXT REFERENCES teams(id),
                gateway_url TEXT,
                gateway_token TEXT,
                gateway_session_key TEXT,
                current_task TEXT,
                last_seen INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_name
                ON agents(name COLLATE NOCASE);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id),
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'todo',
                priority TEXT NOT NULL DEFAULT 'medium',
                assignee TEXT REFERENCES agents(id),
                owner TEXT,
                external_id TEXT,
                external_display_id TEXT,
                external_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_external_id ON tasks(external_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);

            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                agent TEXT,
                action TEXT NOT NULL,
                target TEXT NOT NULL,
                metadata TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activities_created ON activities(created_at);
            "#,
        )?;
        Ok(())
    }

    // === Project Operations ===

    /// Create a project. Names are unique, case-insensitive.
    pub fn create_project(&mut self, name: &str, description: Option<&str>) -> Result<Project> {
        let name = require_name("Project", name)?;
        if self.find_project_by_name(name)?.is_some() {
            return Err(Error::Validation(format!("Project already exists: {}", name)));
        }

        let project = Project {
            id: generate_id("prj", name),
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO projects (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                project.id,
                project.name,
                project.description,
                project.created_at.timestamp_millis()
            ],
        )?;
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Project> {
        self.conn
            .query_row(
                "SELECT id, name, description, created_at FROM projects WHERE id = ?1",
                [id],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", id)))
    }

    pub fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, description, created_at FROM projects
                 WHERE name = ?1 COLLATE NOCASE",
                [name.trim()],
                project_from_row,
            )
            .optional()?)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at FROM projects ORDER BY created_at, rowid",
        )?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    // === Team Operations ===

    pub fn create_team(&mut self, name: &str) -> Result<Team> {
        let name = require_name("Team", name)?;
        if self.find_team_by_name(name)?.is_some() {
            return Err(Error::Validation(format!("Team already exists: {}", name)));
        }

        let team = Team {
            id: generate_id("team", name),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO teams (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![team.id, team.name, team.created_at.timestamp_millis()],
        )?;
        Ok(team)
    }

    pub fn find_team_by_name(&self, name: &str) -> Result<Option<Team>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM teams WHERE name = ?1 COLLATE NOCASE",
                [name.trim()],
                team_from_row,
            )
            .optional()?)
    }

    pub fn list_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM teams ORDER BY created_at, rowid")?;
        let teams = stmt
            .query_map([], team_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    // === Agent Operations ===

    /// Create an agent. Names are unique, case-insensitive.
    pub fn create_agent(
        &mut self,
        name: &str,
        role: AgentRole,
        team_id: Option<&str>,
    ) -> Result<Agent> {
        let name = require_name("Agent", name)?;
        if self.find_agent_by_name(name)?.is_some() {
            return Err(Error::Validation(format!("Agent already exists: {}", name)));
        }

        let mut agent = Agent::new(generate_id("agt", name), name.to_string(), role);
        agent.team_id = team_id.map(|t| t.to_string());
        self.conn.execute(
            "INSERT INTO agents (id, name, role, status, team_id, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                agent.id,
                agent.name,
                agent.role.as_str(),
                agent.status.as_str(),
                agent.team_id,
                agent.last_seen.timestamp_millis()
            ],
        )?;
        Ok(agent)
    }

    pub fn get_agent(&self, id: &str) -> Result<Agent> {
        let sql = format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], agent_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Agent not found: {}", id)))
    }

    /// Find an agent by name, case-insensitive.
    pub fn find_agent_by_name(&self, name: &str) -> Result<Option<Agent>> {
        let sql = format!(
            "SELECT {} FROM agents WHERE name = ?1 COLLATE NOCASE",
            AGENT_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, [name.trim()], agent_from_row)
            .optional()?)
    }

    /// All agents in creation order.
    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let sql = format!("SELECT {} FROM agents ORDER BY rowid", AGENT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let agents = stmt
            .query_map([], agent_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    /// Record a heartbeat: set the status and touch `last_seen`.
    pub fn set_agent_status(&mut self, id: &str, status: AgentStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE agents SET status = ?2, last_seen = ?3 WHERE id = ?1",
            params![id, status.as_str(), Utc::now().timestamp_millis()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Agent not found: {}", id)));
        }
        Ok(())
    }

    pub fn touch_agent_last_seen(&mut self, id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE agents SET last_seen = ?2 WHERE id = ?1",
            params![id, Utc::now().timestamp_millis()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Agent not found: {}", id)));
        }
        Ok(())
    }

    /// Set or clear the agent's notification gateway.
    pub fn set_agent_gateway(&mut self, id: &str, gateway: Option<&GatewayConfig>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE agents SET gateway_url = ?2, gateway_token = ?3, gateway_session_key = ?4
             WHERE id = ?1",
            params![
                id,
                gateway.map(|g| g.gateway_url.as_str()),
                gateway.map(|g| g.token.as_str()),
                gateway.and_then(|g| g.session_key.as_deref())
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Agent not found: {}", id)));
        }
        Ok(())
    }

    // === Task Operations ===

    pub fn get_task(&self, id: &str) -> Result<Task> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        self.conn
            .query_row(&sql, [id], task_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Task not found: {}", id)))
    }

    pub fn find_task_by_external_id(&self, external_id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE external_id = ?1", TASK_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [external_id], task_from_row)
            .optional()?)
    }

    /// Tasks, most recently updated first, optionally filtered by status.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
        if status.is_some() {
            sql.push_str(" WHERE status = ?1");
        }
        sql.push_str(" ORDER BY updated_at DESC, rowid DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match status {
            Some(status) => stmt.query_map([status.as_str()], task_from_row)?,
            None => stmt.query_map([], task_from_row)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count_tasks(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Create or update the task bound to `fields.external_id`.
    ///
    /// Tracker-origin fields are always patched. The assignee is only
    /// replaced when `fields.assignee` is set; `default_assignee` applies to
    /// new tasks only. The read, the write, the agent `current_task`
    /// bookkeeping and the activity returned by `activity` commit together:
    /// if any of them fails nothing is written.
    pub fn upsert_task_by_external_id<F>(
        &mut self,
        fields: &UpsertTask,
        activity: F,
    ) -> Result<UpsertOutcome>
    where
        F: FnOnce(&UpsertOutcome) -> Option<NewActivity>,
    {
        let tx = self.conn.transaction()?;

        let existing: Option<(String, String, Option<String>)> = tx
            .query_row(
                "SELECT id, status, assignee FROM tasks WHERE external_id = ?1",
                [&fields.external_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let outcome = match existing {
            None => {
                let id = generate_id("tsk", &fields.external_id);
                let assignee = fields
                    .assignee
                    .clone()
                    .or_else(|| fields.default_assignee.clone());
                tx.execute(
                    "INSERT INTO tasks (id, project_id, title, description, status, priority,
                        assignee, owner, external_id, external_display_id, external_url,
                        created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        id,
                        fields.project_id,
                        fields.title,
                        fields.description,
                        fields.status.as_str(),
                        fields.priority.as_str(),
                        assignee,
                        fields.owner,
                        fields.external_id,
                        fields.external_display_id,
                        fields.external_url,
                        fields.created_at.timestamp_millis(),
                        fields.updated_at.timestamp_millis()
                    ],
                )?;
                sync_current_task(&tx, &id, None, assignee.as_deref())?;
                UpsertOutcome {
                    task_id: id,
                    created: true,
                    status_changed: false,
                    previous_status: None,
                    assignee,
                }
            }
            Some((id, old_status, old_assignee)) => {
                let previous = parse_text::<TaskStatus>(0, old_status)?;
                let assignee = fields.assignee.clone().or_else(|| old_assignee.clone());
                tx.execute(
                    "UPDATE tasks SET title = ?2, description = ?3, status = ?4, priority = ?5,
                        external_display_id = ?6, external_url = ?7, owner = ?8, assignee = ?9,
                        updated_at = ?10
                     WHERE id = ?1",
                    params![
                        id,
                        fields.title,
                        fields.description,
                        fields.status.as_str(),
                        fields.priority.as_str(),
                        fields.external_display_id,
                        fields.external_url,
                        fields.owner,
                        assignee,
                        fields.updated_at.timestamp_millis()
                    ],
                )?;
                sync_current_task(&tx, &id, old_assignee.as_deref(), assignee.as_deref())?;
                UpsertOutcome {
                    task_id: id,
                    created: false,
                    status_changed: previous != fields.status,
                    previous_status: Some(previous),
                    assignee,
                }
            }
        };

        if let Some(entry) = activity(&outcome) {
            insert_activity(&tx, entry)?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Create a `todo` task assigned to `agent_id` and make it the agent's current task.
    ///
    /// The activity built by `activity` is written in the same transaction.
    pub fn create_assigned_task<F>(
        &mut self,
        fields: &NewTask,
        agent_id: &str,
        activity: F,
    ) -> Result<Task>
    where
        F: FnOnce(&Task) -> NewActivity,
    {
        let tx = self.conn.transaction()?;

        let mut task = Task::new(
            generate_id("tsk", &fields.title),
            fields.project_id.clone(),
            fields.title.clone(),
        );
        task.description = fields.description.clone();
        task.priority = fields.priority;
        task.status = TaskStatus::Todo;
        task.owner = fields.owner.clone();
        task.assignee = Some(agent_id.to_string());

        tx.execute(
            "INSERT INTO tasks (id, project_id, title, description, status, priority, assignee,
                owner, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.project_id,
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.assignee,
                task.owner,
                task.created_at.timestamp_millis(),
                task.updated_at.timestamp_millis()
            ],
        )?;
        let updated = tx.execute(
            "UPDATE agents SET current_task = ?2 WHERE id = ?1",
            params![agent_id, task.id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Agent not found: {}", agent_id)));
        }
        insert_activity(&tx, activity(&task))?;

        tx.commit()?;
        Ok(task)
    }

    /// Manually (re)assign a task, keeping `current_task` pointers in step.
    pub fn assign_task(&mut self, task_id: &str, agent_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let old_assignee: Option<Option<String>> = tx
            .query_row(
                "SELECT assignee FROM tasks WHERE id = ?1",
                [task_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(old_assignee) = old_assignee else {
            return Err(Error::NotFound(format!("Task not found: {}", task_id)));
        };

        let known: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM agents WHERE id = ?1",
            [agent_id],
            |row| row.get(0),
        )?;
        if !known {
            return Err(Error::NotFound(format!("Agent not found: {}", agent_id)));
        }

        tx.execute(
            "UPDATE tasks SET assignee = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, agent_id, Utc::now().timestamp_millis()],
        )?;
        sync_current_task(&tx, task_id, old_assignee.as_deref(), Some(agent_id))?;

        tx.commit()?;
        Ok(())
    }

    // === Activity Operations ===

    pub fn record_activity(&mut self, entry: NewActivity) -> Result<Activity> {
        insert_activity(&self.conn, entry)
    }

    /// Activities, newest first.
    pub fn list_activities(&self, limit: Option<usize>) -> Result<Vec<Activity>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT id, agent, action, target, metadata, created_at FROM activities
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let activities = stmt
            .query_map([limit], activity_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(activities)
    }
}

fn insert_activity(conn: &Connection, entry: NewActivity) -> Result<Activity> {
    let activity = Activity {
        id: generate_id("act", &format!("{}:{}", entry.action, entry.target)),
        agent: entry.agent,
        action: entry.action,
        target: entry.target,
        metadata: entry.metadata,
        created_at: Utc::now(),
    };
    let metadata_json = activity
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO activities (id, agent, action, target, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            activity.id,
            activity.agent,
            activity.action,
            activity.target,
            metadata_json,
            activity.created_at.timestamp_millis()
        ],
    )?;
    Ok(activity)
}

/// Point `next`'s `current_task` at the task and release it from `previous`.
fn sync_current_task(
    conn: &Connection,
    task_id: &str,
    previous: Option<&str>,
    next: Option<&str>,
) -> Result<()> {
    if previous == next {
        return Ok(());
    }
    if let Some(previous) = previous {
        conn.execute(
            "UPDATE agents SET current_task = NULL WHERE id = ?1 AND current_task = ?2",
            params![previous, task_id],
        )?;
    }
    if let Some(next) = next {
        conn.execute(
            "UPDATE agents SET current_task = ?2 WHERE id = ?1",
            params![next, task_id],
        )?;
    }
    Ok(())
}

fn require_name<'a>(kind: &str, name: &'a str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation(format!("{} name must not be empty", kind)));
    }
    Ok(name)
}

fn millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_text<T: FromStr<Err = String>>(idx: usize, value: String) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: millis(row.get(3)?),
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: millis(row.get(2)?),
    })
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let gateway_url: Option<String> = row.get(5)?;
    let gateway = gateway_url.map(|url| -> rusqlite::Result<GatewayConfig> {
        Ok(GatewayConfig {
            gateway_url: url,
            token: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            session_key: row.get(7)?,
        })
    });

    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        role: parse_text(2, row.get(2)?)?,
        status: parse_text(3, row.get(3)?)?,
        team_id: row.get(4)?,
        gateway: gateway.transpose()?,
        current_task: row.get(8)?,
        last_seen: millis(row.get(9)?),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_text(4, row.get(4)?)?,
        priority: parse_text(5, row.get(5)?)?,
        assignee: row.get(6)?,
        owner: row.get(7)?,
        external_id: row.get(8)?,
        external_display_id: row.get(9)?,
        external_url: row.get(10)?,
        created_at: millis(row.get(11)?),
        updated_at: millis(row.get(12)?),
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let metadata: Option<String> = row.get(4)?;
    let metadata = metadata
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Activity {
        id: row.get(0)?,
        agent: row.get(1)?,
        action: row.get(2)?,
        target: row.get(3)?,
        metadata,
        created_at: millis(row.get(5)?),
    })
}

const ID_HEX_LEN: usize = 12;

/// Generate a unique ID with the given prefix.
///
/// Format: `{prefix}-{12 hex chars}`, hashed from the seed and the current time.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..ID_HEX_LEN])
}
