//! CLI argument definitions for EVOX.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::{AgentRole, AgentStatus, TaskStatus};

/// EVOX - task ingestion and agent assignment for the agent team dashboard.
///
/// Run `evox seed` once to create the target project and roster agents,
/// then `evox serve` to accept Linear webhooks.
#[derive(Parser, Debug)]
#[command(name = "evox")]
#[command(author, version, about = "Sync Linear issues onto the EVOX board and assign work to agents", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Path to config.kdl (defaults to ~/.config/evox/config.kdl)
    #[arg(long = "config", global = true, env = "EVOX_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long = "db", global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (webhooks, sync trigger, auto-assign, feeds)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Pull every issue of the configured Linear project and upsert it
    Sync,

    /// Create the target project and the roster agents if missing
    Seed,

    /// Create a task and auto-assign it to the best available agent
    Assign {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Priority (low, medium, high, urgent)
        #[arg(long)]
        priority: String,

        /// Project ID or name
        #[arg(long)]
        project: String,

        /// Preferred agent name
        #[arg(long)]
        agent: Option<String>,

        /// Preferred team name
        #[arg(long)]
        team: Option<String>,

        /// Who is assigning the task
        #[arg(long = "by")]
        assigned_by: Option<String>,
    },

    /// Suggest agents for a piece of work without creating a task
    Suggest {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Task commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Agent commands
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Team commands
    Team {
        #[command(subcommand)]
        command: TeamCommands,
    },

    /// Project commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Activity feed commands
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks, most recently updated first
    List {
        /// Filter by status (backlog, todo, in_progress, review, done)
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },

    /// Show task details
    Show {
        /// Task ID (e.g., tsk-1a2b3c4d5e6f)
        id: String,
    },

    /// Reassign a task to an agent
    Assign {
        /// Task ID
        id: String,

        /// Agent name
        agent: String,
    },
}

/// Agent subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Register an agent
    Add {
        #[arg(long)]
        name: String,

        /// Role (master, pm, backend, frontend, fullstack, qa, research, devops)
        #[arg(long)]
        role: AgentRole,

        /// Team name (must exist)
        #[arg(long)]
        team: Option<String>,

        /// Gateway base URL for task notifications
        #[arg(long, requires = "token")]
        gateway_url: Option<String>,

        /// Gateway bearer token
        #[arg(long, requires = "gateway_url")]
        token: Option<String>,

        /// Gateway session key
        #[arg(long, requires = "gateway_url")]
        session_key: Option<String>,
    },

    /// List agents
    List,

    /// Heartbeat: set an agent's status and refresh last_seen
    Status {
        /// Agent name
        name: String,

        /// New status (online, idle, busy, offline)
        status: AgentStatus,
    },
}

/// Team subcommands
#[derive(Subcommand, Debug)]
pub enum TeamCommands {
    /// Create a team
    Add {
        #[arg(long)]
        name: String,
    },

    /// List teams
    List,
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List projects
    List,
}

/// Activity subcommands
#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// List recent activity, newest first
    List {
        /// Maximum number of entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved settings and where each value came from
    Show,
}
