//! EVOX CLI - Linear sync and agent assignment for the EVOX dashboard.

use clap::Parser;
use evox::assign::AssignRequest;
use evox::cli::{
    ActivityCommands, AgentCommands, Cli, Commands, ConfigCommands, ProjectCommands, TaskCommands,
    TeamCommands,
};
use evox::commands::{self, GatewayArgs, Output};
use evox::config::{ConfigOverrides, Settings, resolve_settings};
use evox::logging;
use evox::storage::Storage;
use std::future::Future;
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let mut overrides = ConfigOverrides::new();
    overrides.config_path = cli.config_path.clone();
    if let Some(ref db) = cli.database {
        overrides = overrides.with_database(db);
    }
    if let Commands::Serve { ref host, port } = cli.command {
        overrides = overrides.with_listen(host.clone(), port);
    }

    let settings = match resolve_settings(&overrides) {
        Ok(settings) => settings,
        Err(e) => exit_with_error(&e, human),
    };

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = match logging::init(
        &settings.log_level,
        settings.log_format,
        settings.log_dir.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(e) => exit_with_error(&e, human),
    };

    if let Err(e) = run_command(cli.command, settings, human) {
        exit_with_error(&e, human);
    }
}

fn exit_with_error(e: &evox::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!(
            "{}",
            serde_json::json!({ "error": e.to_string(), "kind": e.kind() })
        );
    }
    process::exit(1);
}

fn run_command(command: Commands, settings: Settings, human: bool) -> Result<(), evox::Error> {
    // Commands that don't need storage
    if let Commands::Config {
        command: ConfigCommands::Show,
    } = command
    {
        output(&commands::config_show(&settings), human);
        return Ok(());
    }

    let mut storage = Storage::open(&settings.database)?;

    match command {
        Commands::Serve { .. } => {
            block_on(evox::server::start_server(storage, settings))?;
        }
        Commands::Sync => {
            let summary = block_on(commands::sync(&mut storage, &settings))?;
            output(&summary, human);
        }
        Commands::Seed => {
            let result = commands::seed(&mut storage, &settings)?;
            output(&result, human);
        }
        Commands::Assign {
            title,
            description,
            priority,
            project,
            agent,
            team,
            assigned_by,
        } => {
            let request = AssignRequest {
                title: Some(title),
                description: Some(description),
                priority: Some(priority),
                project_id: Some(project),
                preferred_agent: agent,
                preferred_team: team,
                assigned_by,
            };
            let response = block_on(commands::assign(&mut storage, &request))?;
            output(&response, human);
        }
        Commands::Suggest { title, description } => {
            output(&commands::suggest(&storage, &title, &description)?, human);
        }
        Commands::Task { command } => match command {
            TaskCommands::List { status } => {
                output(&commands::task_list(&storage, status)?, human);
            }
            TaskCommands::Show { id } => {
                output(&commands::task_show(&storage, &id)?, human);
            }
            TaskCommands::Assign { id, agent } => {
                output(&commands::task_assign(&mut storage, &id, &agent)?, human);
            }
        },
        Commands::Agent { command } => match command {
            AgentCommands::Add {
                name,
                role,
                team,
                gateway_url,
                token,
                session_key,
            } => {
                let gateway = GatewayArgs {
                    url: gateway_url,
                    token,
                    session_key,
                };
                let agent = commands::agent_add(&mut storage, &name, role, team.as_deref(), gateway)?;
                output(&agent, human);
            }
            AgentCommands::List => {
                output(&commands::agent_list(&storage)?, human);
            }
            AgentCommands::Status { name, status } => {
                output(&commands::agent_status(&mut storage, &name, status)?, human);
            }
        },
        Commands::Team { command } => match command {
            TeamCommands::Add { name } => {
                output(&commands::team_add(&mut storage, &name)?, human);
            }
            TeamCommands::List => {
                output(&commands::team_list(&storage)?, human);
            }
        },
        Commands::Project { command } => match command {
            ProjectCommands::Add { name, description } => {
                let project = commands::project_add(&mut storage, &name, description.as_deref())?;
                output(&project, human);
            }
            ProjectCommands::List => {
                output(&commands::project_list(&storage)?, human);
            }
        },
        Commands::Activity { command } => match command {
            ActivityCommands::List { limit } => {
                output(&commands::activity_list(&storage, limit)?, human);
            }
        },
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Run a future on a fresh multi-threaded runtime.
fn block_on<F, T>(future: F) -> Result<T, evox::Error>
where
    F: Future<Output = Result<T, evox::Error>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| evox::Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(future)
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
