use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use production_monitor::db::{self, enums::ProjectStatus, services::project_service};
use production_monitor::logging::init_logging;
use production_monitor::server::{self, config::ServerConfig};
use production_monitor::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Ingestion server for production monitoring", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the ingestion API (default)
    Serve,
    /// Manage monitored projects
    #[command(subcommand)]
    Project(ProjectCommand),
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Register a project and print its API key
    Create {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
    },
    /// List the projects of an owner
    List {
        #[arg(long)]
        owner: String,
    },
    /// Rename a project or change its URL
    Update {
        id: i32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Stop accepting data for a project
    Deactivate { id: i32 },
    /// Accept data for a project again
    Activate { id: i32 },
    /// Replace a project's API key
    RotateKey { id: i32 },
    /// Delete a project together with its metrics and error logs
    Delete { id: i32 },
}

async fn run_project_command(
    config: &ServerConfig,
    command: ProjectCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db_pool = db::connect(&config.database_url, 1).await?;

    match command {
        ProjectCommand::Create { owner, name, url } => {
            let project = project_service::create_project(&db_pool, &owner, &name, &url).await?;
            println!("Created project {} ({})", project.id, project.name);
            println!("API key: {}", project.api_key);
        }
        ProjectCommand::List { owner } => {
            for project in project_service::list_projects_for_owner(&db_pool, &owner).await? {
                let last_ping = project
                    .last_ping
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\t{}\t{}\tlast ping: {}",
                    project.id, project.name, project.url, project.status, last_ping
                );
            }
        }
        ProjectCommand::Update { id, name, url } => {
            match project_service::update_project(&db_pool, id, name, url).await? {
                Some(project) => println!("Updated project {} ({}, {})", project.id, project.name, project.url),
                None => report_found(id, false)?,
            }
        }
        ProjectCommand::Deactivate { id } => {
            report_found(id, project_service::set_project_status(&db_pool, id, ProjectStatus::Inactive).await?)?;
            println!("Project {id} deactivated");
        }
        ProjectCommand::Activate { id } => {
            report_found(id, project_service::set_project_status(&db_pool, id, ProjectStatus::Active).await?)?;
            println!("Project {id} activated");
        }
        ProjectCommand::RotateKey { id } => match project_service::regenerate_api_key(&db_pool, id).await? {
            Some(api_key) => println!("New API key: {api_key}"),
            None => report_found(id, false)?,
        },
        ProjectCommand::Delete { id } => {
            report_found(id, project_service::delete_project(&db_pool, id).await?)?;
            println!("Project {id} deleted");
        }
    }
    Ok(())
}

fn report_found(id: i32, found: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if found {
        Ok(())
    } else {
        Err(format!("Project {id} not found").into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            init_logging("logs", "server.log");
            error!("Failed to load server configuration: {}", e);
            return Err(e.into());
        }
    };
    init_logging(&server_config.log_dir, "server.log");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting server, version: {}", VERSION);
            server::run(server_config).await
        }
        Command::Project(command) => run_project_command(&server_config, command).await,
    }
}
