//! Design Companion - staged refinement of system design documents.
//!
//! Turns free-text descriptions into a versioned problem space and derives
//! candidate solutions from it.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use design_companion::document::render_workspace;
use design_companion::store::INITIAL_VERSION;
use design_companion::workflow::{Outcome, Session};
use design_companion::{Companion, Config, FileStore, SnapshotStore};

/// Refine system design problems into versioned workspaces
#[derive(Parser)]
#[command(name = "companion")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new workspace with an empty first version
    New,

    /// List all workspaces
    Workspaces,

    /// List the versions of a workspace, oldest first
    Versions {
        /// Workspace id
        workspace: String,
    },

    /// Show a workspace version
    Show {
        /// Workspace id
        workspace: String,

        /// Version id (defaults to the latest)
        #[arg(id = "version_id", value_name = "VERSION")]
        version: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Refine the problem space from a free-text description
    Refine {
        /// Workspace id
        workspace: String,

        /// Version to start from
        #[arg(id = "version_id", value_name = "VERSION")]
        version: String,

        /// Description of the system, its constraints or a correction
        text: String,

        /// Drop the solution space from the new version
        #[arg(long)]
        remove_solutions: bool,
    },

    /// Generate one more solution candidate
    Solve {
        /// Workspace id
        workspace: String,

        /// Version to start from
        #[arg(id = "version_id", value_name = "VERSION")]
        version: String,
    },

    /// Start an interactive session
    Chat {
        /// Workspace id (a new workspace is created if omitted)
        workspace: Option<String>,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment overrides may live in a local .env file
    dotenvy::dotenv().ok();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::New => cmd_new(&config)?,
        Commands::Workspaces => cmd_workspaces(&config)?,
        Commands::Versions { workspace } => cmd_versions(&config, &workspace)?,
        Commands::Show { workspace, version, format } => {
            cmd_show(&config, &workspace, version.as_deref(), format)?;
        }
        Commands::Refine { workspace, version, text, remove_solutions } => {
            cmd_refine(&config, &workspace, &version, &text, remove_solutions)?;
        }
        Commands::Solve { workspace, version } => cmd_solve(&config, &workspace, &version)?,
        Commands::Chat { workspace } => cmd_chat(&config, workspace)?,
        Commands::Config { path } => cmd_config(&config, path)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Config::load(),
    }
}

fn store(config: &Config) -> FileStore {
    FileStore::new(config.workspaces_root())
}

/// Create a new workspace.
fn cmd_new(config: &Config) -> Result<()> {
    let companion = Companion::from_config(config)?;
    let workspace = companion.create_workspace()?;

    println!("Created workspace {} ({})", workspace.id, workspace.version);
    Ok(())
}

/// List workspaces.
fn cmd_workspaces(config: &Config) -> Result<()> {
    let workspaces = store(config).list_workspaces()?;

    if workspaces.is_empty() {
        println!("No workspaces found in {}", config.workspaces_root().display());
        return Ok(());
    }

    for id in &workspaces {
        println!("{id}");
    }
    println!("\nTotal: {} workspaces", workspaces.len());

    Ok(())
}

/// List the versions of a workspace.
fn cmd_versions(config: &Config, workspace: &str) -> Result<()> {
    let versions = store(config).list_versions(workspace)?;

    if versions.is_empty() {
        anyhow::bail!("Workspace '{workspace}' has no versions");
    }

    let latest = versions.len() - 1;
    for (i, version) in versions.iter().enumerate() {
        if i == latest {
            println!("{version} (latest)");
        } else {
            println!("{version}");
        }
    }

    Ok(())
}

/// Show a workspace version.
fn cmd_show(config: &Config, workspace: &str, version: Option<&str>, format: Format) -> Result<()> {
    let store = store(config);

    let version = match version {
        Some(v) => v.to_string(),
        None => store
            .latest_version(workspace)?
            .ok_or_else(|| anyhow::anyhow!("Workspace '{workspace}' has no versions"))?,
    };

    let snapshot = store.load(workspace, &version)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        Format::Text => print!("{}", render_workspace(&snapshot)),
    }

    Ok(())
}

/// Refine the problem space.
fn cmd_refine(
    config: &Config,
    workspace: &str,
    version: &str,
    text: &str,
    remove_solutions: bool,
) -> Result<()> {
    let companion = Companion::from_config(config)?;

    // Create tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()?;

    println!("Refining problem space...\n");
    let new_version =
        rt.block_on(companion.run_problem_workflow(workspace, version, text, remove_solutions))?;

    report(version, &new_version);
    Ok(())
}

/// Generate a solution candidate.
fn cmd_solve(config: &Config, workspace: &str, version: &str) -> Result<()> {
    let companion = Companion::from_config(config)?;
    let rt = tokio::runtime::Runtime::new()?;

    println!("Generating solution candidate...\n");
    let new_version = rt.block_on(companion.run_solution_workflow(workspace, version))?;

    report(version, &new_version);
    Ok(())
}

fn report(previous: &str, version: &str) {
    if previous == version {
        println!("No changes detected, still at {version}");
    } else {
        println!("Updated: {previous} -> {version}");
    }
}

/// Run an interactive session.
fn cmd_chat(config: &Config, workspace: Option<String>) -> Result<()> {
    let companion = Arc::new(Companion::from_config(config)?);
    let rt = tokio::runtime::Runtime::new()?;

    let session = match workspace {
        Some(id) => Session::resume(companion.clone(), id)?,
        None => {
            let created = companion.create_workspace()?;
            Session::new(companion.clone(), created.id, created.version)
        }
    };

    println!("Workspace {} at {}", session.workspace_id(), session.version_id());
    println!(
        "Describe your system. Commands: /show, /solve, /reset-solutions <text>, /versions, /quit\n"
    );

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        let result = match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/show" => {
                print!("{}", render_workspace(&session.current()?));
                continue;
            }
            "/versions" => {
                for version in companion.list_versions(session.workspace_id())? {
                    println!("{version}");
                }
                continue;
            }
            "/solve" => rt.block_on(session.generate()),
            _ => match line.strip_prefix("/reset-solutions") {
                Some(text) => rt.block_on(session.submit(text.trim(), true)),
                None => rt.block_on(session.submit(line, false)),
            },
        };

        match result {
            Ok(Outcome::Updated { previous, version }) => {
                println!("Updated: {previous} -> {version}\n");
                print!("{}", render_workspace(&session.current()?));
            }
            Ok(Outcome::Unchanged { version }) => {
                println!("No changes detected, still at {version}");
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    if session.version_id() == INITIAL_VERSION {
        println!("Nothing was saved.");
    } else {
        println!("Session ended at {} {}", session.workspace_id(), session.version_id());
    }

    Ok(())
}

/// Show configuration.
fn cmd_config(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "companion", &mut io::stdout());
}
