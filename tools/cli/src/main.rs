//! tokensync CLI - Command line interface for remote token storage.
//!
//! This tool reads and writes a design-token workspace kept in a GitLab or
//! GitHub repository. Local workspaces use the single-file JSON document.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tokensync_common::Workspace;
use tokensync_storage::format::{self, DEFAULT_COMMIT_MESSAGE};
use tokensync_storage::{create_default_registry, StorageConfig, TokenStorage};

/// Environment variable overriding the configured secret.
const SECRET_ENV: &str = "TOKENSYNC_SECRET";

#[derive(Parser)]
#[command(name = "tokensync")]
#[command(about = "tokensync - Design token storage in git repositories")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: <config dir>/tokensync/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Branch to use instead of the configured one.
    #[arg(short, long, global = true)]
    branch: Option<String>,

    /// Repository file or directory to use instead of the configured one.
    #[arg(short, long, global = true)]
    path: Option<String>,

    /// Store one file per token set.
    #[arg(long, global = true, conflicts_with = "single_file")]
    multi_file: bool,

    /// Store all token sets in one file.
    #[arg(long, global = true)]
    single_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the configured repository on the host.
    Resolve,

    /// Check whether the credential may push.
    CanWrite,

    /// List branches.
    Branches,

    /// Create a branch.
    CreateBranch {
        /// Name of the new branch.
        #[arg(short, long)]
        name: String,

        /// Branch to start from.
        #[arg(short, long, default_value = "main")]
        from: String,
    },

    /// Read the remote workspace.
    Pull {
        /// Output file (default: stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Commit a local workspace file.
    Push {
        /// Workspace file to commit.
        #[arg(short, long)]
        input: PathBuf,

        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Command line values that take precedence over the configuration file.
#[derive(Debug, Default)]
struct Overrides {
    branch: Option<String>,
    path: Option<String>,
    multi_file: Option<bool>,
    secret: Option<String>,
}

impl Overrides {
    fn from_cli(cli: &Cli, secret: Option<String>) -> Self {
        let multi_file = if cli.multi_file {
            Some(true)
        } else if cli.single_file {
            Some(false)
        } else {
            None
        };

        Self {
            branch: cli.branch.clone(),
            path: cli.path.clone(),
            multi_file,
            secret: secret.filter(|s| !s.is_empty()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "tokensync", &mut std::io::stdout());
        return Ok(());
    }

    let overrides = Overrides::from_cli(&cli, std::env::var(SECRET_ENV).ok());
    let config_file = config_path(cli.config.as_deref())?;
    let config = load_config(&config_file, &overrides)?;
    let storage = create_default_registry()
        .resolve(&config)
        .with_context(|| format!("Failed to create '{}' provider", config.provider))?;

    match cli.command {
        Commands::Resolve => cmd_resolve(storage.as_ref()).await,

        Commands::CanWrite => cmd_can_write(storage.as_ref()).await,

        Commands::Branches => cmd_branches(storage.as_ref()).await,

        Commands::CreateBranch { name, from } => {
            cmd_create_branch(storage.as_ref(), &name, &from).await
        }

        Commands::Pull { out } => cmd_pull(storage.as_ref(), out.as_deref()).await,

        Commands::Push { input, message } => {
            cmd_push(storage.as_ref(), &input, message.as_deref()).await
        }

        Commands::Completions { .. } => Ok(()),
    }
}

/// Configuration file to use.
fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let dir = dirs::config_dir().context("Could not determine the config directory")?;
            Ok(dir.join("tokensync").join("config.json"))
        }
    }
}

/// Load the configuration file and apply command line overrides.
fn load_config(path: &Path, overrides: &Overrides) -> Result<StorageConfig> {
    let mut config = StorageConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(secret) = &overrides.secret {
        config.secret = tokensync_common::Secret::new(secret.as_str());
    }
    if let Some(branch) = &overrides.branch {
        config.branch = branch.clone();
    }
    if let Some(file_path) = &overrides.path {
        config.file_path = file_path.clone();
    }
    if let Some(multi_file) = overrides.multi_file {
        config.multi_file = multi_file;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Read a local workspace document.
fn read_workspace(path: &Path) -> Result<Workspace> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let files = format::unmarshal_single(&path.display().to_string(), &content)
        .with_context(|| format!("Invalid workspace file {}", path.display()))?;
    Ok(Workspace::from_remote_files(&files)?)
}

/// Render a workspace as a single-file document.
fn render_workspace(workspace: &Workspace) -> Result<String> {
    let blob = format::marshal_single(&workspace.to_remote_files(None), "")?;
    Ok(blob.content)
}

/// Resolve the configured repository.
async fn cmd_resolve(storage: &dyn TokenStorage) -> Result<()> {
    let context = storage.context();
    let project = storage
        .assign_project_id()
        .await
        .with_context(|| format!("Failed to resolve {}", context.full_name()))?;

    println!("Repository: {}", context.full_name());
    println!("  Provider: {}", storage.name());
    println!("  Project ID: {}", project.project_id);
    if let Some(group_id) = project.group_id {
        println!("  Group ID: {}", group_id);
    }
    println!("  Branch: {}", context.branch);
    println!(
        "  Path: {} ({})",
        context.path,
        if storage.is_multi_file() {
            "multi-file"
        } else {
            "single file"
        }
    );

    Ok(())
}

/// Report write permission.
async fn cmd_can_write(storage: &dyn TokenStorage) -> Result<()> {
    let writable = storage
        .can_write()
        .await
        .context("Failed to check permissions")?;

    if writable {
        println!("Write access: yes");
    } else {
        println!("Write access: no (read only)");
    }
    Ok(())
}

/// List branches.
async fn cmd_branches(storage: &dyn TokenStorage) -> Result<()> {
    let branches = storage
        .fetch_branches()
        .await
        .context("Failed to list branches")?;

    let current = &storage.context().branch;
    for branch in branches {
        let marker = if &branch == current { "*" } else { " " };
        println!("{} {}", marker, branch);
    }
    Ok(())
}

/// Create a branch.
async fn cmd_create_branch(storage: &dyn TokenStorage, name: &str, from: &str) -> Result<()> {
    info!("Creating branch {} from {}", name, from);

    let created = storage
        .create_branch(name, from)
        .await
        .with_context(|| format!("Failed to create branch {}", name))?;

    if created {
        println!("Branch created: {}", name);
    } else {
        warn!("Host did not confirm the new branch");
        println!("Branch not confirmed: {}", name);
    }
    Ok(())
}

/// Pull the remote workspace.
async fn cmd_pull(storage: &dyn TokenStorage, out: Option<&Path>) -> Result<()> {
    let files = storage.read().await;
    if files.is_empty() {
        warn!("Nothing was read from {}", storage.context().full_name());
    }

    let workspace = Workspace::from_remote_files(&files)?;
    let document = render_workspace(&workspace)?;

    match out {
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Pulled {} token set(s) and {} theme(s) to {}",
                workspace.token_set_names().len(),
                workspace.themes().len(),
                path.display()
            );
        }
        None => println!("{}", document),
    }
    Ok(())
}

/// Push a local workspace file.
async fn cmd_push(storage: &dyn TokenStorage, input: &Path, message: Option<&str>) -> Result<()> {
    let workspace = read_workspace(input)?;
    let files = workspace.to_remote_files(Some(message.unwrap_or(DEFAULT_COMMIT_MESSAGE)));

    info!(
        "Pushing {} token set(s) to {}",
        workspace.token_set_names().len(),
        storage.context().full_name()
    );

    let commit = storage.write(&files).await.context("Failed to push tokens")?;

    println!("Committed to {}", storage.context().branch);
    if let Some(id) = commit.id {
        println!("  Commit: {}", id);
    }
    if let Some(url) = commit.web_url {
        println!("  URL: {}", url);
    }
    Ok(())
}
