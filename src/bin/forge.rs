//! forge - command-line dashboard for the AI smart-contract pipeline
//!
//! Drives generate, audit, build and deploy tasks against the pipeline API,
//! following each task to completion. When the API is unreachable the
//! session switches to the built-in offline backend.
//!
//! # Usage
//!
//! ```text
//! forge --wallet <ADDR> login
//! forge --wallet <ADDR> projects
//! forge --wallet <ADDR> new "Escrow"
//! forge generate "an SPL token with a fixed supply" [--project <ID>] [--out token.rs]
//! forge audit contract.rs [--project <ID>]
//! forge build contract.rs [--project <ID>]
//! forge --wallet <ADDR> deploy contract.rs
//! forge --wallet <ADDR> stale
//! ```

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use forge_client::storage::{self, ChatMessage, ChatRole};
use forge_client::{
    FallbackTransport, FileStore, ForgeConfig, HttpTransport, KeyValueStore, MemoryStore,
    SessionConfig, SessionOrchestrator, Step, TrackOutcome, TrackRequest, TrackerEvent,
    Transports,
};
use forge_core::{Project, ProjectId, TaskType, WalletAddress, DEFAULT_STALE_THRESHOLD_SECS};

// ============================================================================
// CLI Arguments
// ============================================================================

/// forge - AI smart-contract pipeline from the terminal
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(about = "Generate, audit, build and deploy smart contracts")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Wallet address identifying the user
    #[arg(long, short = 'w', global = true, env = "FORGE_WALLET")]
    wallet: Option<String>,

    /// Keep session data in memory only
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect the wallet and show the resolved user
    Login,
    /// List projects, newest first
    Projects {
        /// Include archived projects
        #[arg(long)]
        all: bool,
    },
    /// Create an empty draft project
    New { name: String },
    /// Generate contract code from a description
    Generate {
        description: String,
        #[arg(long)]
        project: Option<String>,
        /// Write the generated source to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a security audit on a source file
    Audit {
        file: PathBuf,
        #[arg(long)]
        project: Option<String>,
    },
    /// Compile a source file
    Build {
        file: PathBuf,
        #[arg(long)]
        project: Option<String>,
    },
    /// Deploy a source file
    Deploy { file: PathBuf },
    /// List projects stuck in flight
    Stale {
        /// Minutes without an update before a project counts as stale
        #[arg(long, default_value_t = DEFAULT_STALE_THRESHOLD_SECS / 60)]
        minutes: i64,
    },
}

// ============================================================================
// Logging
// ============================================================================

fn get_log_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg_state).join("forge"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/state/forge"))
}

fn create_log_file() -> Option<std::fs::File> {
    let log_dir = get_log_dir()?;

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("forge.log");

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

fn init_logging() {
    if let Some(file) = create_log_file() {
        let filter = EnvFilter::from_default_env().add_directive(
            "forge=info"
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
        );

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init();
    }
}

// ============================================================================
// Session
// ============================================================================

/// Orchestrator plus the session value threaded through every call.
struct Dashboard {
    orchestrator: SessionOrchestrator,
    session: SessionConfig,
    config: ForgeConfig,
}

impl Dashboard {
    async fn connect(config: ForgeConfig, ephemeral: bool, wallet: Option<&str>) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = if ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(&config.store_path))
        };

        let primary = HttpTransport::new(&config, Arc::clone(&store))?;
        let transports = Transports::new(Arc::new(primary), Arc::new(FallbackTransport::spawn()));
        let orchestrator = SessionOrchestrator::new(transports, store)
            .with_project_limit(config.project_list_limit);

        let mut dashboard = Self {
            orchestrator,
            session: SessionConfig::primary(),
            config,
        };

        if let Some(raw) = wallet {
            let wallet = WalletAddress::parse(raw)?;
            let session = dashboard.session.clone();
            let step = dashboard.orchestrator.initialize_user(session, &wallet).await;
            dashboard.adopt(step);
        }
        Ok(dashboard)
    }

    /// Takes the session from `step` and returns its value.
    fn adopt<T>(&mut self, step: Step<T>) -> T {
        let (value, session) = step.into_parts();
        if session.is_fallback() && !self.session.is_fallback() {
            eprintln!(
                "note: pipeline API unavailable ({}), using the offline backend",
                session.fallback_reason().unwrap_or("unknown error")
            );
        }
        self.session = session;
        value
    }

    /// Unwraps an orchestrator result, adopting a switched session on failure.
    fn settle<T>(&mut self, result: forge_client::Result<Step<T>>) -> Result<T> {
        match result {
            Ok(step) => Ok(self.adopt(step)),
            Err(err) => {
                if let Some(session) = err.switched_session() {
                    self.session = session.clone();
                }
                Err(err.into())
            }
        }
    }

    async fn refresh(&mut self) -> Result<Vec<Project>> {
        let result = self.orchestrator.load_projects(self.session.clone()).await;
        self.settle(result)
    }

    fn resolve_project(&self, raw: Option<&str>) -> Option<ProjectId> {
        raw.map(ProjectId::new)
    }

    /// Follows a task to its end, printing progress lines.
    async fn follow(&self, project: &Project, task_type: TaskType) -> TrackOutcome {
        let tracker = self.orchestrator.tracker(&self.session, self.config.tracker);
        let mut handle = tracker.track(TrackRequest::new(
            project.id.clone(),
            task_type,
            project.backend_task_id.clone(),
        ));

        let cancel = handle.cancellation_token();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let mut outcome = TrackOutcome::Cancelled;
        while let Some(event) = handle.next_event().await {
            match event {
                TrackerEvent::Progress(progress) => println!("{progress}"),
                TrackerEvent::Finished(finished) => outcome = finished,
            }
        }
        ctrl_c.abort();
        outcome
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_project(project: &Project) {
    let flags = match (project.is_deployed, project.is_archived) {
        (_, true) => " [archived]",
        (true, false) => " [deployed]",
        (false, false) => "",
    };
    println!(
        "{:<14} {:<24} {:<22} {}{}",
        project.id.short(),
        project.name_or_placeholder(),
        project.status.display_name(),
        project.updated_at.format("%Y-%m-%d %H:%M"),
        flags
    );
}

/// Turns a tracker outcome into the command's result.
fn conclude(outcome: &TrackOutcome) -> Result<()> {
    match outcome {
        TrackOutcome::Completed(_) => Ok(()),
        TrackOutcome::Cancelled => {
            println!("Cancelled; the task keeps running on the backend.");
            Ok(())
        }
        other => match other.error_message() {
            Some(message) => bail!(message),
            None => Ok(()),
        },
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run(args: Args) -> Result<()> {
    let config = ForgeConfig::load()?;
    let mut dashboard = Dashboard::connect(config, args.ephemeral, args.wallet.as_deref()).await?;

    match args.command {
        Command::Login => {
            let Some(user) = dashboard.orchestrator.current_user() else {
                bail!("No wallet given; pass --wallet or set FORGE_WALLET");
            };
            println!("wallet:  {}", user.wallet_address);
            println!("user:    {}", user.id);
            println!("backend: {}", dashboard.session.mode());
        }

        Command::Projects { all } => {
            dashboard.refresh().await?;
            let projects = dashboard.orchestrator.projects().snapshot();
            let visible: Vec<&Project> = projects.iter().filter(|p| all || !p.is_archived).collect();
            if visible.is_empty() {
                println!("No projects yet.");
            }
            for project in visible {
                print_project(project);
            }
        }

        Command::New { name } => {
            let project = dashboard.orchestrator.create_project(&name)?;
            println!("Created draft project {} ({})", project.id, name);
        }

        Command::Generate {
            description,
            project,
            out,
        } => {
            let existing = dashboard.resolve_project(project.as_deref());
            if existing.is_some() {
                dashboard.refresh().await?;
            }
            let result = dashboard
                .orchestrator
                .start_generate(dashboard.session.clone(), &description, existing.as_ref())
                .await;
            let project = dashboard.settle(result)?;
            let store = dashboard.orchestrator.store();
            storage::append_chat(store, &project.id, ChatMessage::new(ChatRole::User, description.as_str()));
            println!("Generating in project {} (task {})", project.id, project.poll_id());

            let outcome = dashboard.follow(&project, TaskType::Generate).await;
            if let TrackOutcome::Completed(report) = &outcome {
                let name = report.project_name().unwrap_or("contract");
                storage::append_chat(
                    store,
                    &project.id,
                    ChatMessage::new(ChatRole::Assistant, format!("Generated {name}")),
                );
                if let Some(code) = report.code() {
                    storage::save_code(store, &project.id, code);
                    match &out {
                        Some(path) => {
                            fs::write(path, code)
                                .with_context(|| format!("Failed to write {}", path.display()))?;
                            println!("Saved source to {}", path.display());
                        }
                        None => println!("\n{code}"),
                    }
                }
            }
            conclude(&outcome)?;
        }

        Command::Audit { file, project } => {
            let code = read_source(&file)?;
            let existing = dashboard.resolve_project(project.as_deref());
            if existing.is_some() {
                dashboard.refresh().await?;
            }
            let result = dashboard
                .orchestrator
                .start_audit(dashboard.session.clone(), &code, existing.as_ref())
                .await;
            let project = dashboard.settle(result)?;
            println!("Auditing in project {} (task {})", project.id, project.poll_id());

            let outcome = dashboard.follow(&project, TaskType::Audit).await;
            if let TrackOutcome::Completed(report) = &outcome {
                if let Some(findings) = report.audit_report() {
                    println!("{}", serde_json::to_string_pretty(findings)?);
                }
            }
            conclude(&outcome)?;
        }

        Command::Build { file, project } => {
            let code = read_source(&file)?;
            let existing = dashboard.resolve_project(project.as_deref());
            if existing.is_some() {
                dashboard.refresh().await?;
            }
            let result = dashboard
                .orchestrator
                .start_build(dashboard.session.clone(), &code, existing.as_ref())
                .await;
            let project = dashboard.settle(result)?;
            println!("Building in project {} (task {})", project.id, project.poll_id());

            let outcome = dashboard.follow(&project, TaskType::Build).await;
            if let TrackOutcome::Completed(report) = &outcome {
                if let Some(artifact) = report.artifact() {
                    println!("Artifact: {artifact}");
                }
            }
            conclude(&outcome)?;
        }

        Command::Deploy { file } => {
            let code = read_source(&file)?;
            let result = dashboard
                .orchestrator
                .deploy(dashboard.session.clone(), &code)
                .await;
            let address = dashboard.settle(result)?;
            println!("Deployed at {address}");
        }

        Command::Stale { minutes } => {
            dashboard.refresh().await?;
            let threshold = chrono::Duration::minutes(minutes);
            let stale = dashboard
                .orchestrator
                .projects()
                .stale_projects(Utc::now(), threshold);
            if stale.is_empty() {
                println!("No stale projects.");
            }
            for project in &stale {
                print_project(project);
            }
        }
    }

    info!(mode = %dashboard.session.mode(), "Command finished");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    info!(command = ?args.command, "forge starting");

    let result = run(args).await;
    if let Err(e) = &result {
        warn!(error = %e, "Command failed");
    }
    result
}
