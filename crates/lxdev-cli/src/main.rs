mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{CliError, EXIT_FAILURE};
use lxdev_core::{CloneOptions, CreateOptions, Engine, MountOptions};
use lxdev_runtime::LxcBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

const BACKEND_ENV: &str = "LXDEV_BACKEND";
const DEFAULT_BACKEND: &str = "lxc";

#[derive(Debug, Parser)]
#[command(
    name = "lxdev",
    version,
    about = "Declarative development containers on top of LXC"
)]
struct Cli {
    /// Project directory holding containers.yaml.
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create containers.yaml in the project directory.
    Init {
        /// Project name (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,
        /// Default forwarded port; repeat or separate with commas.
        #[arg(long = "port", value_delimiter = ',')]
        ports: Vec<u32>,
        /// Default container user.
        #[arg(long)]
        user: Option<String>,
        /// Default container user's password.
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete every project container and the project file.
    Delete {
        /// Remove the project file even if some containers fail to delete.
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Launch a container from an image and declare it.
    Create {
        name: String,
        image: String,
        /// Forwarded port overriding the project defaults; repeatable.
        #[arg(long = "port", value_delimiter = ',')]
        ports: Vec<u32>,
        /// User to create inside the container.
        #[arg(long)]
        user: Option<String>,
        /// Password for that user.
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete a container from the runtime and the project.
    Remove { name: String },
    /// Start a container.
    Up { name: String },
    /// Stop a container.
    Down { name: String },
    /// Restore a container to a snapshot (initial-state by default).
    Reset {
        name: String,
        snapshot: Option<String>,
    },
    /// Copy a container into a new one.
    Clone {
        source: String,
        name: String,
        /// Clone from this snapshot instead of the current state.
        #[arg(short, long)]
        snapshot: Option<String>,
    },
    /// List declared containers with their runtime status.
    List,
    /// Show the runtime status of one container.
    Status { name: String },
    /// Manage container snapshots.
    #[command(subcommand)]
    Snapshot(SnapshotCommands),
    /// Attach a host directory to a container.
    Mount {
        container: String,
        source: String,
        path: String,
        /// Device name (default: generated from the source directory).
        #[arg(short, long)]
        name: Option<String>,
        /// Mount read-write (default: read-only).
        #[arg(long, default_value_t = false)]
        rw: bool,
        /// Enable uid/gid shifting.
        #[arg(long, default_value_t = false)]
        shift: bool,
        /// Allow mounting risky host paths.
        #[arg(long, default_value_t = false)]
        allow_risky: bool,
        /// Skip confirmation prompts.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Detach a mount by device name or container path.
    Unmount {
        container: String,
        name_or_path: String,
    },
    /// List a container's mounts, comparing the project with the runtime.
    Mounts {
        container: String,
        /// Adopt untracked mounts and re-add missing ones.
        #[arg(long, default_value_t = false)]
        sync: bool,
    },
    /// Copy the container's sync entries into it (--verbose lists them).
    Sync { container: String },
    /// Manage host-to-container sync entries.
    #[command(subcommand)]
    SyncEntry(SyncEntryCommands),
    /// Manage runtime images.
    #[command(subcommand)]
    Image(ImageCommands),
    /// Run a command inside a running container.
    Exec {
        name: String,
        /// Command and arguments to run (after --).
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Open a login shell inside a running container.
    Shell {
        name: String,
        /// Log in as this user instead of the configured one.
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum SnapshotCommands {
    /// Snapshot a container.
    Create {
        container: String,
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List a container's snapshots.
    List { container: String },
    /// Delete a snapshot.
    Delete { container: String, name: String },
}

#[derive(Debug, Subcommand)]
enum SyncEntryCommands {
    /// Add or replace a sync entry.
    Add {
        container: String,
        source: String,
        dest: String,
    },
    /// Remove the sync entry with this source.
    Rm { container: String, source: String },
    /// List sync entries.
    List { container: String },
}

#[derive(Debug, Subcommand)]
enum ImageCommands {
    /// List images.
    List {
        /// Include images without an alias.
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },
    /// Delete an image by alias.
    Delete { alias: String },
    /// Rename an image alias.
    Rename { old: String, new: String },
    /// Publish a container as an image.
    Create { container: String, alias: String },
}

impl Commands {
    fn needs_runtime(&self) -> bool {
        !matches!(
            self,
            Self::Init { .. }
                | Self::SyncEntry(_)
                | Self::Completions { .. }
                | Self::ManPages { .. }
        )
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LXDEV_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.code)
        }
    }
}

fn run(cli: Cli) -> Result<u8, CliError> {
    let backend_name =
        std::env::var(BACKEND_ENV).unwrap_or_else(|_| DEFAULT_BACKEND.to_owned());
    let skip_prereqs = std::env::var("LXDEV_SKIP_PREREQS").as_deref() == Ok("1");
    if skip_prereqs {
        debug!("LXDEV_SKIP_PREREQS=1, skipping prerequisite check");
    } else if backend_name == DEFAULT_BACKEND && cli.command.needs_runtime() {
        let missing = lxdev_runtime::check_lxc_prereqs(LxcBackend::from_env().binary());
        if !missing.is_empty() {
            return Err(CliError::new(
                EXIT_FAILURE,
                lxdev_runtime::format_missing(&missing),
            ));
        }
    }

    let backend = lxdev_runtime::select_backend(&backend_name)
        .map_err(|e| CliError::new(EXIT_FAILURE, format!("{BACKEND_ENV}: {e}")))?;
    debug!(backend = %backend_name, dir = %cli.dir.display(), "selected runtime backend");
    let engine = Engine::new(&cli.dir, Arc::from(backend));
    let json = cli.json;

    match cli.command {
        Commands::Init {
            name,
            ports,
            user,
            password,
        } => commands::init::run(
            &engine,
            name,
            ports,
            user.as_deref(),
            password.as_deref(),
            json,
        ),
        Commands::Delete { force } => commands::delete::run(&engine, force),
        Commands::Create {
            name,
            image,
            ports,
            user,
            password,
        } => commands::create::run(
            &engine,
            &name,
            &image,
            &CreateOptions {
                ports,
                user,
                password,
            },
            json,
        ),
        Commands::Remove { name } => commands::lifecycle::remove(&engine, &name),
        Commands::Up { name } => commands::lifecycle::up(&engine, &name),
        Commands::Down { name } => commands::lifecycle::down(&engine, &name),
        Commands::Reset { name, snapshot } => {
            commands::lifecycle::reset(&engine, &name, snapshot.as_deref(), json)
        }
        Commands::Clone {
            source,
            name,
            snapshot,
        } => commands::clone::run(
            &engine,
            &source,
            &name,
            &CloneOptions {
                from_snapshot: snapshot,
            },
            json,
        ),
        Commands::List => commands::list::run(&engine, json),
        Commands::Status { name } => commands::status::run(&engine, &name, json),
        Commands::Snapshot(cmd) => match cmd {
            SnapshotCommands::Create {
                container,
                name,
                description,
            } => commands::snapshot::create(&engine, &container, &name, &description),
            SnapshotCommands::List { container } => {
                commands::snapshot::list(&engine, &container, json)
            }
            SnapshotCommands::Delete { container, name } => {
                commands::snapshot::delete(&engine, &container, &name)
            }
        },
        Commands::Mount {
            container,
            source,
            path,
            name,
            rw,
            shift,
            allow_risky,
            yes,
        } => commands::mount::mount(
            &engine,
            &container,
            &source,
            &path,
            MountOptions {
                name,
                read_write: rw,
                shift,
                allow_risky_path: allow_risky || yes,
            },
            json,
        ),
        Commands::Unmount {
            container,
            name_or_path,
        } => commands::mount::unmount(&engine, &container, &name_or_path, json),
        Commands::Mounts { container, sync } => {
            commands::mounts::run(&engine, &container, sync, json)
        }
        Commands::Sync { container } => {
            commands::sync::run(&engine, &container, cli.verbose, json)
        }
        Commands::SyncEntry(cmd) => match cmd {
            SyncEntryCommands::Add {
                container,
                source,
                dest,
            } => commands::sync::add(&engine, &container, &source, &dest),
            SyncEntryCommands::Rm { container, source } => {
                commands::sync::remove(&engine, &container, &source)
            }
            SyncEntryCommands::List { container } => {
                commands::sync::list(&engine, &container, json)
            }
        },
        Commands::Image(cmd) => match cmd {
            ImageCommands::List { all } => commands::image::list(&engine, all, json),
            ImageCommands::Delete { alias } => commands::image::delete(&engine, &alias),
            ImageCommands::Rename { old, new } => commands::image::rename(&engine, &old, &new),
            ImageCommands::Create { container, alias } => {
                commands::image::create(&engine, &container, &alias, json)
            }
        },
        Commands::Exec { name, command } => commands::exec::exec(&engine, &name, &command),
        Commands::Shell { name, user } => commands::exec::shell(&engine, &name, user.as_deref()),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    }
}
