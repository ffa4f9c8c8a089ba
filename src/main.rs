use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use stash::cli::{handle_backup_command, BackupCommands};
use stash::config::{StashConfig, StashPaths};

#[derive(Parser)]
#[command(
    name = "stash",
    version,
    about = "Project backup and restore with encrypted secrets",
    long_about = "stash snapshots a project directory into compressed, self-describing \
                  backups. Secret files are encrypted, credentials in route files are \
                  redacted, and only the newest backups are kept."
)]
struct Cli {
    /// Project directory (defaults to STASH_PROJECT_DIR or the current directory)
    #[arg(short = 'C', long, global = true)]
    project_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration for this project
    Init,

    /// Show current configuration and paths
    Config,

    #[command(flatten)]
    Backup(BackupCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(cli.log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    // Initialize paths and config
    let paths = StashPaths::new(cli.project_dir)?;
    let config = StashConfig::load_or_default(&paths)?;

    match cli.command {
        Some(Commands::Init) => {
            if paths.is_initialized() {
                println!("Already initialized: {}", paths.config_file().display());
                return Ok(());
            }
            config.save(&paths)?;
            println!("Initialized stash for '{}'", config.project.name);
            println!("Config written to {}", paths.config_file().display());
            println!();
            println!("Run 'stash create' to take the first backup.");
        }
        Some(Commands::Config) => {
            println!("stash Configuration");
            println!("===================");
            println!("Project root:     {}", paths.project_root().display());
            println!("Config file:      {}", paths.config_file().display());
            println!("Backup directory: {}", config.backup_dir(&paths).display());
            println!(
                "Key file:         {}",
                paths.key_file(&config.project.name).display()
            );
            println!();
            println!("Settings:");
            println!(
                "  Project:      {} {}",
                config.project.name, config.project.version
            );
            println!("  Max backups:  {}", config.storage.max_backups);
            println!("  Compression:  {}", config.storage.compression);
            println!("  Include:      {}", config.patterns.include.join(", "));
            println!("  Exclude:      {}", config.patterns.exclude.join(", "));
            println!("  Encrypt:      {}", config.patterns.encrypt.join(", "));
            println!(
                "  Routes:       {} ({})",
                config.routes.name,
                config.routes.patterns.join(", ")
            );
        }
        Some(Commands::Backup(cmd)) => {
            handle_backup_command(&paths, &config, cmd)?;
        }
        None => {
            println!("stash - project backup and restore");
            println!();
            println!("Run 'stash --help' for usage information.");
            println!("Run 'stash create' to back up the current project.");
        }
    }

    Ok(())
}
