//! Backup CLI commands
//!
//! Implements the create, list, restore and housekeeping commands.

use std::cell::Cell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Subcommand;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::{
    BackupInfo, BackupManager, BackupStage, LogObserver, NoSecretProvider, ProgressObserver,
    PromptSecretProvider, RestoreManager, RestoreStage, ENCRYPTED_SUFFIX,
};
use crate::config::paths::StashPaths;
use crate::config::settings::StashConfig;
use crate::crypto::{decrypt, EncryptionKey, Envelope};
use crate::error::{StashError, StashResult};
use crate::storage::file_io::{ensure_parent, remove_path};

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Skip compression and keep the backup as a plain directory
        #[arg(short, long)]
        quick: bool,
    },

    /// List all available backups
    List,

    /// Restore from a backup into the project directory
    Restore {
        /// Backup identifier (prompted for when omitted, 'latest' for most recent)
        backup: Option<String>,

        /// Skip dependency installation and schema setup
        #[arg(long)]
        no_hooks: bool,

        /// Do not ask for the post-restore secret
        #[arg(long)]
        no_secret: bool,
    },

    /// Show information about a specific backup
    Info {
        /// Backup identifier
        backup: String,
    },

    /// Delete old backups according to the retention policy
    Prune {
        /// Number of backups to keep (defaults to storage.max_backups)
        #[arg(short, long)]
        keep: Option<usize>,
    },

    /// Decrypt a single `.encrypted` file from a backup
    Decrypt {
        /// Encrypted envelope file
        file: PathBuf,

        /// Output path (defaults to the file name without `.encrypted`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate the encryption key file
    Keygen {
        /// Replace an existing key file
        #[arg(short, long)]
        force: bool,
    },
}

/// One row of `stash list`
#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
}

impl BackupRow {
    fn new(index: usize, backup: &BackupInfo) -> Self {
        let age = chrono::Utc::now().signed_duration_since(backup.created_at);
        Self {
            index,
            id: backup.id.to_string(),
            kind: backup.kind.label(),
            age: format_duration(age),
            size: format_size(backup.size_bytes),
        }
    }
}

/// Remembers the last restore stage entered so a failure can tell whether
/// the working tree was touched
#[derive(Default)]
struct StageTracker {
    last: Cell<Option<RestoreStage>>,
}

impl ProgressObserver for StageTracker {
    fn backup_stage(&self, stage: BackupStage) {
        LogObserver.backup_stage(stage);
    }

    fn restore_stage(&self, stage: RestoreStage) {
        self.last.set(Some(stage));
        LogObserver.restore_stage(stage);
    }
}

/// Handle a backup command
pub fn handle_backup_command(
    paths: &StashPaths,
    config: &StashConfig,
    cmd: BackupCommands,
) -> StashResult<()> {
    let key_file = paths.key_file(&config.project.name);
    let manager = BackupManager::new(paths.clone(), config.clone());

    match cmd {
        BackupCommands::Create { quick } => {
            let key = EncryptionKey::load_or_generate(&key_file)?;
            let compress = config.storage.compression && !quick;

            println!("Creating backup of '{}'...", config.project.name);
            let (outcome, deleted) = manager
                .with_key(key)
                .create_backup_with_retention(compress)?;

            println!("Backup created: {}", outcome.id);
            println!("Location: {}", outcome.location.display());
            println!(
                "Files: {} regular, {} encrypted",
                outcome.stats.regular, outcome.stats.encrypted
            );

            if outcome.report.has_failures() {
                println!();
                println!("{} file(s) were left out:", outcome.report.failed.len());
                for failure in &outcome.report.failed {
                    println!("  {}: {}", failure.path.display(), failure.reason);
                }
            }

            if !deleted.is_empty() {
                println!("Pruned {} old backup(s).", deleted.len());
            }
        }

        BackupCommands::List => {
            let backups = manager.list_backups()?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: stash create");
                return Ok(());
            }

            print_backup_table(&backups);
            println!();
            println!(
                "Total: {} backup(s) in {}",
                backups.len(),
                manager.backup_dir().display()
            );
        }

        BackupCommands::Restore {
            backup,
            no_hooks,
            no_secret,
        } => {
            let backup = match backup {
                Some(backup) => resolve_backup_id(&manager, &backup)?,
                None => match prompt_backup_choice(&manager)? {
                    Some(backup) => backup,
                    None => {
                        println!("Aborted.");
                        return Ok(());
                    }
                },
            };

            let tracker = Rc::new(StageTracker::default());
            let mut restore_manager = RestoreManager::new(paths.clone(), config.clone())
                .with_observer(tracker.clone());
            if no_hooks {
                restore_manager = restore_manager.without_hooks();
            }
            if no_secret {
                restore_manager = restore_manager.with_secret_provider(Rc::new(NoSecretProvider));
            } else {
                restore_manager =
                    restore_manager.with_secret_provider(Rc::new(PromptSecretProvider));
            }

            println!("Restoring {} into {}...", backup, paths.project_root().display());
            let result = match restore_manager.restore(&backup) {
                Ok(result) => result,
                Err(e) => {
                    if e.is_not_found() {
                        print_available(&manager);
                    }
                    let touched = tracker.last.get().map_or(false, |s| s.is_destructive());
                    if touched {
                        eprintln!("Restore stopped after files were written; the working tree may be partially restored.");
                    } else {
                        eprintln!("No files in the working tree were modified.");
                    }
                    return Err(e);
                }
            };

            println!("Restore complete!");
            println!("{}", result.summary());

            if !result.skipped_encrypted.is_empty() {
                println!();
                println!("Encrypted files were not restored. Decrypt them with:");
                println!("  stash decrypt <FILE>");
            }

            if !result.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &result.warnings {
                    println!("  {}", warning);
                }
            }
        }

        BackupCommands::Info { backup } => {
            let backup = resolve_backup_id(&manager, &backup)?;
            let info = manager
                .get_backup(&backup)?
                .ok_or_else(|| StashError::backup_not_found(&backup))?;
            let manifest = RestoreManager::new(paths.clone(), config.clone()).inspect(&backup)?;

            println!("Backup Details");
            println!("==============");
            println!("ID:       {}", manifest.id);
            println!("Location: {}", info.path.display());
            println!("Kind:     {}", info.kind.label());
            println!("Size:     {}", format_size(info.size_bytes));
            println!(
                "Created:  {}",
                manifest.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!(
                "Project:  {} {}",
                manifest.project_name, manifest.version
            );
            println!("Tool:     {}", manifest.runtime_version);
            println!("Platform: {}", manifest.platform);
            println!();
            println!("Contents:");
            println!("  Regular files:   {}", manifest.stats.regular);
            println!("  Encrypted files: {}", manifest.stats.encrypted);
        }

        BackupCommands::Prune { keep } => {
            let keep = keep.unwrap_or(config.storage.max_backups);
            let deleted = manager.prune(keep)?;

            if deleted.is_empty() {
                println!("No backups to prune (keeping {}).", keep);
            } else {
                for path in &deleted {
                    println!("Deleted {}", path.display());
                }
                println!("Deleted {} backup(s).", deleted.len());
            }
        }

        BackupCommands::Decrypt { file, output } => {
            let key = EncryptionKey::load(&key_file)?;
            let output = match output {
                Some(output) => output,
                None => decrypted_name(&file)?,
            };

            let json = fs::read_to_string(&file)
                .map_err(|e| StashError::Io(format!("Failed to read {}: {}", file.display(), e)))?;
            let plaintext = decrypt(&Envelope::from_json(&json)?, &key)?;

            ensure_parent(&output)?;
            fs::write(&output, plaintext).map_err(|e| {
                StashError::Io(format!("Failed to write {}: {}", output.display(), e))
            })?;
            println!("Decrypted {} -> {}", file.display(), output.display());
        }

        BackupCommands::Keygen { force } => {
            if key_file.exists() {
                if !force {
                    return Err(StashError::Config(format!(
                        "Key file already exists at {} (use --force to replace it)",
                        key_file.display()
                    )));
                }
                println!("WARNING: backups encrypted with the old key can no longer be decrypted.");
                remove_path(&key_file)?;
            }

            EncryptionKey::generate().save(&key_file)?;
            println!("Key written to {}", key_file.display());
        }
    }

    Ok(())
}

fn print_backup_table(backups: &[BackupInfo]) {
    let rows: Vec<BackupRow> = backups
        .iter()
        .enumerate()
        .map(|(i, backup)| BackupRow::new(i + 1, backup))
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Show what can be restored after an unknown identifier
fn print_available(manager: &BackupManager) {
    match manager.list_backups() {
        Ok(backups) if !backups.is_empty() => {
            println!("Available backups:");
            print_backup_table(&backups);
        }
        Ok(_) => println!("No backups available in {}", manager.backup_dir().display()),
        Err(e) => tracing::warn!("could not list backups: {}", e),
    }
}

/// List backups and read a 1-based index from stdin
fn prompt_backup_choice(manager: &BackupManager) -> StashResult<Option<String>> {
    let backups = manager.list_backups()?;
    if backups.is_empty() {
        return Err(StashError::NotFound {
            entity_type: "Backup",
            identifier: manager.backup_dir().display().to_string(),
        });
    }

    print_backup_table(&backups);
    print!("Backup to restore [1-{}, empty to cancel]: ", backups.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let index: usize = input
        .parse()
        .map_err(|_| StashError::Config(format!("Not a backup number: {}", input)))?;

    backups
        .get(index.wrapping_sub(1))
        .map(|b| Some(b.id.to_string()))
        .ok_or_else(|| StashError::Config(format!("No backup numbered {}", index)))
}

/// Resolve a backup identifier, handling the "latest" keyword
fn resolve_backup_id(manager: &BackupManager, backup: &str) -> StashResult<String> {
    if backup.eq_ignore_ascii_case("latest") {
        return manager
            .get_latest_backup()?
            .map(|b| b.id.to_string())
            .ok_or_else(|| StashError::backup_not_found("latest"));
    }

    Ok(backup.to_string())
}

/// `secret.env.encrypted` -> `secret.env`
fn decrypted_name(file: &Path) -> StashResult<PathBuf> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match name.strip_suffix(ENCRYPTED_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => Ok(file.with_file_name(stripped)),
        _ => Err(StashError::Config(format!(
            "Cannot derive an output name for {} (pass --output)",
            file.display()
        ))),
    }
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
