//! External collaborators used after a restore
//!
//! Dependency installation and schema setup run as opaque subprocesses. The
//! post-restore secret comes from a pluggable [`SecretProvider`]; outside a
//! terminal it resolves to "skip".

use std::fs;
use std::io::IsTerminal;
use std::path::Path;
use std::process::{Command, Stdio};

use regex::{NoExpand, Regex};

use crate::crypto::SecureString;
use crate::error::{StashError, StashResult};
use crate::storage::file_io::ensure_parent;

/// Runs an external command in a directory
pub trait CommandRunner {
    fn run(&self, command: &[String], cwd: &Path) -> StashResult<()>;
}

/// Spawns real processes; stdout is discarded, stderr only surfaces on
/// failure
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &[String], cwd: &Path) -> StashResult<()> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| StashError::Hook("empty command".into()))?;

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| StashError::Hook(format!("`{}` could not start: {}", program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(StashError::Hook(format!(
            "`{}` exited with {}: {}",
            command.join(" "),
            output.status,
            stderr.trim()
        )))
    }
}

/// Supplies the single secret requested at the end of a restore
pub trait SecretProvider {
    /// `Ok(None)` means skip the configuring step
    fn provide(&self, key: &str) -> StashResult<Option<SecureString>>;
}

/// Never supplies a secret
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretProvider;

impl SecretProvider for NoSecretProvider {
    fn provide(&self, _key: &str) -> StashResult<Option<SecureString>> {
        Ok(None)
    }
}

/// Prompts on the terminal without echo; skips when stdin is not a terminal
/// or the answer is empty
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptSecretProvider;

impl SecretProvider for PromptSecretProvider {
    fn provide(&self, key: &str) -> StashResult<Option<SecureString>> {
        if !std::io::stdin().is_terminal() {
            return Ok(None);
        }

        let answer = rpassword::prompt_password(format!("Enter {} (leave empty to skip): ", key))
            .map_err(|e| StashError::Io(format!("Failed to read {}: {}", key, e)))?;
        let answer = SecureString::new(answer.trim());

        if answer.is_empty() {
            Ok(None)
        } else {
            Ok(Some(answer))
        }
    }
}

/// Fixed answer, for scripted restores
#[derive(Debug)]
pub struct StaticSecretProvider(pub Option<SecureString>);

impl SecretProvider for StaticSecretProvider {
    fn provide(&self, _key: &str) -> StashResult<Option<SecureString>> {
        Ok(self
            .0
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| SecureString::new(s.as_str())))
    }
}

/// Set `key=value` in an env file, replacing any existing line for `key` or
/// appending a new one
pub fn merge_env_value(env_file: &Path, key: &str, value: &str) -> StashResult<()> {
    let existing = match fs::read_to_string(env_file) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(StashError::Io(format!(
                "Failed to read {}: {}",
                env_file.display(),
                e
            )))
        }
    };

    let line = format!("{}={}", key, value);
    let pattern = Regex::new(&format!(r"(?m)^{}=.*$", regex::escape(key)))
        .map_err(|e| StashError::Pattern(e.to_string()))?;

    let updated = if pattern.is_match(&existing) {
        pattern.replace_all(&existing, NoExpand(&line)).into_owned()
    } else if existing.is_empty() || existing.ends_with('\n') {
        format!("{}{}\n", existing, line)
    } else {
        format!("{}\n{}\n", existing, line)
    };

    ensure_parent(env_file)?;
    fs::write(env_file, updated)
        .map_err(|e| StashError::Io(format!("Failed to write {}: {}", env_file.display(), e)))
}
