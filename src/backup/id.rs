//! Backup identifiers
//!
//! `<project>-<timestamp>-<suffix>`, e.g.
//! `shop-2025-11-27T14-30-22-456Z-3f9a1c0b7d2e`. The timestamp is RFC 3339 with
//! `:` and `.` replaced so the identifier is safe as a file name.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the random hex suffix
const SUFFIX_LEN: usize = 12;

/// Unique name of one backup run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    /// Generate a new identifier for `project` at `at`
    pub fn generate(project: &str, at: DateTime<Utc>) -> Self {
        let timestamp = at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace(&[':', '.'][..], "-");
        let suffix = Uuid::new_v4().simple().to_string();

        Self(format!(
            "{}-{}-{}",
            sanitize(project),
            timestamp,
            &suffix[..SUFFIX_LEN]
        ))
    }

    /// Wrap an existing identifier (e.g. a directory name)
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BackupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keep identifiers filesystem-friendly
fn sanitize(project: &str) -> String {
    let cleaned: String = project
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "project".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 27, 14, 30, 22).unwrap()
    }

    #[test]
    fn test_format() {
        let id = BackupId::generate("shop", fixed_clock());
        let s = id.as_str();

        assert!(s.starts_with("shop-2025-11-27T14-30-22-000Z-"));
        assert!(!s.contains(':'));
        assert!(!s.contains('.'));

        let suffix = s.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unique_under_fixed_clock() {
        let ids: HashSet<BackupId> = (0..1000)
            .map(|_| BackupId::generate("shop", fixed_clock()))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_project_name_sanitized() {
        let id = BackupId::generate("my app/v2", fixed_clock());
        assert!(id.as_str().starts_with("my-app-v2-"));

        let id = BackupId::generate("", fixed_clock());
        assert!(id.as_str().starts_with("project-"));
    }
}
