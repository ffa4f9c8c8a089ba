//! Credential redaction for route files
//!
//! Rewrites `KEY = "value"` assignments for a fixed set of credential keys to
//! `KEY=""`. A key also matches as the tail of a longer identifier, so
//! `DB_PASSWORD` is stripped too. Everything else in the file is left
//! byte-for-byte untouched.
//! Works on raw bytes so files that are not valid UTF-8 still redact.

use std::borrow::Cow;

use regex::bytes::Regex;

use crate::error::{StashError, StashResult};

/// Credential keys that are stripped, matched case-sensitively
pub const CREDENTIAL_KEYS: [&str; 5] = ["GITHUB_TOKEN", "API_KEY", "SECRET", "PASSWORD", "TOKEN"];

/// Strips credential values from file contents
#[derive(Debug, Clone)]
pub struct Redactor {
    pattern: Regex,
}

impl Redactor {
    /// Build the redactor for [`CREDENTIAL_KEYS`]
    pub fn new() -> StashResult<Self> {
        // Longer keys first so GITHUB_TOKEN is not read as TOKEN
        let keys = CREDENTIAL_KEYS
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(
            r#"\b(\w*(?:{}))[ \t]*=[ \t]*(?:"(?:\\.|[^"\\\r\n])*"|'(?:\\.|[^'\\\r\n])*'|[^\s"',;]*)"#,
            keys
        ))
        .map_err(|e| StashError::Pattern(format!("credential pattern: {}", e)))?;

        Ok(Self { pattern })
    }

    /// Return `content` with every credential value emptied
    pub fn redact<'a>(&self, content: &'a [u8]) -> Cow<'a, [u8]> {
        self.pattern.replace_all(content, &b"${1}=\"\""[..])
    }

    /// Number of credential assignments present in `content`
    pub fn count(&self, content: &[u8]) -> usize {
        self.pattern.find_iter(content).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redact(input: &str) -> String {
        let redactor = Redactor::new().unwrap();
        String::from_utf8(redactor.redact(input.as_bytes()).into_owned()).unwrap()
    }

    #[test]
    fn test_quoted_token() {
        let out = redact(r#"TOKEN="abc123""#);
        assert!(out.contains(r#"TOKEN="""#));
        assert!(!out.contains("abc123"));
    }

    #[test]
    fn test_all_keys_and_spacing() {
        let input = "GITHUB_TOKEN = 'ghp_x'\nAPI_KEY=bare-value\nconst SECRET = \"s3\";\nPASSWORD= hunter2\n";
        let out = redact(input);

        assert_eq!(
            out,
            "GITHUB_TOKEN=\"\"\nAPI_KEY=\"\"\nconst SECRET=\"\";\nPASSWORD=\"\"\n"
        );
    }

    #[test]
    fn test_non_matching_lines_untouched() {
        let input = "router.get('/health', ok);\nconst token = \"lowercase stays\";\nMY_SECRET_NAME=keep\nTOKEN=\"drop\"\n";
        let out = redact(input);

        let before: Vec<&str> = input.lines().collect();
        let after: Vec<&str> = out.lines().collect();
        assert_eq!(before[0], after[0]);
        assert_eq!(before[1], after[1]);
        assert_eq!(before[2], after[2]);
        assert_eq!(after[3], "TOKEN=\"\"");
    }

    #[test]
    fn test_prefixed_keys() {
        let input = "DB_PASSWORD=hunter2\nJWT_SECRET=\"s3cr3t\"\nSTRIPE_API_KEY='sk_live_x'\nnextAuthTOKEN = abc\n";
        let out = redact(input);

        assert_eq!(
            out,
            "DB_PASSWORD=\"\"\nJWT_SECRET=\"\"\nSTRIPE_API_KEY=\"\"\nnextAuthTOKEN=\"\"\n"
        );
        for leaked in ["hunter2", "s3cr3t", "sk_live_x", "abc"] {
            assert!(!out.contains(leaked), "{} leaked", leaked);
        }
    }

    #[test]
    fn test_escaped_quotes() {
        let out = redact("PASSWORD=\"ab\\\"cd\"; SECRET='it\\'s'\n");
        assert_eq!(out, "PASSWORD=\"\"; SECRET=\"\"\n");
    }

    #[test]
    fn test_key_inside_longer_name_untouched() {
        let input = "MY_SECRET_NAME=keep\nTOKENIZER=bert\n";
        assert_eq!(redact(input), input);
    }

    #[test]
    fn test_no_match_borrows() {
        let redactor = Redactor::new().unwrap();
        let content = b"nothing to see here";
        assert!(matches!(redactor.redact(content), Cow::Borrowed(_)));
        assert_eq!(redactor.count(content), 0);
    }

    #[test]
    fn test_non_utf8_content() {
        let redactor = Redactor::new().unwrap();
        let mut content = vec![0xFF, 0xFE, b'\n'];
        content.extend_from_slice(b"API_KEY=zzz");

        let out = redactor.redact(&content);
        assert_eq!(&out[..3], &[0xFF, 0xFE, b'\n']);
        assert_eq!(&out[3..], b"API_KEY=\"\"");
    }
}
