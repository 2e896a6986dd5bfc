//! KDL schema for config.kdl.
//!
//! This module provides:
//! - Rust structs representing the KDL schema
//! - Parsing from KDL documents and files
//! - The role to canonical-name roster used by owner parsing
//! - Default values

use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};

use crate::models::AgentRole;
use crate::{Error, Result};

/// Default GraphQL endpoint of the Linear API.
pub const DEFAULT_LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Default number of issues requested by one bulk sync.
pub const DEFAULT_FETCH_LIMIT: u32 = 100;

/// Format of the stderr log layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output (default)
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role to canonical agent name table.
///
/// Names are stored lower-cased and deduplicated; the first entry for a
/// name wins. A roster is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roster {
    entries: Vec<(AgentRole, String)>,
}

impl Roster {
    /// Build a roster from `(role, name)` pairs.
    pub fn new(entries: Vec<(AgentRole, String)>) -> Result<Self> {
        let mut canonical: Vec<(AgentRole, String)> = Vec::with_capacity(entries.len());
        for (role, name) in entries {
            let name = name.trim().to_lowercase();
            if name.is_empty() || canonical.iter().any(|(_, n)| *n == name) {
                continue;
            }
            canonical.push((role, name));
        }

        if canonical.is_empty() {
            return Err(Error::Configuration(
                "roster must name at least one agent".to_string(),
            ));
        }

        Ok(Self { entries: canonical })
    }

    pub fn entries(&self) -> &[(AgentRole, String)] {
        &self.entries
    }

    /// Canonical names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, name)| name.as_str())
    }

    /// Owner used when nothing in an issue names one: the `pm` entry, else the first entry.
    pub fn default_owner(&self) -> &str {
        self.entries
            .iter()
            .find(|(role, _)| *role == AgentRole::Pm)
            .or_else(|| self.entries.first())
            .map(|(_, name)| name.as_str())
            .unwrap_or_default()
    }

    /// Canonical form of `name` if it is on the roster (case-insensitive).
    pub fn canonical(&self, name: &str) -> Option<&str> {
        let wanted = name.trim().to_lowercase();
        self.names().find(|n| *n == wanted)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.canonical(name).is_some()
    }

    pub fn role_of(&self, name: &str) -> Option<AgentRole> {
        let wanted = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(_, n)| *n == wanted)
            .map(|(role, _)| *role)
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            entries: vec![
                (AgentRole::Pm, "max".to_string()),
                (AgentRole::Backend, "sam".to_string()),
                (AgentRole::Frontend, "leo".to_string()),
            ],
        }
    }
}

/// `linear { ... }` block of config.kdl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearSection {
    pub api_url: Option<String>,
    pub project_id: Option<String>,
    pub workspace: Option<String>,
    pub fetch_limit: Option<u32>,
}

/// Preferences stored in config.kdl.
///
/// Secrets never live here; they come from the environment only.
///
/// # KDL Schema
///
/// ```kdl
/// database "/var/lib/evox/evox.db"
/// listen host="127.0.0.1" port=3210
/// target-project "EVOX"
/// log-level "info"
/// log-format "pretty"  // or "json"
/// log-dir "/var/log/evox"
/// linear {
///     api-url "https://api.linear.app/graphql"
///     project-id "d5bf6ea1-..."
///     workspace "affitorai"
///     fetch-limit 100
/// }
/// roster {
///     pm "max"
///     backend "sam"
///     frontend "leo"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvoxConfig {
    pub database: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub target_project: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub log_dir: Option<PathBuf>,
    pub linear: LinearSection,
    pub roster: Option<Roster>,
}

impl EvoxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from KDL text.
    pub fn parse(content: &str) -> Result<Self> {
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid config.kdl: {}", e)))?;
        Self::from_kdl(&doc)
    }

    /// Load config from a file. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes are ignored. Malformed values are reported, except that
    /// out-of-range numbers are dropped so the default applies.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();

        config.database = string_arg(doc, "database").map(PathBuf::from);
        config.target_project = string_arg(doc, "target-project");
        config.log_level = string_arg(doc, "log-level");
        config.log_dir = string_arg(doc, "log-dir").map(PathBuf::from);

        if let Some(format) = string_arg(doc, "log-format") {
            config.log_format = Some(LogFormat::parse(&format).ok_or_else(|| {
                Error::Configuration(format!("log-format must be pretty or json, got {}", format))
            })?);
        }

        // listen host="..." port=...
        if let Some(node) = doc.get("listen") {
            for entry in node.entries() {
                match entry.name().map(|n| n.value()) {
                    Some("host") => {
                        if let Some(s) = entry.value().as_string() {
                            config.host = Some(s.to_string());
                        }
                    }
                    Some("port") => {
                        if let Some(i) = entry.value().as_integer() {
                            config.port = u16::try_from(i).ok();
                        }
                    }
                    _ => {}
                }
            }
        }

        if let Some(linear) = doc.get("linear").and_then(|n| n.children()) {
            config.linear = LinearSection {
                api_url: string_arg(linear, "api-url"),
                project_id: string_arg(linear, "project-id"),
                workspace: string_arg(linear, "workspace"),
                fetch_limit: integer_arg(linear, "fetch-limit")
                    .and_then(|i| u32::try_from(i).ok())
                    .filter(|n| *n > 0),
            };
        }

        if let Some(node) = doc.get("roster") {
            config.roster = Some(parse_roster(node)?);
        }

        Ok(config)
    }
}

fn parse_roster(node: &KdlNode) -> Result<Roster> {
    let mut entries = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let role_name = child.name().value();
            let role: AgentRole = role_name
                .parse()
                .map_err(|e: String| Error::Configuration(format!("roster: {}", e)))?;
            let name = child
                .entries()
                .first()
                .and_then(|e| e.value().as_string())
                .ok_or_else(|| {
                    Error::Configuration(format!("roster entry '{}' needs a name", role_name))
                })?;
            entries.push((role, name.to_string()));
        }
    }
    Roster::new(entries)
}

/// First argument of `name` as a string.
fn string_arg(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_string())
        .map(|s| s.to_string())
}

fn integer_arg(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_integer())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = EvoxConfig::parse("").unwrap();
        assert_eq!(config, EvoxConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            database "/tmp/evox.db"
            listen host="0.0.0.0" port=8080
            target-project "NEXUS"
            log-level "debug"
            log-format "json"
            linear {
                api-url "http://localhost:9999/graphql"
                project-id "proj-123"
                workspace "acme"
                fetch-limit 50
            }
            roster {
                pm "Ada"
                backend "bob"
            }
        "#;
        let config = EvoxConfig::parse(kdl).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/evox.db")));
        assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.target_project.as_deref(), Some("NEXUS"));
        assert_eq!(config.log_format, Some(LogFormat::Json));
        assert_eq!(config.linear.project_id.as_deref(), Some("proj-123"));
        assert_eq!(config.linear.workspace.as_deref(), Some("acme"));
        assert_eq!(config.linear.fetch_limit, Some(50));

        let roster = config.roster.unwrap();
        assert_eq!(roster.default_owner(), "ada");
        assert_eq!(roster.role_of("BOB"), Some(AgentRole::Backend));
    }

    #[test]
    fn test_parse_out_of_range_port_ignored() {
        let config = EvoxConfig::parse("listen port=70000").unwrap();
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_parse_invalid_log_format() {
        let err = EvoxConfig::parse(r#"log-format "xml""#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_parse_unknown_roster_role() {
        let err = EvoxConfig::parse(r#"roster { wizard "merlin" }"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_empty_roster_is_error() {
        let err = EvoxConfig::parse("roster {}").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvoxConfig::load(&dir.path().join("config.kdl")).unwrap();
        assert_eq!(config, EvoxConfig::default());
    }

    #[test]
    fn test_roster_dedups_and_lowercases() {
        let roster = Roster::new(vec![
            (AgentRole::Backend, " Sam ".to_string()),
            (AgentRole::Frontend, "SAM".to_string()),
            (AgentRole::Qa, "quinn".to_string()),
        ])
        .unwrap();
        assert_eq!(roster.names().collect::<Vec<_>>(), vec!["sam", "quinn"]);
        assert_eq!(roster.role_of("sam"), Some(AgentRole::Backend));
        // No pm entry: the first entry owns unclaimed work.
        assert_eq!(roster.default_owner(), "sam");
    }

    #[test]
    fn test_default_roster() {
        let roster = Roster::default();
        assert_eq!(roster.default_owner(), "max");
        assert_eq!(roster.canonical("LEO"), Some("leo"));
        assert!(!roster.contains("nobody"));
    }
}
