//! Precedence resolution for runtime settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables
//! 3. config.kdl (`~/.config/evox/config.kdl`, or `--config` / `EVOX_CONFIG`)
//! 4. Built-in defaults
//!
//! Secrets (`LINEAR_WEBHOOK_SECRET`, `LINEAR_API_KEY`) are read from the
//! environment only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::Result;
use crate::config::schema::{
    DEFAULT_FETCH_LIMIT, DEFAULT_LINEAR_API_URL, EvoxConfig, LogFormat, Roster,
};

pub const WEBHOOK_SECRET_ENV: &str = "LINEAR_WEBHOOK_SECRET";
pub const LINEAR_API_KEY_ENV: &str = "LINEAR_API_KEY";
pub const LINEAR_PROJECT_ID_ENV: &str = "LINEAR_PROJECT_ID";
pub const LINEAR_API_URL_ENV: &str = "EVOX_LINEAR_API_URL";
pub const DATABASE_ENV: &str = "EVOX_DB";
pub const DATA_DIR_ENV: &str = "EVOX_DATA_DIR";
pub const TARGET_PROJECT_ENV: &str = "EVOX_TARGET_PROJECT";
pub const CONFIG_PATH_ENV: &str = "EVOX_CONFIG";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3210;
pub const DEFAULT_TARGET_PROJECT: &str = "EVOX";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for settings resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config.kdl path
    pub config_path: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    pub fn with_listen(mut self, host: Option<String>, port: Option<u16>) -> Self {
        self.host = host;
        self.port = port;
        self
    }
}

/// Linear issue tracker settings.
#[derive(Clone)]
pub struct LinearSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub workspace: Option<String>,
    pub fetch_limit: u32,
}

impl Default for LinearSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LINEAR_API_URL.to_string(),
            api_key: None,
            project_id: None,
            workspace: None,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

impl std::fmt::Debug for LinearSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("project_id", &self.project_id)
            .field("workspace", &self.workspace)
            .field("fetch_limit", &self.fetch_limit)
            .finish()
    }
}

/// Fully resolved settings for one process.
#[derive(Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    /// Name of the project synced tasks attach to
    pub target_project: String,
    /// Shared secret for webhook signatures; `None` disables verification
    pub webhook_secret: Option<String>,
    pub linear: LinearSettings,
    pub roster: Roster,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
    /// Where each named value came from, for `config show`
    pub sources: BTreeMap<&'static str, ValueSource>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database_path(None),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            target_project: DEFAULT_TARGET_PROJECT.to_string(),
            webhook_secret: None,
            linear: LinearSettings::default(),
            roster: Roster::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
            log_dir: None,
            sources: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("target_project", &self.target_project)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("linear", &self.linear)
            .field("roster", &self.roster)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Settings {
    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Source of a named value; unrecorded values are defaults.
    pub fn source_of(&self, key: &str) -> ValueSource {
        self.sources
            .get(key)
            .cloned()
            .unwrap_or(ValueSource::Default)
    }
}

/// Mask a secret for display, keeping only a short prefix and suffix.
pub fn masked(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        let prefix: String = chars.iter().take(4).collect();
        format!("{}...", prefix)
    } else {
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }
}

/// System config path (`~/.config/evox/config.kdl`).
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("evox").join("config.kdl"))
}

fn default_database_path(data_dir: Option<PathBuf>) -> PathBuf {
    match data_dir {
        Some(dir) => dir.join("evox.db"),
        None => dirs::data_dir()
            .map(|d| d.join("evox").join("evox.db"))
            .unwrap_or_else(|| PathBuf::from("evox.db")),
    }
}

/// Resolve settings from the process environment and the config file.
pub fn resolve_settings(overrides: &ConfigOverrides) -> Result<Settings> {
    let env = |name: &str| std::env::var(name).ok();

    let config_path = overrides
        .config_path
        .clone()
        .or_else(|| env(CONFIG_PATH_ENV).filter(|s| !s.is_empty()).map(PathBuf::from))
        .or_else(system_config_path);

    let file = match config_path {
        Some(ref path) => EvoxConfig::load(path)?,
        None => EvoxConfig::default(),
    };

    Ok(resolve_settings_from(overrides, &file, env))
}

/// Resolve settings from explicit inputs.
///
/// `env` looks up environment variables; empty values count as unset.
pub fn resolve_settings_from(
    overrides: &ConfigOverrides,
    file: &EvoxConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    let mut settings = Settings::default();
    let mut sources = BTreeMap::new();

    let data_dir = env(DATA_DIR_ENV).map(PathBuf::from);
    let database = pick(
        overrides.database.clone(),
        env_value(&env, DATABASE_ENV).map(|(v, s)| (PathBuf::from(v), s)),
        file.database.clone(),
        default_database_path(data_dir.clone()),
    );
    // A data dir override alone still moves the database.
    let database = match (database.source.clone(), data_dir) {
        (ValueSource::Default, Some(_)) => Resolved::new(
            database.value,
            ValueSource::EnvVar(DATA_DIR_ENV.to_string()),
        ),
        _ => database,
    };
    settings.database = record(&mut sources, "database", database);

    let host = pick(
        overrides.host.clone(),
        None,
        file.host.clone(),
        DEFAULT_HOST.to_string(),
    );
    settings.host = record(&mut sources, "host", host);

    let port = pick(overrides.port, None, file.port, DEFAULT_PORT);
    settings.port = record(&mut sources, "port", port);

    let target_project = pick(
        None,
        env_value(&env, TARGET_PROJECT_ENV),
        file.target_project.clone(),
        DEFAULT_TARGET_PROJECT.to_string(),
    );
    settings.target_project = record(&mut sources, "target_project", target_project);

    if let Some((secret, source)) = env_value(&env, WEBHOOK_SECRET_ENV) {
        sources.insert("webhook_secret", source);
        settings.webhook_secret = Some(secret);
    }

    let api_url = pick(
        None,
        env_value(&env, LINEAR_API_URL_ENV),
        file.linear.api_url.clone(),
        DEFAULT_LINEAR_API_URL.to_string(),
    );
    settings.linear.api_url = record(&mut sources, "linear.api_url", api_url);

    if let Some((key, source)) = env_value(&env, LINEAR_API_KEY_ENV) {
        sources.insert("linear.api_key", source);
        settings.linear.api_key = Some(key);
    }

    if let Some(project_id) = pick_optional(
        env_value(&env, LINEAR_PROJECT_ID_ENV),
        file.linear.project_id.clone(),
    ) {
        settings.linear.project_id =
            Some(record(&mut sources, "linear.project_id", project_id));
    }

    if let Some(workspace) = file.linear.workspace.clone() {
        sources.insert("linear.workspace", ValueSource::ConfigFile);
        settings.linear.workspace = Some(workspace);
    }

    if let Some(limit) = file.linear.fetch_limit {
        sources.insert("linear.fetch_limit", ValueSource::ConfigFile);
        settings.linear.fetch_limit = limit;
    }

    if let Some(ref roster) = file.roster {
        sources.insert("roster", ValueSource::ConfigFile);
        settings.roster = roster.clone();
    }

    if let Some(ref level) = file.log_level {
        sources.insert("log_level", ValueSource::ConfigFile);
        settings.log_level = level.clone();
    }

    if let Some(format) = file.log_format {
        sources.insert("log_format", ValueSource::ConfigFile);
        settings.log_format = format;
    }

    if let Some(ref dir) = file.log_dir {
        sources.insert("log_dir", ValueSource::ConfigFile);
        settings.log_dir = Some(dir.clone());
    }

    settings.sources = sources;
    settings
}

fn env_value(
    env: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<(String, ValueSource)> {
    env(name).map(|v| (v, ValueSource::EnvVar(name.to_string())))
}

/// Apply the CLI > env > file > default chain to one value.
fn pick<T>(cli: Option<T>, env: Option<(T, ValueSource)>, file: Option<T>, default: T) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some((value, source)) = env {
        Resolved::new(value, source)
    } else if let Some(value) = file {
        Resolved::new(value, ValueSource::ConfigFile)
    } else {
        Resolved::new(default, ValueSource::Default)
    }
}

fn pick_optional<T>(env: Option<(T, ValueSource)>, file: Option<T>) -> Option<Resolved<T>> {
    match (env, file) {
        (Some((value, source)), _) => Some(Resolved::new(value, source)),
        (None, Some(value)) => Some(Resolved::new(value, ValueSource::ConfigFile)),
        (None, None) => None,
    }
}

fn record<T>(
    sources: &mut BTreeMap<&'static str, ValueSource>,
    key: &'static str,
    resolved: Resolved<T>,
) -> T {
    sources.insert(key, resolved.source);
    resolved.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(
            ValueSource::EnvVar("EVOX_DB".to_string()).to_string(),
            "env:EVOX_DB"
        );
        assert_eq!(ValueSource::ConfigFile.to_string(), "config");
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }

    #[test]
    fn test_resolve_defaults() {
        let settings =
            resolve_settings_from(&ConfigOverrides::new(), &EvoxConfig::default(), env_from(&[]));
        assert_eq!(settings.listen_addr(), "127.0.0.1:3210");
        assert_eq!(settings.target_project, "EVOX");
        assert_eq!(settings.linear.api_url, DEFAULT_LINEAR_API_URL);
        assert_eq!(settings.linear.fetch_limit, 100);
        assert!(settings.webhook_secret.is_none());
        assert_eq!(settings.roster.default_owner(), "max");
        assert_eq!(settings.source_of("port"), ValueSource::Default);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = EvoxConfig {
            target_project: Some("FROM_FILE".to_string()),
            ..Default::default()
        };
        let settings = resolve_settings_from(
            &ConfigOverrides::new(),
            &file,
            env_from(&[(TARGET_PROJECT_ENV, "FROM_ENV")]),
        );
        assert_eq!(settings.target_project, "FROM_ENV");
        assert_eq!(
            settings.source_of("target_project"),
            ValueSource::EnvVar(TARGET_PROJECT_ENV.to_string())
        );
    }

    #[test]
    fn test_cli_overrides_env_and_file() {
        let file = EvoxConfig {
            database: Some(PathBuf::from("/file.db")),
            port: Some(4000),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_database("/cli.db")
            .with_listen(None, Some(5000));
        let settings =
            resolve_settings_from(&overrides, &file, env_from(&[(DATABASE_ENV, "/env.db")]));
        assert_eq!(settings.database, PathBuf::from("/cli.db"));
        assert_eq!(settings.source_of("database"), ValueSource::CliFlag);
        assert_eq!(settings.port, 5000);
    }

    #[test]
    fn test_data_dir_moves_default_database() {
        let settings = resolve_settings_from(
            &ConfigOverrides::new(),
            &EvoxConfig::default(),
            env_from(&[(DATA_DIR_ENV, "/tmp/evox-data")]),
        );
        assert_eq!(settings.database, PathBuf::from("/tmp/evox-data/evox.db"));
    }

    #[test]
    fn test_secrets_from_env_only() {
        let settings = resolve_settings_from(
            &ConfigOverrides::new(),
            &EvoxConfig::default(),
            env_from(&[
                (WEBHOOK_SECRET_ENV, "whsec_1234567890abcdef"),
                (LINEAR_API_KEY_ENV, "lin_api_key"),
                (LINEAR_PROJECT_ID_ENV, "proj-1"),
            ]),
        );
        assert_eq!(settings.webhook_secret.as_deref(), Some("whsec_1234567890abcdef"));
        assert_eq!(settings.linear.api_key.as_deref(), Some("lin_api_key"));
        assert_eq!(settings.linear.project_id.as_deref(), Some("proj-1"));

        let debug = format!("{:?}", settings);
        assert!(!debug.contains("whsec_1234567890abcdef"));
        assert!(!debug.contains("lin_api_key"));
    }

    #[test]
    fn test_empty_env_counts_as_unset() {
        let settings = resolve_settings_from(
            &ConfigOverrides::new(),
            &EvoxConfig::default(),
            env_from(&[(WEBHOOK_SECRET_ENV, "")]),
        );
        assert!(settings.webhook_secret.is_none());
    }

    #[test]
    fn test_masked() {
        assert_eq!(masked("short"), "shor...");
        assert_eq!(masked("lin_api_0123456789abcd"), "lin_...abcd");
    }

    #[test]
    #[serial]
    fn test_resolve_settings_reads_process_env() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.kdl");
        std::fs::write(&config, "target-project \"FROM_FILE\"\nlisten port=4100\n").unwrap();

        // SAFETY: We're in a test environment and this test runs serially
        unsafe {
            std::env::set_var(TARGET_PROJECT_ENV, "FROM_ENV");
            std::env::set_var(LINEAR_API_KEY_ENV, "lin_api_process_env");
        }

        let mut overrides = ConfigOverrides::new();
        overrides.config_path = Some(config);
        let settings = resolve_settings(&overrides);

        unsafe {
            std::env::remove_var(TARGET_PROJECT_ENV);
            std::env::remove_var(LINEAR_API_KEY_ENV);
        }

        let settings = settings.unwrap();
        assert_eq!(settings.target_project, "FROM_ENV");
        assert_eq!(
            settings.source_of("target_project"),
            ValueSource::EnvVar(TARGET_PROJECT_ENV.to_string())
        );
        assert_eq!(settings.linear.api_key.as_deref(), Some("lin_api_process_env"));
        assert_eq!(settings.port, 4100);
        assert_eq!(settings.source_of("port"), ValueSource::ConfigFile);
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("board.kdl");
        std::fs::write(&config, "target-project \"BOARD\"\n").unwrap();

        // SAFETY: We're in a test environment and this test runs serially
        unsafe {
            std::env::remove_var(TARGET_PROJECT_ENV);
            std::env::set_var(CONFIG_PATH_ENV, &config);
        }
        let settings = resolve_settings(&ConfigOverrides::new());
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };

        assert_eq!(settings.unwrap().target_project, "BOARD");
    }
}
