//! Common test utilities for EVOX integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.local/share/evox/` directory or `~/.config/evox/config.kdl`.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// Environment variables that would leak host configuration into a test run.
const HOST_ENV: &[&str] = &[
    "EVOX_DB",
    "EVOX_TARGET_PROJECT",
    "EVOX_LINEAR_API_URL",
    "LINEAR_WEBHOOK_SECRET",
    "LINEAR_API_KEY",
    "LINEAR_PROJECT_ID",
    "RUST_LOG",
];

/// A test environment with isolated data storage.
///
/// The `evox()` method returns a `Command` that points `EVOX_DATA_DIR` and
/// `EVOX_CONFIG` into a fresh temp directory per invocation, making tests
/// parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and seed the project and roster agents.
    pub fn seeded() -> Self {
        let env = Self::new();
        env.evox().arg("seed").assert().success();
        env
    }

    /// Get a Command for the evox binary with isolated data and config.
    pub fn evox(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_evox"));
        cmd.current_dir(self.data_dir.path());
        for name in HOST_ENV {
            cmd.env_remove(name);
        }
        cmd.env("EVOX_DATA_DIR", self.data_dir.path());
        cmd.env("EVOX_CONFIG", self.config_path());
        cmd
    }

    /// Path of the (initially absent) config file used by `evox()`.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.data_dir.path().join("config.kdl")
    }

    /// Write a config file picked up by subsequent commands.
    pub fn write_config(&self, contents: &str) {
        std::fs::write(self.config_path(), contents).unwrap();
    }

    /// Run a command and parse its stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.evox().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "evox {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
