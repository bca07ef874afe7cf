//! External collaborator interfaces (spec §6). The engine consumes these as
//! narrow traits; default implementations live in `runtime.rs`. Keeping them
//! as traits — rather than calling `tokio::process::Command` or `reqwest`
//! directly from the executors — is what lets tests substitute mocks without
//! touching a real shell, network, or secrets store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// Options a shell statement or external-tool statement (docker/git) passes
/// down to the configured per-platform shell (spec §4.6, §6).
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    pub shell: Option<String>,
    pub environment: HashMap<String, String>,
    pub capture: bool,
    pub stream: bool,
    pub cwd: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub success: bool,
}

/// `execute(command, options) -> {stdout, stderr, exit_code, duration, success}`
/// (spec §6 Shell interface).
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn execute(&self, command: &str, options: &ShellOptions) -> std::io::Result<ShellOutput>;
}

/// `set/get/delete/exists/list` on a namespaced key-value store (spec §6
/// Secrets interface). Assumed thread-safe per spec §5.
#[async_trait]
pub trait SecretsStore: Send + Sync {
    async fn set(&self, namespace: &str, key: &str, value: &str);
    async fn get(&self, namespace: &str, key: &str) -> Option<String>;
    async fn delete(&self, namespace: &str, key: &str) -> bool;
    async fn exists(&self, namespace: &str, key: &str) -> bool;
    async fn list(&self, namespace: &str) -> Vec<String>;
}

/// Tool/project/environment detection (spec §6 Detection interface).
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect_project_type(&self) -> Vec<String>;
    async fn is_tool_available(&self, name: &str) -> bool;
    async fn get_tool_version(&self, name: &str) -> Option<String>;
    async fn detect_environment(&self) -> String;
    fn compare_version(&self, actual: &str, op: &str, want: &str) -> bool;
}

/// Per-scheme remote content fetch (spec §6 Remote fetcher interface):
/// `fetch(ctx, path, ref) -> bytes`. Schemes are `github`, `https`, or a
/// curated "hub" namespace table.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, path: &str, git_ref: Option<&str>) -> Result<Vec<u8>, String>;
}

/// TTL-based cache for fetched include content (spec §6 Cache interface),
/// with an explicit stale lookup for the network-error fallback path.
#[async_trait]
pub trait IncludeCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn get_stale(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, bytes: Vec<u8>, ttl: Duration);
    async fn close(&self);
}
