//! Default (non-test) implementations of the external interfaces in
//! `traits.rs` (spec §6 "Default implementations are provided for each
//! external interface so the crate is runnable standalone"). Each mirrors a
//! real-filesystem/real-process analogue of something the teacher already
//! does against its in-memory sandbox.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::network::{FetchResponse, NetworkConfig, SecureFetchOptions};
use crate::traits::{Detector, IncludeCache, RemoteFetcher, SecretsStore, ShellOptions, ShellOutput, ShellRunner};

/// `tokio::process::Command` spawning the configured per-platform shell
/// (`sh -c` / `cmd /C`) — the real-process analogue of the teacher's
/// in-memory `execute_simple_command`.
pub struct ProcessShellRunner {
    pub executable: String,
    pub shell_flag: String,
}

impl Default for ProcessShellRunner {
    fn default() -> Self {
        if cfg!(windows) {
            Self { executable: "cmd".into(), shell_flag: "/C".into() }
        } else {
            Self { executable: "sh".into(), shell_flag: "-c".into() }
        }
    }
}

#[async_trait]
impl ShellRunner for ProcessShellRunner {
    async fn execute(&self, command: &str, options: &ShellOptions) -> std::io::Result<ShellOutput> {
        let start = Instant::now();
        let mut cmd = Command::new(options.shell.as_deref().unwrap_or(&self.executable));
        cmd.arg(&self.shell_flag).arg(command);
        cmd.envs(&options.environment);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        cmd.kill_on_drop(true);
        let output = cmd.output().await?;
        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
            success: output.status.success(),
        })
    }
}

/// In-memory namespaced secrets store (spec §6: "a real backend is
/// explicitly out of scope").
#[derive(Default)]
pub struct InMemorySecretsStore {
    inner: Mutex<HashMap<String, IndexMap<String, String>>>,
}

#[async_trait]
impl SecretsStore for InMemorySecretsStore {
    async fn set(&self, namespace: &str, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    async fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.inner.lock().unwrap().get(namespace).and_then(|ns| ns.get(key).cloned())
    }

    async fn delete(&self, namespace: &str, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .get_mut(namespace)
            .map(|ns| ns.shift_remove(key).is_some())
            .unwrap_or(false)
    }

    async fn exists(&self, namespace: &str, key: &str) -> bool {
        self.inner.lock().unwrap().get(namespace).map(|ns| ns.contains_key(key)).unwrap_or(false)
    }

    async fn list(&self, namespace: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Shells out to `which`/`command -v` and version flags, reusing
/// `ShellRunner` rather than re-implementing process spawning.
pub struct ShellDetector<R: ShellRunner> {
    pub shell: R,
}

impl<R: ShellRunner> ShellDetector<R> {
    pub fn new(shell: R) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl<R: ShellRunner + Sync> Detector for ShellDetector<R> {
    async fn detect_project_type(&self) -> Vec<String> {
        let mut tags = Vec::new();
        let markers = [
            ("Cargo.toml", "rust"),
            ("package.json", "node"),
            ("go.mod", "go"),
            ("requirements.txt", "python"),
            ("pyproject.toml", "python"),
            ("Dockerfile", "docker"),
            ("pom.xml", "java"),
        ];
        for (marker, tag) in markers {
            if std::path::Path::new(marker).exists() {
                tags.push(tag.to_string());
            }
        }
        tags
    }

    async fn is_tool_available(&self, name: &str) -> bool {
        let cmd = format!("command -v {} >/dev/null 2>&1", shell_quote(name));
        self.shell
            .execute(&cmd, &ShellOptions::default())
            .await
            .map(|out| out.success)
            .unwrap_or(false)
    }

    async fn get_tool_version(&self, name: &str) -> Option<String> {
        let cmd = format!("{} --version 2>&1 | head -n1", shell_quote(name));
        let out = self.shell.execute(&cmd, &ShellOptions::default()).await.ok()?;
        if !out.success {
            return None;
        }
        extract_version(&out.stdout)
    }

    async fn detect_environment(&self) -> String {
        if std::env::var("CI").is_ok() {
            "ci".to_string()
        } else if std::path::Path::new("/.dockerenv").exists() {
            "container".to_string()
        } else {
            "local".to_string()
        }
    }

    fn compare_version(&self, actual: &str, op: &str, want: &str) -> bool {
        let a = parse_semver(actual);
        let w = parse_semver(want);
        let ordering = a.cmp(&w);
        match op {
            ">=" => ordering != std::cmp::Ordering::Less,
            "<=" => ordering != std::cmp::Ordering::Greater,
            ">" => ordering == std::cmp::Ordering::Greater,
            "<" => ordering == std::cmp::Ordering::Less,
            "==" => ordering == std::cmp::Ordering::Equal,
            "!=" => ordering != std::cmp::Ordering::Equal,
            _ => false,
        }
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn extract_version(text: &str) -> Option<String> {
    let mut digits = String::new();
    let mut started = false;
    for c in text.chars() {
        if c.is_ascii_digit() || (started && c == '.') {
            digits.push(c);
            started = true;
        } else if started {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

fn parse_semver(s: &str) -> (u64, u64, u64) {
    let mut parts = s.trim().split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

/// `reqwest`-backed remote fetcher restricted to `https`/`github` URL
/// schemes plus a curated hub table, reusing the teacher's
/// `network::allow_list` / `secure_fetch` redirect-and-allow-list machinery
/// for the transport-safety layer (spec §6).
pub struct HttpRemoteFetcher {
    pub client: reqwest::Client,
    pub network_config: NetworkConfig,
}

impl HttpRemoteFetcher {
    pub fn new(network_config: NetworkConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            network_config,
        }
    }

    fn resolve_url(&self, path: &str, git_ref: Option<&str>) -> String {
        let git_ref = git_ref.unwrap_or("main");
        if let Some(rest) = path.strip_prefix("github:") {
            let (owner_repo, file) = rest.split_once('/').unwrap_or((rest, ""));
            format!("https://raw.githubusercontent.com/{}/{}/{}", owner_repo, git_ref, file)
        } else if let Some(rest) = path.strip_prefix("hub:") {
            format!("https://hub.drun.dev/{}/{}.drun", rest, git_ref)
        } else {
            path.to_string()
        }
    }
}

#[async_trait]
impl RemoteFetcher for HttpRemoteFetcher {
    async fn fetch(&self, path: &str, git_ref: Option<&str>) -> Result<Vec<u8>, String> {
        let url = self.resolve_url(path, git_ref);
        let client = self.client.clone();
        let raw_fetch: crate::network::FetchFn = std::sync::Arc::new(move |url, method, headers, body| {
            let client = client.clone();
            Box::pin(async move {
                let verb: reqwest::Method = method.parse().unwrap_or(reqwest::Method::GET);
                let mut req = client.request(verb, &url);
                for (k, v) in headers {
                    req = req.header(k, v);
                }
                if let Some(body) = body {
                    req = req.body(body);
                }
                let resp = req.send().await.map_err(|e| e.to_string())?;
                let status = resp.status().as_u16();
                let headers: HashMap<String, String> = resp
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect();
                let url = resp.url().to_string();
                let body = resp.text().await.map_err(|e| e.to_string())?;
                Ok(FetchResponse { status, headers, body, url })
            })
        });
        let response = crate::network::secure_fetch(&self.network_config, &raw_fetch, &url, SecureFetchOptions::default())
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.body.into_bytes())
    }
}

struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process `Mutex<HashMap<...>>` with TTL + stale fallback (spec §4.7,
/// §6, §8 cache-fallback property): entries past their TTL are still
/// returned by `get_stale`, only `get` enforces expiry.
#[derive(Default)]
pub struct TtlIncludeCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    enabled: bool,
}

impl TtlIncludeCache {
    pub fn new(enabled: bool) -> Self {
        Self { entries: Mutex::new(HashMap::new()), enabled }
    }
}

#[async_trait]
impl IncludeCache for TtlIncludeCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.bytes.clone())
        } else {
            None
        }
    }

    async fn get_stale(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).map(|e| e.bytes.clone())
    }

    async fn set(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        if !self.enabled {
            return;
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), CacheEntry { bytes, expires_at: Instant::now() + ttl });
    }

    async fn close(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Writes bytes to a tracked temp file for the lifetime of the engine,
/// removed on `cleanup()` (spec §4.7). Used by the include resolver for
/// fetched remote content that downstream parsing needs as a path, and by
/// the download executor's non-extracted single-file case.
#[derive(Default)]
pub struct TempFileTracker {
    paths: Mutex<Vec<std::path::PathBuf>>,
}

impl TempFileTracker {
    pub async fn write(&self, prefix: &str, bytes: &[u8]) -> std::io::Result<std::path::PathBuf> {
        let path = std::env::temp_dir().join(format!("{}-{}", prefix, uniq_suffix()));
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        self.paths.lock().unwrap().push(path.clone());
        Ok(path)
    }

    pub fn cleanup(&self) {
        for path in self.paths.lock().unwrap().drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn uniq_suffix() -> String {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    format!("{}-{}", std::process::id(), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn process_shell_runner_captures_stdout() {
        let runner = ProcessShellRunner::default();
        let out = runner.execute("echo hello", &ShellOptions::default()).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success);
    }

    #[tokio::test]
    async fn process_shell_runner_reports_nonzero_exit() {
        let runner = ProcessShellRunner::default();
        let out = runner.execute("exit 3", &ShellOptions::default()).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success);
    }

    #[tokio::test]
    async fn secrets_store_round_trips() {
        let store = InMemorySecretsStore::default();
        store.set("ns", "key", "value").await;
        assert_eq!(store.get("ns", "key").await.as_deref(), Some("value"));
        assert!(store.exists("ns", "key").await);
        assert!(store.delete("ns", "key").await);
        assert!(!store.exists("ns", "key").await);
    }

    #[tokio::test]
    async fn ttl_cache_expires_but_stale_still_available() {
        let cache = TtlIncludeCache::new(true);
        cache.set("k", b"content".to_vec(), Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.get_stale("k").await, Some(b"content".to_vec()));
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = TtlIncludeCache::new(false);
        cache.set("k", b"content".to_vec(), Duration::from_secs(60)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[test]
    fn version_comparison_handles_standard_operators() {
        let detector = ShellDetector::new(ProcessShellRunner::default());
        assert!(detector.compare_version("1.20.3", ">=", "1.18.0"));
        assert!(!detector.compare_version("1.20.3", "<", "1.18.0"));
        assert!(detector.compare_version("2.0.0", "==", "2.0.0"));
    }
}
