//! Include resolver (spec §4.7): merges another project file's symbols into
//! the current `ProjectContext` under a namespace. Runs once, during
//! `ProjectContext` construction (spec §3: "mutated only while processing
//! its own settings and includes; read-only thereafter"), so it takes
//! `&mut ProjectContext` rather than the `Arc<ProjectContext>` every
//! executor sees afterward.
//!
//! The real drun lexer/parser is out of scope (spec §1); fetched include
//! content is parsed the same way the test suite builds fixture programs —
//! via `serde_yaml::from_str::<Program>` (see DESIGN.md).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ast::{IncludeNode, Program};
use crate::context::ProjectContext;
use crate::errors::IncludeFailureError;
use crate::services::Services;

const REMOTE_SCHEMES: &[&str] = &["github:", "https://", "http://", "hub:"];
const CACHE_TTL: Duration = Duration::from_secs(300);

fn is_remote(path: &str) -> bool {
    REMOTE_SCHEMES.iter().any(|scheme| path.starts_with(scheme))
}

/// Resolves every include in `includes`, merging successes into `project`
/// and returning one `IncludeFailureError` per failed include (never
/// fatal — spec §4.7 "any single include failure ... is never fatal").
pub async fn resolve_all(
    project: &mut ProjectContext,
    includes: &[IncludeNode],
    current_file: &str,
    services: &Services,
) -> Vec<IncludeFailureError> {
    let mut failures = Vec::new();
    let mut queue: Vec<(IncludeNode, String)> = includes.iter().map(|inc| (inc.clone(), current_file.to_string())).collect();

    while let Some((include, from_file)) = queue.pop() {
        match resolve_one(project, &include, &from_file, services).await {
            Ok(Some(nested)) => {
                for nested_include in nested {
                    queue.push((nested_include, include.path.clone()));
                }
            }
            Ok(None) => {}
            Err(e) => failures.push(e),
        }
    }

    failures
}

async fn resolve_one(
    project: &mut ProjectContext,
    include: &IncludeNode,
    from_file: &str,
    services: &Services,
) -> Result<Option<Vec<IncludeNode>>, IncludeFailureError> {
    let resolved_path = resolve_path(&include.path, from_file);

    if !project.mark_included(&resolved_path) {
        return Ok(None);
    }

    let content = fetch_content(&include.path, &resolved_path, services).await?;
    let program: Program = serde_yaml::from_str(&content).map_err(|e| IncludeFailureError {
        path: include.path.clone(),
        message: format!("failed to parse included file: {}", e),
    })?;

    let inner = program.project.ok_or_else(|| IncludeFailureError {
        path: include.path.clone(),
        message: "included file does not declare a project".to_string(),
    })?;

    let namespace = include.namespace.clone().unwrap_or_else(|| inner.name.clone());
    let admits = |class: &str| include.selectors.as_ref().map(|s| s.iter().any(|c| c == class)).unwrap_or(true);

    for (key, value) in &inner.settings {
        project.included_settings.insert(format!("{}.{}", namespace, key), value.clone());
    }
    for param in &inner.parameters {
        project.included_params.insert(format!("{}.{}", namespace, param.name), param.clone());
    }
    if admits("snippets") {
        for snippet in &inner.snippets {
            project.included_snippets.insert(format!("{}.{}", namespace, snippet.name), snippet.clone());
        }
    }
    if admits("tasks") {
        for task in &program.tasks {
            project.included_tasks.insert(format!("{}.{}", namespace, task.name), task.clone());
        }
    }
    if admits("templates") {
        for template in &program.templates {
            project.included_templates.insert(format!("{}.{}", namespace, template.name), template.clone());
        }
    }

    Ok(Some(inner.includes))
}

/// Resolution order (spec §4.7): recognized remote scheme as-is; absolute
/// path as-is; else relative to the current file's directory, falling back
/// to relative-to-cwd.
fn resolve_path(path: &str, from_file: &str) -> String {
    if is_remote(path) {
        return path.to_string();
    }
    if Path::new(path).is_absolute() {
        return path.to_string();
    }
    let candidate: PathBuf = Path::new(from_file).parent().map(|dir| dir.join(path)).unwrap_or_else(|| PathBuf::from(path));
    candidate.to_string_lossy().into_owned()
}

async fn fetch_content(raw_path: &str, resolved_path: &str, services: &Services) -> Result<String, IncludeFailureError> {
    if is_remote(raw_path) {
        let cache_key = resolved_path.to_string();
        if let Some(bytes) = services.cache.get(&cache_key).await {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        match services.fetcher.fetch(raw_path, None).await {
            Ok(bytes) => {
                services.cache.set(&cache_key, bytes.clone(), CACHE_TTL).await;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => match services.cache.get_stale(&cache_key).await {
                Some(bytes) => {
                    if services.verbose {
                        services.emit(format!("using stale cache for include '{}'", raw_path));
                    }
                    Ok(String::from_utf8_lossy(&bytes).into_owned())
                }
                None => Err(IncludeFailureError { path: raw_path.to_string(), message: e }),
            },
        }
    } else {
        tokio::fs::read_to_string(resolved_path)
            .await
            .map_err(|e| IncludeFailureError { path: raw_path.to_string(), message: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TtlIncludeCache;
    use crate::traits::{IncludeCache, RemoteFetcher};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct StaticFetcher(String);

    #[async_trait]
    impl RemoteFetcher for StaticFetcher {
        async fn fetch(&self, _path: &str, _git_ref: Option<&str>) -> Result<Vec<u8>, String> {
            Ok(self.0.clone().into_bytes())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl RemoteFetcher for FailingFetcher {
        async fn fetch(&self, _path: &str, _git_ref: Option<&str>) -> Result<Vec<u8>, String> {
            Err("network unreachable".to_string())
        }
    }

    struct SinkWriter;
    impl std::io::Write for SinkWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct CapturingWriter(Arc<Mutex<Vec<String>>>);
    impl std::io::Write for CapturingWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().push(String::from_utf8_lossy(data).into_owned());
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn services(fetcher: Arc<dyn RemoteFetcher>) -> Services {
        Services {
            shell: Arc::new(crate::runtime::ProcessShellRunner::default()),
            secrets: Arc::new(crate::runtime::InMemorySecretsStore::default()),
            detector: Arc::new(crate::runtime::ShellDetector::new(crate::runtime::ProcessShellRunner::default())),
            fetcher,
            cache: Arc::new(TtlIncludeCache::new(true)),
            writer: Arc::new(Mutex::new(SinkWriter)),
            verbose: false,
        }
    }

    fn verbose_services_with_cache(fetcher: Arc<dyn RemoteFetcher>, cache: Arc<dyn IncludeCache>) -> (Services, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let svc = Services {
            shell: Arc::new(crate::runtime::ProcessShellRunner::default()),
            secrets: Arc::new(crate::runtime::InMemorySecretsStore::default()),
            detector: Arc::new(crate::runtime::ShellDetector::new(crate::runtime::ProcessShellRunner::default())),
            fetcher,
            cache,
            writer: Arc::new(Mutex::new(CapturingWriter(Arc::clone(&log)))),
            verbose: true,
        };
        (svc, log)
    }

    const REMOTE_YAML: &str = r#"
project:
  name: lib
  settings:
    region: us-east
  snippets:
    - name: hello
      body: []
tasks:
  - name: build
    body: []
"#;

    #[tokio::test]
    async fn remote_include_merges_under_namespace() {
        let svc = services(Arc::new(StaticFetcher(REMOTE_YAML.to_string())));
        let mut project = ProjectContext::empty("demo");
        let includes = vec![IncludeNode { path: "https://example.com/lib.drun".into(), namespace: Some("lib".into()), selectors: None }];
        let failures = resolve_all(&mut project, &includes, "demo.drun", &svc).await;
        assert!(failures.is_empty());
        assert_eq!(project.included_settings.get("lib.region").map(String::as_str), Some("us-east"));
        assert!(project.included_snippets.contains_key("lib.hello"));
        assert!(project.included_tasks.contains_key("lib.build"));
    }

    #[tokio::test]
    async fn selectors_restrict_merged_classes() {
        let svc = services(Arc::new(StaticFetcher(REMOTE_YAML.to_string())));
        let mut project = ProjectContext::empty("demo");
        let includes = vec![IncludeNode { path: "https://example.com/lib.drun".into(), namespace: Some("lib".into()), selectors: Some(vec!["tasks".into()]) }];
        resolve_all(&mut project, &includes, "demo.drun", &svc).await;
        assert!(project.included_tasks.contains_key("lib.build"));
        assert!(!project.included_snippets.contains_key("lib.hello"));
    }

    #[tokio::test]
    async fn cycle_prevention_skips_already_included_path() {
        let svc = services(Arc::new(StaticFetcher(REMOTE_YAML.to_string())));
        let mut project = ProjectContext::empty("demo");
        let includes = vec![
            IncludeNode { path: "https://example.com/lib.drun".into(), namespace: Some("lib".into()), selectors: None },
            IncludeNode { path: "https://example.com/lib.drun".into(), namespace: Some("lib2".into()), selectors: None },
        ];
        resolve_all(&mut project, &includes, "demo.drun", &svc).await;
        assert!(project.included_tasks.contains_key("lib.build"));
        assert!(!project.included_tasks.contains_key("lib2.build"));
    }

    #[tokio::test]
    async fn verbose_mode_notes_stale_cache_use_on_fetch_failure() {
        let cache: Arc<dyn IncludeCache> = Arc::new(TtlIncludeCache::new(true));
        cache.set("https://example.com/lib.drun", REMOTE_YAML.as_bytes().to_vec(), std::time::Duration::from_millis(1)).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (svc, log) = verbose_services_with_cache(Arc::new(FailingFetcher), cache);
        let mut project = ProjectContext::empty("demo");
        let includes = vec![IncludeNode { path: "https://example.com/lib.drun".into(), namespace: Some("lib".into()), selectors: None }];
        let failures = resolve_all(&mut project, &includes, "demo.drun", &svc).await;

        assert!(failures.is_empty());
        assert!(project.included_tasks.contains_key("lib.build"));
        assert!(log.lock().unwrap().iter().any(|l| l.contains("using stale cache")));
    }

    #[tokio::test]
    async fn network_failure_without_cache_is_reported_not_fatal() {
        let svc = services(Arc::new(FailingFetcher));
        let mut project = ProjectContext::empty("demo");
        let includes = vec![IncludeNode { path: "https://example.com/missing.drun".into(), namespace: None, selectors: None }];
        let failures = resolve_all(&mut project, &includes, "demo.drun", &svc).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("network unreachable"));
    }
}
