//! Detection executor (SPEC_FULL §4.17, spec §6 Detector interface):
//! project-type/tool-availability/tool-version/environment/version-compare
//! probes, each capturing a result into a variable.

use crate::ast::{DetectKind, DetectStatement};
use crate::context::ExecutionContext;
use crate::errors::InterpreterError;
use crate::interpolator::interpolate_strict;
use crate::services::Services;

pub async fn execute(stmt: &DetectStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let target = interpolate_strict(&stmt.target, ctx)?;

    let result = match stmt.detect {
        DetectKind::ProjectType => services.detector.detect_project_type().await.join(","),
        DetectKind::ToolAvailable => services.detector.is_tool_available(&target).await.to_string(),
        DetectKind::ToolVersion => services.detector.get_tool_version(&target).await.unwrap_or_default(),
        DetectKind::Environment => services.detector.detect_environment().await,
        DetectKind::CompareVersion => {
            let op = stmt.compare_op.as_deref().unwrap_or("==");
            let want = stmt
                .compare_value
                .as_ref()
                .map(|v| interpolate_strict(v, ctx))
                .transpose()?
                .unwrap_or_default();
            services.detector.compare_version(&target, op, &want).to_string()
        }
    };

    if let Some(var) = &stmt.capture {
        ctx.variables.insert(var.clone(), result);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::context::ProjectContext;
    use std::sync::{Arc, Mutex};

    struct SinkWriter;
    impl std::io::Write for SinkWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn services() -> Services {
        Services {
            shell: Arc::new(crate::runtime::ProcessShellRunner::default()),
            secrets: Arc::new(crate::runtime::InMemorySecretsStore::default()),
            detector: Arc::new(crate::runtime::ShellDetector::new(crate::runtime::ProcessShellRunner::default())),
            fetcher: Arc::new(crate::runtime::HttpRemoteFetcher::new(Default::default())),
            cache: Arc::new(crate::runtime::TtlIncludeCache::new(true)),
            writer: Arc::new(Mutex::new(SinkWriter)),
            verbose: false,
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Arc::new(ProjectContext::empty("demo")), Arc::new(Program::default()), "demo.drun")
    }

    #[tokio::test]
    async fn tool_available_captures_boolean_string() {
        let svc = services();
        let mut c = ctx();
        let stmt = DetectStatement { detect: DetectKind::ToolAvailable, target: "bash".into(), compare_op: None, compare_value: None, capture: Some("has_bash".into()) };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("has_bash").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn compare_version_uses_compare_value() {
        let svc = services();
        let mut c = ctx();
        let stmt = DetectStatement {
            detect: DetectKind::CompareVersion,
            target: "1.2.0".into(),
            compare_op: Some(">=".into()),
            compare_value: Some("1.0.0".into()),
            capture: Some("ok".into()),
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("ok").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn environment_is_captured() {
        let svc = services();
        let mut c = ctx();
        let stmt = DetectStatement { detect: DetectKind::Environment, target: String::new(), compare_op: None, compare_value: None, capture: Some("env".into()) };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert!(c.variables.contains_key("env"));
    }
}
