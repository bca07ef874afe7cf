//! Shell executor (spec §4.6): single-line and multi-line shell statements,
//! sharing an options struct derived from the per-platform configuration.

use crate::ast::ShellStatement;
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, ShellFailureError, TaskFailedError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;
use crate::traits::ShellOptions;

fn platform_key() -> &'static str {
    if cfg!(windows) { "windows" } else if cfg!(target_os = "macos") { "darwin" } else { "linux" }
}

fn options_for(ctx: &ExecutionContext) -> ShellOptions {
    let mut opts = ShellOptions::default();
    if let Some(platform) = ctx.project.platforms.get(platform_key()) {
        opts.shell = Some(platform.executable.clone());
        opts.environment = platform.env.clone().into_iter().collect();
        if !platform.args.is_empty() {
            opts.environment.insert("DRUN_SHELL_ARGS".to_string(), platform.args.join(" "));
        }
    }
    opts.capture = true;
    opts
}

pub async fn execute(stmt: &ShellStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let mut resolved_lines = Vec::with_capacity(stmt.lines.len());
    for line in &stmt.lines {
        resolved_lines.push(interpolate_strict(line, ctx).map_err(|e| wrap(e.into(), ctx))?);
    }
    let command = resolved_lines.join("\n");

    if ctx.dry_run {
        services.emit(format!("[DRY RUN] shell: {}", command));
        if let Some(var) = &stmt.capture {
            ctx.variables.insert(var.clone(), String::new());
        }
        return Ok(());
    }

    services.emit(format!("🐚  {}", command));

    let mut options = options_for(ctx);
    options.stream = stmt.stream;
    let output = services.shell.execute(&command, &options).await.map_err(|e| {
        ShellFailureError { command: command.clone(), exit_code: -1, stderr: e.to_string() }
    })?;

    if !output.stdout.is_empty() {
        services.emit(output.stdout.trim_end());
    }
    if !output.stderr.is_empty() && !output.success {
        services.emit(output.stderr.trim_end());
    }

    if let Some(var) = &stmt.capture {
        let captured = if stmt.stream { output.stdout.trim().to_string() } else { output.stdout.trim().to_string() };
        ctx.variables.insert(var.clone(), captured);
    }

    if !output.success {
        return Err(ShellFailureError { command, exit_code: output.exit_code, stderr: output.stderr }.into());
    }

    Ok(())
}

/// Wraps a strict-mode undefined-variable failure with its owning statement
/// kind, matching the `"in <statement> statement: ..."` contract of §4.8.
fn wrap(err: InterpreterError, ctx: &ExecutionContext) -> InterpreterError {
    let wrapped = err.into_task_failure(&ctx.current_task);
    match wrapped {
        InterpreterError::TaskFailed(inner) => TaskFailedError {
            task: inner.task.clone(),
            cause: format!("in shell statement: {}", inner.cause),
        }
        .into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::context::ProjectContext;
    use std::sync::{Arc, Mutex};

    struct VecWriter(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for VecWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
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
            writer: Arc::new(Mutex::new(VecWriter(Arc::new(Mutex::new(Vec::new()))))),
            verbose: false,
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Arc::new(ProjectContext::empty("demo")), Arc::new(Program::default()), "demo.drun")
    }

    #[tokio::test]
    async fn captures_trimmed_stdout() {
        let svc = services();
        let mut c = ctx();
        let stmt = ShellStatement { lines: vec!["echo hello".into()], capture: Some("out".into()), stream: false };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("out").map(String::as_str), Some("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_as_shell_failure() {
        let svc = services();
        let mut c = ctx();
        let stmt = ShellStatement { lines: vec!["exit 2".into()], capture: None, stream: false };
        let err = execute(&stmt, &mut c, &svc).await.unwrap_err();
        assert!(matches!(err, InterpreterError::ShellFailure(_)));
    }

    #[tokio::test]
    async fn dry_run_does_not_execute_and_fakes_capture() {
        let svc = services();
        let mut c = ctx();
        c.dry_run = true;
        let stmt = ShellStatement { lines: vec!["rm -rf /tmp/whatever".into()], capture: Some("out".into()), stream: false };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("out").map(String::as_str), Some(""));
    }
}
