//! Docker / Git executor (SPEC_FULL §4.17): both statement kinds shell out
//! to an external CLI and capture its result, mirroring how the teacher's
//! own `commands/bash_cmd.rs` shells out rather than reimplementing a
//! protocol state machine for either tool.

use crate::ast::ExternalToolStatement;
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, ShellFailureError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;
use crate::traits::ShellOptions;

fn icon(tool: &str) -> &'static str {
    match tool {
        "docker" => "🐳",
        "git" => "🌿",
        _ => "🔧",
    }
}

pub async fn execute(
    stmt: &ExternalToolStatement,
    tool: &str,
    ctx: &mut ExecutionContext,
    services: &Services,
) -> Result<(), InterpreterError> {
    let subcommand = interpolate_strict(&stmt.subcommand, ctx)?;
    let mut args = Vec::with_capacity(stmt.args.len());
    for arg in &stmt.args {
        args.push(interpolate_strict(arg, ctx)?);
    }
    let command = if args.is_empty() {
        format!("{} {}", tool, subcommand)
    } else {
        format!("{} {} {}", tool, subcommand, args.join(" "))
    };

    if ctx.dry_run {
        services.emit(format!("[DRY RUN] {}  {}", icon(tool), command));
        if let Some(var) = &stmt.capture {
            ctx.variables.insert(var.clone(), String::new());
        }
        return Ok(());
    }

    services.emit(format!("{}  {}", icon(tool), command));

    let output = services
        .shell
        .execute(&command, &ShellOptions { capture: true, ..Default::default() })
        .await
        .map_err(|e| ShellFailureError { command: command.clone(), exit_code: -1, stderr: e.to_string() })?;

    if !output.stdout.is_empty() {
        services.emit(output.stdout.trim_end());
    }

    if let Some(var) = &stmt.capture {
        ctx.variables.insert(var.clone(), output.stdout.trim().to_string());
    }

    if !output.success {
        return Err(ShellFailureError { command, exit_code: output.exit_code, stderr: output.stderr }.into());
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
    async fn git_subcommand_captures_output() {
        let svc = services();
        let mut c = ctx();
        let stmt = ExternalToolStatement { subcommand: "--version".into(), args: vec![], capture: Some("v".into()) };
        execute(&stmt, "git", &mut c, &svc).await.unwrap();
        assert!(c.variables.get("v").unwrap().to_lowercase().contains("git"));
    }

    #[tokio::test]
    async fn unknown_subcommand_surfaces_shell_failure() {
        let svc = services();
        let mut c = ctx();
        let stmt = ExternalToolStatement { subcommand: "not-a-real-subcommand-xyz".into(), args: vec![], capture: None };
        let err = execute(&stmt, "git", &mut c, &svc).await.unwrap_err();
        assert!(matches!(err, InterpreterError::ShellFailure(_)));
    }
}
