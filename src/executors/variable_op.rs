//! Variable op executor (spec §4.4, §4.9): `let`/`set` bind an expression
//! result, `transform` applies the §4.8.2 operation vocabulary to an
//! existing variable's current value, `capture_from_shell` binds the
//! trimmed stdout of a shell command (spec GLOSSARY "Capture").

use crate::ast::{VariableOp, VariableOpStatement};
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, ShellFailureError};
use crate::expression;
use crate::interpolator::interpolate_strict;
use crate::services::Services;
use crate::traits::ShellOptions;

pub async fn execute(stmt: &VariableOpStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    match stmt.op {
        VariableOp::Let | VariableOp::Set => {
            let expr = stmt.expr.as_ref().ok_or_else(|| {
                crate::errors::ParameterValidationError::new(format!("'{}' has no expression to evaluate", stmt.name))
            })?;
            let value = expression::evaluate(expr, ctx)?;
            ctx.variables.insert(stmt.name.clone(), value);
        }
        VariableOp::Transform => {
            let current = ctx
                .variables
                .get(&stmt.name)
                .cloned()
                .or_else(|| ctx.parameters.get(&stmt.name).map(|p| p.as_string()))
                .unwrap_or_default();
            let mut value = current;
            for op in &stmt.operations {
                value = crate::interpolator::apply_operation(&value, op);
            }
            ctx.variables.insert(stmt.name.clone(), value);
        }
        VariableOp::CaptureFromShell => {
            let command = stmt
                .shell_command
                .as_ref()
                .map(|c| interpolate_strict(c, ctx))
                .transpose()?
                .unwrap_or_default();

            if ctx.dry_run {
                services.emit(format!("[DRY RUN] capture {} <- {}", stmt.name, command));
                ctx.variables.insert(stmt.name.clone(), String::new());
                return Ok(());
            }

            let output = services
                .shell
                .execute(&command, &ShellOptions { capture: true, ..Default::default() })
                .await
                .map_err(|e| ShellFailureError { command: command.clone(), exit_code: -1, stderr: e.to_string() })?;
            if !output.success {
                return Err(ShellFailureError { command, exit_code: output.exit_code, stderr: output.stderr }.into());
            }
            ctx.variables.insert(stmt.name.clone(), output.stdout.trim().to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ExpressionNode, Program};
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
    async fn let_binds_expression_result() {
        let svc = services();
        let mut c = ctx();
        let stmt = VariableOpStatement {
            op: VariableOp::Let,
            name: "sum".into(),
            expr: Some(ExpressionNode::Binary {
                op: BinaryOp::Add,
                left: Box::new(ExpressionNode::Literal("2".into())),
                right: Box::new(ExpressionNode::Literal("3".into())),
            }),
            operations: vec![],
            shell_command: None,
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("sum").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn transform_applies_operations_in_order() {
        let svc = services();
        let mut c = ctx();
        c.variables.insert("branch".into(), "feature/foo".into());
        let stmt = VariableOpStatement {
            op: VariableOp::Transform,
            name: "branch".into(),
            expr: None,
            operations: vec!["replace '/' by '-'".into(), "uppercase".into()],
            shell_command: None,
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("branch").map(String::as_str), Some("FEATURE-FOO"));
    }

    #[tokio::test]
    async fn capture_from_shell_trims_stdout() {
        let svc = services();
        let mut c = ctx();
        let stmt = VariableOpStatement {
            op: VariableOp::CaptureFromShell,
            name: "out".into(),
            expr: None,
            operations: vec![],
            shell_command: Some("echo captured".into()),
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
        assert_eq!(c.variables.get("out").map(String::as_str), Some("captured"));
    }
}
