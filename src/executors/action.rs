//! Action executor (spec §4.5): interpolates the message (strict mode
//! surfaces undefined-variable errors), then emits a formatted line with an
//! icon per action kind.

use crate::ast::{ActionKind, ActionStatement};
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, TaskFailedError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;

fn icon(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Info => "ℹ️",
        ActionKind::Step => "🔹",
        ActionKind::Warn => "⚠️",
        ActionKind::Error => "❌",
        ActionKind::Success => "✅",
        ActionKind::Fail => "❌",
        ActionKind::Echo => "",
    }
}

pub fn execute(stmt: &ActionStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let resolved = interpolate_strict(&stmt.message, ctx).map_err(|e| {
        InterpreterError::from(e).into_task_failure(&ctx.current_task)
    }).map_err(|e| wrap_statement(e, action_label(stmt.action)))?;

    let resolved = if stmt.action == ActionKind::Echo { resolved.replace("\\n", "\n") } else { resolved };

    if stmt.blank_before {
        services.emit("");
    }

    let line = if stmt.action == ActionKind::Echo {
        resolved.clone()
    } else {
        format!("{}  {}", icon(stmt.action), resolved)
    };

    if stmt.boxed {
        let width = resolved.chars().count() + 4;
        services.emit("┌".to_string() + &"─".repeat(width.saturating_sub(2)) + "┐");
        services.emit(format!("│ {} │", resolved));
        services.emit("└".to_string() + &"─".repeat(width.saturating_sub(2)) + "┘");
    } else {
        services.emit(line);
    }

    if stmt.blank_after {
        services.emit("");
    }

    if stmt.action == ActionKind::Fail {
        return Err(TaskFailedError { task: ctx.current_task.clone(), cause: resolved }.into());
    }

    Ok(())
}

/// The statement-kind label used in strict-mode error wrapping (spec §8
/// scenario 3: `"in info statement: ..."`, not the generic node name).
fn action_label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Info => "info",
        ActionKind::Step => "step",
        ActionKind::Warn => "warn",
        ActionKind::Error => "error",
        ActionKind::Success => "success",
        ActionKind::Fail => "fail",
        ActionKind::Echo => "echo",
    }
}

/// Wraps a sub-error with its owning statement kind (spec §4.8's strict-mode
/// caller contract: `"in <statement> statement: ..."`).
fn wrap_statement(err: InterpreterError, kind: &str) -> InterpreterError {
    match &err {
        InterpreterError::TaskFailed(inner) => TaskFailedError {
            task: inner.task.clone(),
            cause: format!("in {} statement: {}", kind, strip_cause_prefix(&inner.cause)),
        }
        .into(),
        _ => err,
    }
}

fn strip_cause_prefix(cause: &str) -> String {
    cause.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::context::ProjectContext;
    use crate::value::Value;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn services() -> (Services, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer_buf = buf.clone();
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
        let _ = Cursor::new(Vec::<u8>::new());
        let svc = Services {
            shell: Arc::new(crate::runtime::ProcessShellRunner::default()),
            secrets: Arc::new(crate::runtime::InMemorySecretsStore::default()),
            detector: Arc::new(crate::runtime::ShellDetector::new(crate::runtime::ProcessShellRunner::default())),
            fetcher: Arc::new(crate::runtime::HttpRemoteFetcher::new(Default::default())),
            cache: Arc::new(crate::runtime::TtlIncludeCache::new(true)),
            writer: Arc::new(Mutex::new(VecWriter(writer_buf))),
            verbose: false,
        };
        (svc, buf)
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Arc::new(ProjectContext::empty("demo")), Arc::new(Program::default()), "demo.drun")
    }

    #[test]
    fn info_action_emits_icon_and_message() {
        let (services, buf) = services();
        let mut c = ctx();
        c.parameters.insert("name".into(), Value::String("World".into()));
        let stmt = ActionStatement {
            action: ActionKind::Info,
            message: "Hello, {name}!".into(),
            boxed: false,
            blank_before: false,
            blank_after: false,
        };
        execute(&stmt, &mut c, &services).unwrap();
        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert_eq!(out.trim_end(), "ℹ️  Hello, World!");
    }

    #[test]
    fn fail_action_raises_task_failed() {
        let (services, _buf) = services();
        let mut c = ctx();
        c.current_task = "build".into();
        let stmt = ActionStatement { action: ActionKind::Fail, message: "boom".into(), boxed: false, blank_before: false, blank_after: false };
        let err = execute(&stmt, &mut c, &services).unwrap_err();
        assert!(matches!(err, InterpreterError::TaskFailed(_)));
    }

    #[test]
    fn echo_unescapes_newlines() {
        let (services, buf) = services();
        let mut c = ctx();
        let stmt = ActionStatement { action: ActionKind::Echo, message: "a\\nb".into(), boxed: false, blank_before: false, blank_after: false };
        execute(&stmt, &mut c, &services).unwrap();
        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert_eq!(out.trim_end(), "a\nb");
    }

    #[test]
    fn strict_mode_undefined_variable_produces_exact_message() {
        let (services, _buf) = services();
        let mut c = ctx();
        c.current_task = "test".into();
        let stmt = ActionStatement { action: ActionKind::Info, message: "Hello {$missing}".into(), boxed: false, blank_before: false, blank_after: false };
        let err = execute(&stmt, &mut c, &services).unwrap_err();
        assert_eq!(err.to_string(), "task 'test' failed: in info statement: undefined variable: {$missing}");
    }
}
