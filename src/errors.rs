//! Error taxonomy (spec §7): one concrete type per error kind, unified into
//! a single enum statements and the dispatcher propagate with `?`. Mirrors
//! the sentinel-error pattern used for bash's break/continue/return: loop
//! control is modeled as ordinary error values the loop driver recognizes
//! and converts back into control flow, never as an exception that bubbles
//! past the owning loop (§9 Design Notes).

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParameterValidationError {
    pub message: String,
}

impl ParameterValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Error)]
#[error("circular dependency detected at '{node}'")]
pub struct CircularDependencyError {
    pub node: String,
}

#[derive(Debug, Clone, Error)]
#[error("task '{task}' depends on unknown task '{missing}'")]
pub struct MissingDependencyError {
    pub task: String,
    pub missing: String,
}

#[derive(Debug, Clone, Error)]
#[error("unknown statement: {kind}")]
pub struct UnknownStatementError {
    pub kind: String,
}

#[derive(Debug, Clone, Error)]
#[error("unknown action: {kind}")]
pub struct UnknownActionError {
    pub kind: String,
}

#[derive(Debug, Clone, Error)]
#[error("unknown transformation: {name}")]
pub struct UnknownTransformationError {
    pub name: String,
}

/// Strict-mode undefined-variable failure (spec §4.8). Carries every name
/// left unresolved in the statement, not just the first — the caller
/// formats the list into `in <statement> statement: ...`.
#[derive(Debug, Clone, Error)]
pub struct UndefinedVariableError {
    pub names: Vec<String>,
}

impl fmt::Display for UndefinedVariableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "undefined variable: {}",
            self.names
                .iter()
                .map(|n| format!("{{{}}}", n))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl UndefinedVariableError {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ArithmeticError {
    pub message: String,
}

impl ArithmeticError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn division_by_zero() -> Self {
        Self::new("division by zero")
    }
}

#[derive(Debug, Clone, Error)]
#[error("command failed with exit code {exit_code}: {command}")]
pub struct ShellFailureError {
    pub command: String,
    pub exit_code: i32,
    pub stderr: String,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FileOperationError {
    pub message: String,
}

impl FileOperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Error)]
#[error("http request to {url} failed: {message}")]
pub struct HttpFailureError {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, Error)]
#[error("download from {url} failed: {message}")]
pub struct DownloadFailureError {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, Error)]
#[error("failed to extract archive {path}: {message}")]
pub struct ExtractionFailureError {
    pub path: String,
    pub message: String,
}

/// Reported when verbose, never fatal (spec §4.7's explicit UX choice) —
/// callers of the include resolver log this and continue rather than
/// propagating it through `InterpreterError`.
#[derive(Debug, Clone, Error)]
#[error("include '{path}' failed: {message}")]
pub struct IncludeFailureError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct UserThrownError {
    pub message: String,
}

impl UserThrownError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Error)]
#[error("task '{task}' failed: {cause}")]
pub struct TaskFailedError {
    pub task: String,
    pub cause: String,
}

#[derive(Debug, Clone, Error)]
#[error("{hook} hook failed: {message}")]
pub struct HookFailureError {
    pub hook: String,
    pub message: String,
}

/// Internal break/continue signal. Never surfaced past the loop that owns
/// it — the loop engine matches on it directly and must not let it escape
/// a task body (spec §9).
#[derive(Debug, Clone, Error)]
pub enum LoopControlError {
    #[error("break")]
    Break,
    #[error("continue")]
    Continue,
}

#[derive(Debug, Clone, Error)]
#[error("memory usage exceeded limit: {message}")]
pub struct MemoryExhaustionError {
    pub message: String,
}

/// Aggregate error for a non-fail-fast parallel loop (spec §4.12, §8
/// scenario 5): names every item that failed rather than surfacing only the
/// first.
#[derive(Debug, Clone, Error)]
pub struct ParallelExecutionError {
    pub failures: Vec<(String, String)>,
}

impl fmt::Display for ParallelExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parallel execution completed with errors: {}",
            self.failures
                .iter()
                .map(|(item, msg)| format!("{}: {}", item, msg))
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}

/// Unified error enum every executor propagates with `?`.
#[derive(Debug, Clone, Error)]
pub enum InterpreterError {
    #[error(transparent)]
    ParameterValidation(#[from] ParameterValidationError),
    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),
    #[error(transparent)]
    MissingDependency(#[from] MissingDependencyError),
    #[error(transparent)]
    UnknownStatement(#[from] UnknownStatementError),
    #[error(transparent)]
    UnknownAction(#[from] UnknownActionError),
    #[error(transparent)]
    UnknownTransformation(#[from] UnknownTransformationError),
    #[error(transparent)]
    UndefinedVariable(#[from] UndefinedVariableError),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    #[error(transparent)]
    ShellFailure(#[from] ShellFailureError),
    #[error(transparent)]
    FileOperation(#[from] FileOperationError),
    #[error(transparent)]
    HttpFailure(#[from] HttpFailureError),
    #[error(transparent)]
    DownloadFailure(#[from] DownloadFailureError),
    #[error(transparent)]
    ExtractionFailure(#[from] ExtractionFailureError),
    #[error(transparent)]
    UserThrown(#[from] UserThrownError),
    #[error(transparent)]
    TaskFailed(#[from] TaskFailedError),
    #[error(transparent)]
    HookFailure(#[from] HookFailureError),
    #[error(transparent)]
    LoopControl(#[from] LoopControlError),
    #[error(transparent)]
    MemoryExhaustion(#[from] MemoryExhaustionError),
    #[error(transparent)]
    ParallelExecution(#[from] ParallelExecutionError),
}

impl InterpreterError {
    /// Wraps the error as a failed task, per the propagation rule in §7:
    /// `"task 'X' failed: <cause>"`, unless it already is one or is an
    /// internal loop-control signal (which must never reach this point).
    pub fn into_task_failure(self, task: &str) -> InterpreterError {
        match self {
            InterpreterError::LoopControl(_) => self,
            InterpreterError::TaskFailed(_) => self,
            other => TaskFailedError { task: task.to_string(), cause: other.to_string() }.into(),
        }
    }

    pub fn is_loop_control(&self) -> bool {
        matches!(self, InterpreterError::LoopControl(_))
    }

    /// Substring-based error-kind matching for `catch` clauses (§7):
    /// the filter name is matched, lowercased, against the error message.
    pub fn matches_kind(&self, filter: &str) -> bool {
        let msg = self.to_string().to_lowercase();
        match filter.to_lowercase().as_str() {
            "filenotfound" => {
                msg.contains("no such file") || msg.contains("not found") || msg.contains("does not exist")
            }
            "permission" => msg.contains("permission") || msg.contains("access denied"),
            "shellerror" => msg.contains("command") || msg.contains("shell") || msg.contains("exit"),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failure_wraps_message_once() {
        let err: InterpreterError = ParameterValidationError::new("bad param").into();
        let wrapped = err.into_task_failure("build");
        assert_eq!(wrapped.to_string(), "task 'build' failed: bad param");
    }

    #[test]
    fn task_failure_does_not_double_wrap() {
        let err: InterpreterError = TaskFailedError { task: "build".into(), cause: "boom".into() }.into();
        let wrapped = err.clone().into_task_failure("other");
        assert_eq!(wrapped.to_string(), err.to_string());
    }

    #[test]
    fn loop_control_never_rewrapped() {
        let err: InterpreterError = LoopControlError::Break.into();
        assert!(err.clone().into_task_failure("t").is_loop_control());
    }

    #[test]
    fn catch_filter_matches_known_kinds() {
        let err: InterpreterError = FileOperationError::new("no such file or directory").into();
        assert!(err.matches_kind("filenotfound"));
        assert!(!err.matches_kind("permission"));
        assert!(err.matches_kind(""));
    }

    #[test]
    fn undefined_variable_display_lists_all_names() {
        let err = UndefinedVariableError::new(vec!["missing".into(), "also_missing".into()]);
        assert_eq!(err.to_string(), "undefined variable: {missing}, {also_missing}");
    }
}
