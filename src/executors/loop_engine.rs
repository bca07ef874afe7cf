//! Loop engine (spec §4.11) and parallel loop engine (spec §4.12): five item
//! sources, an optional `where` filter, sequential or bounded-concurrency
//! execution, and `break`/`continue` signal handling.

use futures::stream::{self, StreamExt};

use crate::ast::{LoopControlStatement, LoopKind, LoopSource, LoopStatement, WhereFilter, WhereOp};
use crate::condition;
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, LoopControlError, ParallelExecutionError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;
use crate::value::Value;

const DEFAULT_MAX_WORKERS: usize = 5;

async fn resolve_items(source: &LoopSource, ctx: &ExecutionContext) -> Result<Vec<String>, InterpreterError> {
    match source {
        LoopSource::ArrayLiteral { items } => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpolate_strict(item, ctx)?);
            }
            Ok(out)
        }
        LoopSource::Variable { name } => {
            let raw = ctx.variables.get(name).cloned().unwrap_or_default();
            Ok(Value::infer(&raw).as_list())
        }
        LoopSource::Parameter { name } => {
            let value = ctx.parameters.get(name).cloned().unwrap_or(Value::String(String::new()));
            Ok(value.as_list())
        }
        LoopSource::GlobalSetting { key } => {
            let raw = ctx.get_setting(key).unwrap_or_default().to_string();
            Ok(Value::infer(&raw).as_list())
        }
        LoopSource::Range { start, end, step } => {
            let start = interpolate_strict(start, ctx)?;
            let end = interpolate_strict(end, ctx)?;
            let step = step.as_ref().map(|s| interpolate_strict(s, ctx)).transpose()?;
            let start: i64 = start
                .trim()
                .parse()
                .map_err(|_| crate::errors::ParameterValidationError::new(format!("invalid range start: '{}'", start)))?;
            let end: i64 = end
                .trim()
                .parse()
                .map_err(|_| crate::errors::ParameterValidationError::new(format!("invalid range end: '{}'", end)))?;
            let step: i64 = match step {
                Some(s) => s
                    .trim()
                    .parse()
                    .map_err(|_| crate::errors::ParameterValidationError::new(format!("invalid range step: '{}'", s)))?,
                None => 1,
            };
            if step == 0 {
                return Err(crate::errors::ParameterValidationError::new("range step must not be zero").into());
            }
            let mut items = Vec::new();
            let mut n = start;
            if step > 0 {
                while n <= end {
                    items.push(n.to_string());
                    n += step;
                }
            } else {
                while n >= end {
                    items.push(n.to_string());
                    n += step;
                }
            }
            Ok(items)
        }
        LoopSource::File { path } => {
            let path = interpolate_strict(path, ctx)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| crate::errors::FileOperationError::new(format!("reading '{}': {}", path, e)))?;
            Ok(content.lines().map(str::to_string).collect())
        }
        LoopSource::Pattern { regex, input } => {
            let pattern = interpolate_strict(regex, ctx)?;
            let input = interpolate_strict(input, ctx)?;
            let re = regex_lite::Regex::new(&pattern)
                .map_err(|e| crate::errors::ParameterValidationError::new(format!("invalid pattern '{}': {}", pattern, e)))?;
            Ok(re.find_iter(&input).map(|m| m.as_str().to_string()).collect())
        }
    }
}

fn matches_filter(item: &str, filter: &WhereFilter) -> bool {
    match filter.op {
        WhereOp::Contains => item.contains(&filter.arg),
        WhereOp::StartsWith => item.starts_with(&filter.arg),
        WhereOp::EndsWith => item.ends_with(&filter.arg),
        WhereOp::Matches => regex_lite::Regex::new(&filter.arg).map(|re| re.is_match(item)).unwrap_or(false),
        WhereOp::Eq => item == filter.arg,
        WhereOp::Neq => item != filter.arg,
    }
}

pub async fn execute(stmt: &LoopStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    // `line` sources keep blank lines by default; `where` is the only way
    // to drop them (spec §4.11).
    let mut items = resolve_items(&stmt.source, ctx).await?;
    if let Some(filter) = &stmt.where_filter {
        let arg = interpolate_strict(&filter.arg, ctx)?;
        let filter = WhereFilter { op: filter.op, arg };
        items.retain(|item| matches_filter(item, &filter));
    }

    match &stmt.parallel {
        Some(opts) => run_parallel(stmt, items, opts.max_workers.unwrap_or(DEFAULT_MAX_WORKERS), opts.fail_fast, ctx, services).await,
        None => run_sequential(stmt, items, ctx, services).await,
    }
}

async fn run_sequential(stmt: &LoopStatement, items: Vec<String>, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    for item in items {
        let mut forked = ctx.fork_for_loop_iteration(&stmt.var_name, &item);
        match crate::executors::run_body(&stmt.body, &mut forked, services).await {
            Ok(()) => ctx.absorb_callee_variables(&forked),
            Err(InterpreterError::LoopControl(LoopControlError::Continue)) => {
                ctx.absorb_callee_variables(&forked);
                continue;
            }
            Err(InterpreterError::LoopControl(LoopControlError::Break)) => {
                ctx.absorb_callee_variables(&forked);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn run_parallel(
    stmt: &LoopStatement,
    items: Vec<String>,
    max_workers: usize,
    fail_fast: bool,
    ctx: &mut ExecutionContext,
    services: &Services,
) -> Result<(), InterpreterError> {
    if ctx.dry_run {
        services.emit(format!("[DRY RUN] would execute {} items in parallel (max_workers={})", items.len(), max_workers));
        for item in &items {
            services.emit(format!("[DRY RUN]   worker <- {}", item));
        }
        return Ok(());
    }

    let var_name = stmt.var_name.clone();
    let mut stream = stream::iter(items.into_iter().map(|item| {
        let mut worker_ctx = ctx.fork_for_parallel_worker(&var_name, &item);
        async move {
            let result = crate::executors::run_body(&stmt.body, &mut worker_ctx, services).await;
            (item, result)
        }
    }))
    .buffer_unordered(max_workers.max(1));

    // Not polling further once a fail-fast failure is seen stops
    // `buffer_unordered` from scheduling any remaining items, and dropping
    // the stream (when this function returns) drops whatever workers were
    // already in flight, cancelling them (spec §4.12/§8 scenario 5: fewer
    // than N items fully processed).
    let mut failures: Vec<(String, String)> = Vec::new();
    while let Some((item, result)) = stream.next().await {
        if let Err(e) = result {
            if !e.is_loop_control() {
                failures.push((item, e.to_string()));
                if fail_fast {
                    break;
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ParallelExecutionError { failures }.into())
    }
}

pub async fn execute_break(stmt: &LoopControlStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    if should_signal(stmt, ctx, services).await {
        Err(LoopControlError::Break.into())
    } else {
        Ok(())
    }
}

pub async fn execute_continue(stmt: &LoopControlStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    if should_signal(stmt, ctx, services).await {
        Err(LoopControlError::Continue.into())
    } else {
        Ok(())
    }
}

async fn should_signal(stmt: &LoopControlStatement, ctx: &ExecutionContext, services: &Services) -> bool {
    match &stmt.condition {
        Some(cond) => condition::evaluate(cond, ctx, services.detector.as_ref()).await,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ActionKind, ActionStatement, Program, StatementNode};
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

    fn append_item() -> Vec<StatementNode> {
        vec![StatementNode::VariableOp(crate::ast::VariableOpStatement {
            op: crate::ast::VariableOp::CaptureFromShell,
            name: "seen".into(),
            expr: None,
            operations: vec![],
            shell_command: Some("echo -n {item}".into()),
        })]
    }

    #[tokio::test]
    async fn range_loop_generates_inclusive_sequence() {
        let items = resolve_items(&LoopSource::Range { start: "1".into(), end: "3".into(), step: None }, &ctx()).await.unwrap();
        assert_eq!(items, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn negative_step_counts_down() {
        let items = resolve_items(&LoopSource::Range { start: "3".into(), end: "1".into(), step: Some("-1".into()) }, &ctx()).await.unwrap();
        assert_eq!(items, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn each_loop_over_variable_splits_on_whitespace() {
        let svc = services();
        let mut c = ctx();
        c.variables.insert("words".into(), "alpha beta gamma".into());
        let stmt = LoopStatement {
            kind: LoopKind::Each,
            var_name: "item".into(),
            source: LoopSource::Variable { name: "words".into() },
            where_filter: None,
            parallel: None,
            body: append_item(),
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
    }

    #[tokio::test]
    async fn where_filter_narrows_items() {
        let items = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let filter = WhereFilter { op: WhereOp::StartsWith, arg: "a".into() };
        let filtered: Vec<_> = items.into_iter().filter(|i| matches_filter(i, &filter)).collect();
        assert_eq!(filtered, vec!["alpha"]);
    }

    #[tokio::test]
    async fn break_stops_sequential_loop_early() {
        let svc = services();
        let mut c = ctx();
        let body = vec![
            StatementNode::Action(ActionStatement { action: ActionKind::Info, message: "{item}".into(), boxed: false, blank_before: false, blank_after: false }),
            StatementNode::Break(LoopControlStatement { condition: Some("$item is '2'".into()) }),
        ];
        let stmt = LoopStatement {
            kind: LoopKind::Each,
            var_name: "item".into(),
            source: LoopSource::ArrayLiteral { items: vec!["1".into(), "2".into(), "3".into()] },
            where_filter: None,
            parallel: None,
            body,
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
    }

    #[tokio::test]
    async fn parallel_non_fail_fast_aggregates_errors() {
        let svc = services();
        let mut c = ctx();
        let body = vec![StatementNode::Conditional(crate::ast::ConditionalStatement {
            branches: vec![crate::ast::ConditionalBranch {
                condition: "$item is 'bad'".into(),
                body: vec![StatementNode::Action(ActionStatement { action: ActionKind::Fail, message: "boom".into(), boxed: false, blank_before: false, blank_after: false })],
            }],
            otherwise: vec![],
        })];
        let stmt = LoopStatement {
            kind: LoopKind::Each,
            var_name: "item".into(),
            source: LoopSource::ArrayLiteral { items: vec!["good".into(), "bad".into()] },
            where_filter: None,
            parallel: Some(crate::ast::ParallelOptions { max_workers: Some(2), fail_fast: false }),
            body,
        };
        let err = execute(&stmt, &mut c, &svc).await.unwrap_err();
        assert!(err.to_string().contains("parallel execution completed with errors"));
    }

    #[tokio::test]
    async fn parallel_fail_fast_stops_after_first_failure_and_names_it() {
        let svc = services();
        let mut c = ctx();
        // max_workers=1 makes this deterministic: items run one at a time,
        // in order, so the failure on "two" is seen before "three"/"four"
        // are ever scheduled.
        let body = vec![StatementNode::Conditional(crate::ast::ConditionalStatement {
            branches: vec![crate::ast::ConditionalBranch {
                condition: "$item is 'two'".into(),
                body: vec![StatementNode::Action(ActionStatement { action: ActionKind::Fail, message: "boom".into(), boxed: false, blank_before: false, blank_after: false })],
            }],
            otherwise: vec![],
        })];
        let stmt = LoopStatement {
            kind: LoopKind::Each,
            var_name: "item".into(),
            source: LoopSource::ArrayLiteral { items: vec!["one".into(), "two".into(), "three".into(), "four".into()] },
            where_filter: None,
            parallel: Some(crate::ast::ParallelOptions { max_workers: Some(1), fail_fast: true }),
            body,
        };
        let err = execute(&stmt, &mut c, &svc).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("parallel execution completed with errors"));
        assert!(message.contains("two"));
        assert!(!message.contains("three"));
        assert!(!message.contains("four"));
        match err {
            InterpreterError::ParallelExecution(e) => assert_eq!(e.failures.len(), 1),
            other => panic!("expected ParallelExecution, got {:?}", other),
        }
    }
}
