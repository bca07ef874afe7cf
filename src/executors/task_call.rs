//! Task call / snippet use / template instantiation executor (spec §4.14).

use indexmap::IndexMap;

use crate::ast::{SnippetUseStatement, TaskCallStatement, TemplateInstantiateStatement};
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, TaskFailedError};
use crate::interpolator::interpolate_strict;
use crate::params::bind_parameters;
use crate::services::Services;

/// Defensive cap on call nesting — the engine has no sandboxing (spec §1
/// Non-goals) but an unbounded recursive `call` should still fail cleanly
/// rather than exhaust the stack.
const MAX_CALL_DEPTH: u32 = 256;

pub async fn execute_call(stmt: &TaskCallStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    if ctx.depth >= MAX_CALL_DEPTH {
        return Err(TaskFailedError { task: stmt.name.clone(), cause: "maximum call depth exceeded".into() }.into());
    }

    let mut raw_args = IndexMap::new();
    for (k, v) in &stmt.args {
        raw_args.insert(k.clone(), interpolate_strict(v, ctx)?);
    }

    let mut callee = ctx.fork_for_call(&stmt.name);

    // "if name contains '.', look in namespaced includes (templates first,
    // then tasks); else look in local templates, then local tasks" (§4.14).
    if stmt.name.contains('.') {
        if let Some(template) = ctx.project.included_templates.get(&stmt.name).cloned() {
            callee.parameters = bind_parameters(&template.parameters, &raw_args, ctx)?;
            crate::executors::run_body(&template.body, &mut callee, services).await.map_err(|e| e.into_task_failure(&stmt.name))?;
        } else if let Some(task) = ctx.project.included_tasks.get(&stmt.name).cloned() {
            callee.parameters = bind_parameters(&task.parameters, &raw_args, ctx)?;
            crate::executors::run_body(&task.body, &mut callee, services).await.map_err(|e| e.into_task_failure(&stmt.name))?;
        } else {
            return Err(TaskFailedError { task: stmt.name.clone(), cause: "no such included task or template".into() }.into());
        }
    } else if let Some(template) = ctx.program.templates.iter().find(|t| t.name == stmt.name).cloned() {
        callee.parameters = bind_parameters(&template.parameters, &raw_args, ctx)?;
        crate::executors::run_body(&template.body, &mut callee, services).await.map_err(|e| e.into_task_failure(&stmt.name))?;
    } else if let Some(task) = ctx.program.tasks.iter().find(|t| t.name == stmt.name).cloned() {
        callee.parameters = bind_parameters(&task.parameters, &raw_args, ctx)?;
        crate::executors::run_body(&task.body, &mut callee, services).await.map_err(|e| e.into_task_failure(&stmt.name))?;
    } else {
        return Err(TaskFailedError { task: stmt.name.clone(), cause: "no such task or template".into() }.into());
    }

    ctx.absorb_callee_variables(&callee);
    Ok(())
}

/// Snippet bodies are inlined into the *current* context rather than given
/// their own scope (spec §4.14). The namespace-first lookup is implemented
/// once on `ProjectContext::find_snippet` and reused here.
pub async fn execute_snippet(stmt: &SnippetUseStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let snippet = ctx
        .project
        .find_snippet(&stmt.name, ctx.current_namespace.as_deref())
        .cloned()
        .ok_or_else(|| TaskFailedError { task: stmt.name.clone(), cause: "no such snippet".into() })?;
    crate::executors::run_body(&snippet.body, ctx, services).await
}

pub async fn execute_template(stmt: &TemplateInstantiateStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    if ctx.depth >= MAX_CALL_DEPTH {
        return Err(TaskFailedError { task: stmt.task_name.clone(), cause: "maximum call depth exceeded".into() }.into());
    }

    let mut raw_overrides = IndexMap::new();
    for (k, v) in &stmt.overrides {
        raw_overrides.insert(k.clone(), interpolate_strict(v, ctx)?);
    }

    let template = ctx
        .project
        .find_template(&ctx.program, &stmt.template)
        .cloned()
        .ok_or_else(|| TaskFailedError { task: stmt.task_name.clone(), cause: format!("no such template '{}'", stmt.template) })?;

    let mut callee = ctx.fork_for_call(&stmt.task_name);
    callee.parameters = bind_parameters(&template.parameters, &raw_overrides, ctx)?;
    crate::executors::run_body(&template.body, &mut callee, services)
        .await
        .map_err(|e| e.into_task_failure(&stmt.task_name))?;
    ctx.absorb_callee_variables(&callee);
    Ok(())
}
