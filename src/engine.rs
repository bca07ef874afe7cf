//! Engine orchestrator (spec §4.2): wires together the memory supervisor,
//! project-context construction (including include resolution), dependency
//! resolver, lifecycle hooks, and per-task dispatch.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::Program;
use crate::context::{ExecutionContext, ProjectContext};
use crate::errors::{HookFailureError, InterpreterError};
use crate::executors;
use crate::includes;
use crate::memory;
use crate::params::bind_parameters;
use crate::resolver;
use crate::services::Services;

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub dry_run: bool,
}

/// Stops the memory supervisor on every exit path, including early returns
/// via `?` (spec §4.15: "stopped on every exit path").
struct SupervisorGuard(memory::MemorySupervisorHandle);

impl Drop for SupervisorGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}

pub async fn execute(
    program: Program,
    target: &str,
    cli_params: IndexMap<String, String>,
    current_file: &str,
    services: &Services,
    options: EngineOptions,
) -> Result<(), InterpreterError> {
    let program = Arc::new(program);
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let _supervisor = SupervisorGuard(memory::start(Arc::clone(&program), cwd));

    let mut project = match &program.project {
        Some(node) => ProjectContext::from_project_node(node),
        None => ProjectContext::empty("project"),
    };

    if let Some(node) = &program.project {
        let failures = includes::resolve_all(&mut project, &node.includes, current_file, services).await;
        for failure in failures {
            services.emit(format!("include '{}' failed: {}", failure.path, failure.message));
        }
    }

    let project = Arc::new(project);

    resolver::validate(&program)?;
    let plan = resolver::resolve(&program, target)?;

    if options.dry_run {
        services.emit(format!("[DRY RUN] execution plan for '{}': {}", target, plan.order.join(" -> ")));
    }

    let mut setup_ctx = ExecutionContext::new(Arc::clone(&project), Arc::clone(&program), current_file);
    setup_ctx.dry_run = options.dry_run;
    executors::run_body(&project.hooks.setup, &mut setup_ctx, services)
        .await
        .map_err(|e| HookFailureError { hook: "drun-setup".to_string(), message: e.to_string() })?;

    for task_name in &plan.order {
        let task = program
            .tasks
            .iter()
            .find(|t| &t.name == task_name)
            .expect("resolver only emits tasks present in the program");

        let mut ctx = ExecutionContext::new(Arc::clone(&project), Arc::clone(&program), current_file);
        ctx.dry_run = options.dry_run;
        ctx.current_task = task_name.clone();

        let mut bound = bind_parameters(&project.parameters, &cli_params, &ctx)?;
        bound.extend(bind_parameters(&task.parameters, &cli_params, &ctx)?);
        ctx.parameters = bound;

        let is_target = task_name == target;

        if is_target {
            executors::run_body(&project.hooks.before_task, &mut ctx, services)
                .await
                .map_err(|e| HookFailureError { hook: "before-task".to_string(), message: e.to_string() })?;
        }

        executors::run_body(&task.body, &mut ctx, services)
            .await
            .map_err(|e| e.into_task_failure(task_name))?;

        if is_target {
            if let Err(e) = executors::run_body(&project.hooks.after_task, &mut ctx, services).await {
                services.emit(format!("after-task hook failed: {}", e));
            }
        }
    }

    let mut teardown_ctx = ExecutionContext::new(Arc::clone(&project), Arc::clone(&program), current_file);
    teardown_ctx.dry_run = options.dry_run;
    if let Err(e) = executors::run_body(&project.hooks.teardown, &mut teardown_ctx, services).await {
        services.emit(format!("drun-teardown hook failed: {}", e));
    }

    Ok(())
}
