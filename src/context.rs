//! Execution context and project context (spec §3): the per-invocation and
//! per-program state the interpolator, expression evaluator, and statement
//! executors read and mutate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::ast::{HooksNode, ParameterNode, PlatformShellNode, Program, SnippetNode, TaskNode, TemplateNode};
use crate::value::Value;

/// Built once per top-level execution from the project AST node, then
/// shared read-only (spec §3 Invariants, §9 "Global project state"). Never
/// exposed as mutable process-level state — everything goes through these
/// maps.
#[derive(Debug, Default)]
pub struct ProjectContext {
    pub name: String,
    pub version: Option<String>,
    pub settings: IndexMap<String, String>,
    pub parameters: Vec<ParameterNode>,
    pub snippets: IndexMap<String, SnippetNode>,
    pub hooks: HooksNode,
    pub platforms: IndexMap<String, PlatformShellNode>,

    /// Namespaced maps populated by includes; keys are always `NS.NAME` (or
    /// `NS.KEY` for settings/params) — a bare name never resolves into one
    /// of these (spec §3 Invariants).
    pub included_snippets: IndexMap<String, SnippetNode>,
    pub included_templates: IndexMap<String, TemplateNode>,
    pub included_tasks: IndexMap<String, TaskNode>,
    pub included_settings: IndexMap<String, String>,
    pub included_params: IndexMap<String, ParameterNode>,

    /// Cycle-detection set: each resolved absolute include path appears at
    /// most once across the whole resolution tree.
    pub included_files: Mutex<HashSet<String>>,
}

impl ProjectContext {
    pub fn from_project_node(node: &crate::ast::ProjectNode) -> Self {
        Self {
            name: node.name.clone(),
            version: node.version.clone(),
            settings: node.settings.clone(),
            parameters: node.parameters.clone(),
            snippets: node
                .snippets
                .iter()
                .map(|s| (s.name.clone(), s.clone()))
                .collect(),
            hooks: node.hooks.clone(),
            platforms: node.platforms.clone(),
            included_snippets: IndexMap::new(),
            included_templates: IndexMap::new(),
            included_tasks: IndexMap::new(),
            included_settings: IndexMap::new(),
            included_params: IndexMap::new(),
            included_files: Mutex::new(HashSet::new()),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Marks `path` as visited; returns `false` if it was already present
    /// (the caller should skip re-processing it — spec §4.7 cycle
    /// prevention).
    pub fn mark_included(&self, path: &str) -> bool {
        self.included_files.lock().unwrap().insert(path.to_string())
    }

    pub fn find_task<'a>(&'a self, program: &'a Program, name: &str) -> Option<&'a TaskNode> {
        if let Some((ns, rest)) = name.split_once('.') {
            let _ = ns;
            return self.included_tasks.get(name).or_else(|| {
                let _ = rest;
                None
            });
        }
        program.tasks.iter().find(|t| t.name == name)
    }

    pub fn find_template<'a>(&'a self, program: &'a Program, name: &str) -> Option<&'a TemplateNode> {
        if name.contains('.') {
            return self.included_templates.get(name);
        }
        program.templates.iter().find(|t| t.name == name)
    }

    /// Snippet lookup honoring the namespace-first rule of spec §4.14: when
    /// running inside an included task's namespace, `NS.snippet` is tried
    /// before the local snippet table.
    pub fn find_snippet(&self, name: &str, active_namespace: Option<&str>) -> Option<&SnippetNode> {
        if let Some(ns) = active_namespace {
            let namespaced = format!("{}.{}", ns, name);
            if let Some(s) = self.included_snippets.get(&namespaced) {
                return Some(s);
            }
        }
        self.snippets.get(name)
    }
}

/// Per-task-invocation state (spec §3).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub parameters: IndexMap<String, Value>,
    pub variables: IndexMap<String, String>,
    pub project: Arc<ProjectContext>,
    pub current_file: String,
    pub current_task: String,
    pub current_namespace: Option<String>,
    pub program: Arc<Program>,
    pub depth: u32,
    pub dry_run: bool,
    /// Message of the error currently being handled by an enclosing
    /// `catch` clause, set while its body runs (spec §4.13). `rethrow`
    /// reads this to preserve the original cause rather than raising a
    /// synthetic "rethrown error" (spec §9 Open Questions).
    pub current_error: Option<String>,
}

impl ExecutionContext {
    pub fn new(project: Arc<ProjectContext>, program: Arc<Program>, current_file: impl Into<String>) -> Self {
        Self {
            parameters: IndexMap::new(),
            variables: IndexMap::new(),
            project,
            current_file: current_file.into(),
            current_task: String::new(),
            current_namespace: None,
            program,
            depth: 0,
            dry_run: false,
            current_error: None,
        }
    }

    /// Builds the per-iteration context for a loop body (spec §3 Lifecycle):
    /// a shallow copy with the loop variable bound. Mutations inside the
    /// loop body do not leak back to `self`.
    pub fn fork_for_loop_iteration(&self, var_name: &str, value: &str) -> ExecutionContext {
        let mut forked = self.clone();
        forked.variables.insert(var_name.to_string(), value.to_string());
        forked.depth += 1;
        forked
    }

    /// Builds an independent worker context for a parallel loop iteration
    /// (spec §3 Lifecycle, §4.12): parameters and variables are fully
    /// copied; nothing the worker does propagates back to the parent.
    pub fn fork_for_parallel_worker(&self, var_name: &str, value: &str) -> ExecutionContext {
        self.fork_for_loop_iteration(var_name, value)
    }

    /// Builds a fresh context for a called task/template, copying only the
    /// variables visible for default-interpolation purposes; parameters are
    /// bound separately by the caller (spec §4.14).
    pub fn fork_for_call(&self, task_name: &str) -> ExecutionContext {
        ExecutionContext {
            parameters: IndexMap::new(),
            variables: self.variables.clone(),
            project: Arc::clone(&self.project),
            current_file: self.current_file.clone(),
            current_task: task_name.to_string(),
            current_namespace: self.current_namespace.clone(),
            program: Arc::clone(&self.program),
            depth: self.depth + 1,
            dry_run: self.dry_run,
            current_error: None,
        }
    }

    /// Propagates variables set by a called subtask back into the caller's
    /// map (spec §3 Lifecycle: "upward propagation"). Parameters never
    /// propagate.
    pub fn absorb_callee_variables(&mut self, callee: &ExecutionContext) {
        for (k, v) in &callee.variables {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    pub fn get_setting(&self, key: &str) -> Option<&str> {
        self.project.settings.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        let project = Arc::new(ProjectContext::empty("demo"));
        let program = Arc::new(Program::default());
        ExecutionContext::new(project, program, "demo.drun")
    }

    #[test]
    fn loop_fork_does_not_leak_back() {
        let base = ctx();
        let mut forked = base.fork_for_loop_iteration("item", "a");
        forked.variables.insert("extra".into(), "value".into());
        assert!(!base.variables.contains_key("extra"));
        assert_eq!(forked.variables.get("item").map(String::as_str), Some("a"));
    }

    #[test]
    fn parallel_workers_do_not_see_each_others_mutations() {
        let base = ctx();
        let mut w1 = base.fork_for_parallel_worker("item", "1");
        let mut w2 = base.fork_for_parallel_worker("item", "2");
        w1.variables.insert("seen".into(), "w1".into());
        w2.variables.insert("seen".into(), "w2".into());
        assert_eq!(w1.variables.get("seen").map(String::as_str), Some("w1"));
        assert_eq!(w2.variables.get("seen").map(String::as_str), Some("w2"));
    }

    #[test]
    fn callee_variables_propagate_upward_but_not_parameters() {
        let mut caller = ctx();
        let mut callee = caller.fork_for_call("sub");
        callee.variables.insert("result".into(), "42".into());
        callee.parameters.insert("ignored".into(), Value::String("x".into()));
        caller.absorb_callee_variables(&callee);
        assert_eq!(caller.variables.get("result").map(String::as_str), Some("42"));
        assert!(!caller.parameters.contains_key("ignored"));
    }

    #[test]
    fn mark_included_is_idempotent_per_path() {
        let project = ProjectContext::empty("demo");
        assert!(project.mark_included("a.drun"));
        assert!(!project.mark_included("a.drun"));
    }
}
