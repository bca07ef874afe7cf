//! Dependency resolver (spec §4.1): topologically orders tasks from a target
//! root. Modeled as a directed graph over task-name string keys (spec §9
//! "Design Notes" — cyclic graphs use a visited-set plus a recursion-stack,
//! no shared mutable graph structure needed after construction).

use std::collections::HashSet;

use crate::ast::{Program, TaskNode};
use crate::errors::{CircularDependencyError, InterpreterError, MissingDependencyError};

/// Preserves dependency-group shape so the orchestrator may honor the
/// parallel hint (spec §4.1) or simply serialize the flat `order`.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub order: Vec<String>,
    pub groups: Vec<ResolvedGroup>,
}

#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub task: String,
    pub dependency_names: Vec<String>,
    pub sequential: bool,
}

/// Validates that every referenced dependency exists and every task
/// individually resolves without cycles (spec §4.1 "Validation entry
/// point").
pub fn validate(program: &Program) -> Result<(), InterpreterError> {
    for task in &program.tasks {
        for group in &task.depends_on {
            for dep in &group.names {
                if find_task(program, dep).is_none() {
                    return Err(MissingDependencyError { task: task.name.clone(), missing: dep.clone() }.into());
                }
            }
        }
        resolve(program, &task.name)?;
    }
    Ok(())
}

/// Two-phase walk (spec §4.1): DFS-collect reachable tasks with cycle
/// detection, then post-order topological sort so a node is appended only
/// after all its dependencies have been emitted.
pub fn resolve(program: &Program, target: &str) -> Result<ExecutionPlan, InterpreterError> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut in_progress = HashSet::new();
    let mut groups = Vec::new();

    visit(program, target, &mut visited, &mut in_progress, &mut order, &mut groups)?;

    Ok(ExecutionPlan { order, groups })
}

fn visit(
    program: &Program,
    name: &str,
    visited: &mut HashSet<String>,
    in_progress: &mut HashSet<String>,
    order: &mut Vec<String>,
    groups: &mut Vec<ResolvedGroup>,
) -> Result<(), InterpreterError> {
    if visited.contains(name) {
        return Ok(());
    }
    if in_progress.contains(name) {
        return Err(CircularDependencyError { node: name.to_string() }.into());
    }
    in_progress.insert(name.to_string());

    let task = find_task(program, name).ok_or_else(|| MissingDependencyError {
        task: name.to_string(),
        missing: name.to_string(),
    })?;

    for group in &task.depends_on {
        for dep in &group.names {
            if find_task(program, dep).is_none() {
                return Err(MissingDependencyError { task: name.to_string(), missing: dep.clone() }.into());
            }
            visit(program, dep, visited, in_progress, order, groups)?;
        }
        groups.push(ResolvedGroup {
            task: name.to_string(),
            dependency_names: group.names.clone(),
            sequential: group.sequential,
        });
    }

    in_progress.remove(name);
    visited.insert(name.to_string());
    order.push(name.to_string());
    Ok(())
}

fn find_task<'a>(program: &'a Program, name: &str) -> Option<&'a TaskNode> {
    program.tasks.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DependencyGroup;

    fn task(name: &str, deps: &[&str]) -> TaskNode {
        TaskNode {
            name: name.to_string(),
            description: None,
            parameters: vec![],
            depends_on: if deps.is_empty() {
                vec![]
            } else {
                vec![DependencyGroup { names: deps.iter().map(|s| s.to_string()).collect(), sequential: true }]
            },
            body: vec![],
        }
    }

    #[test]
    fn topological_order_respects_dependency_chain() {
        let program = Program { tasks: vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])], ..Default::default() };
        let plan = resolve(&program, "c").unwrap();
        assert_eq!(plan.order, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_dependency_emits_node_once() {
        let program = Program {
            tasks: vec![task("a", &[]), task("b", &["a"]), task("c", &["a"]), task("d", &["b", "c"])],
            ..Default::default()
        };
        let plan = resolve(&program, "d").unwrap();
        assert_eq!(plan.order.iter().filter(|n| *n == "a").count(), 1);
        let pos = |n: &str| plan.order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let program = Program { tasks: vec![task("a", &["a"])], ..Default::default() };
        let err = resolve(&program, "a").unwrap_err();
        assert!(matches!(err, InterpreterError::CircularDependency(_)));
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let program = Program { tasks: vec![task("a", &["b"]), task("b", &["a"])], ..Default::default() };
        let err = resolve(&program, "a").unwrap_err();
        assert!(matches!(err, InterpreterError::CircularDependency(_)));
    }

    #[test]
    fn missing_dependency_is_reported() {
        let program = Program { tasks: vec![task("a", &["ghost"])], ..Default::default() };
        let err = resolve(&program, "a").unwrap_err();
        assert!(matches!(err, InterpreterError::MissingDependency(_)));
    }

    #[test]
    fn duplicate_edges_collapse_idempotently() {
        let program = Program {
            tasks: vec![
                task("a", &[]),
                TaskNode {
                    name: "b".into(),
                    description: None,
                    parameters: vec![],
                    depends_on: vec![
                        DependencyGroup { names: vec!["a".into()], sequential: true },
                        DependencyGroup { names: vec!["a".into()], sequential: true },
                    ],
                    body: vec![],
                },
            ],
            ..Default::default()
        };
        let plan = resolve(&program, "b").unwrap();
        assert_eq!(plan.order.iter().filter(|n| *n == "a").count(), 1);
    }

    #[test]
    fn validate_reports_missing_dependency_across_all_tasks() {
        let program = Program { tasks: vec![task("a", &["ghost"]), task("ok", &[])], ..Default::default() };
        assert!(validate(&program).is_err());
    }
}
