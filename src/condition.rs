//! Condition evaluator (spec §4.10): the string-form condition language used
//! by `when`/`if`/`otherwise` and by `break when`/`continue if`. Implemented
//! as direct string matching over the forms spec.md enumerates, rather than
//! a pre-parsed internal AST — the forms are few and the teacher's own
//! `test_cmd`/`expr_cmd` take the same "match the shape, fall through"
//! approach for bash's `[ ... ]` grammar.

use crate::context::ExecutionContext;
use crate::interpolator;
use crate::traits::Detector;

pub async fn evaluate(condition: &str, ctx: &ExecutionContext, detector: &dyn Detector) -> bool {
    let condition = condition.trim();
    if let Some(idx) = condition.find(" and ") {
        let (left, right) = condition.split_at(idx);
        let right = &right[5..];
        return Box::pin(evaluate(left, ctx, detector)).await && Box::pin(evaluate(right, ctx, detector)).await;
    }

    if let Some(rest) = condition.strip_prefix("env ") {
        return evaluate_env(rest, ctx);
    }
    if let Some(result) = evaluate_folder(condition, ctx) {
        return result;
    }
    if let Some(result) = evaluate_variable_clause(condition, ctx) {
        return result;
    }
    if let Some(result) = evaluate_availability(condition, detector).await {
        return result;
    }
    if let Some(result) = evaluate_version_comparison(condition, ctx, detector).await {
        return result;
    }

    let resolved = interpolator::interpolate(condition, ctx, true).resolved;
    match resolved.trim() {
        "true" => true,
        "false" => false,
        other => !other.is_empty(),
    }
}

fn evaluate_env(rest: &str, ctx: &ExecutionContext) -> bool {
    let rest = rest.trim();
    if let Some(var) = rest.strip_suffix(" exists") {
        return std::env::var(var.trim()).is_ok();
    }
    if let Some(idx) = rest.find(" is not ") {
        let var = rest[..idx].trim();
        let rhs = rest[idx + 8..].trim();
        let actual = std::env::var(var).unwrap_or_default();
        if rhs == "empty" {
            return !actual.is_empty();
        }
        return actual != unquote(rhs);
    }
    if let Some(idx) = rest.find(" is ") {
        let var = rest[..idx].trim();
        let rhs = rest[idx + 4..].trim();
        let actual = std::env::var(var).unwrap_or_default();
        if rhs == "empty" {
            return actual.is_empty();
        }
        return actual == unquote(rhs);
    }
    false
}

/// `folder|directory|dir "PATH" is (not) empty` (spec §4.10). Interpolates
/// PATH first; a nonexistent directory counts as empty.
fn evaluate_folder(condition: &str, ctx: &ExecutionContext) -> Option<bool> {
    for prefix in ["folder ", "directory ", "dir "] {
        if let Some(rest) = condition.strip_prefix(prefix) {
            let rest = rest.trim();
            let (path_part, negate) = if let Some(p) = rest.strip_suffix(" is not empty") {
                (p, true)
            } else if let Some(p) = rest.strip_suffix(" is empty") {
                (p, false)
            } else {
                continue;
            };
            let path = interpolator::interpolate(&unquote(path_part.trim()), ctx, true).resolved;
            let is_empty = std::fs::read_dir(&path).map(|mut d| d.next().is_none()).unwrap_or(true);
            return Some(if negate { !is_empty } else { is_empty });
        }
    }
    None
}

/// `$var is (not) empty`, `$var is (not) VAL` (spec §4.10).
fn evaluate_variable_clause(condition: &str, ctx: &ExecutionContext) -> Option<bool> {
    let rest = condition.strip_prefix('$')?;
    let (name, clause) = split_first_token(rest)?;

    let value = crate::value::Value::infer(&lookup_raw(name, ctx).unwrap_or_default());
    match clause.trim() {
        "is not empty" => Some(!is_value_empty(&value)),
        "is empty" => Some(is_value_empty(&value)),
        other => {
            if let Some(rhs) = other.strip_prefix("is not ") {
                Some(value.as_string() != resolve_rhs(rhs, ctx))
            } else if let Some(rhs) = other.strip_prefix("is ") {
                Some(value.as_string() == resolve_rhs(rhs, ctx))
            } else {
                None
            }
        }
    }
}

fn resolve_rhs(rhs: &str, ctx: &ExecutionContext) -> String {
    let rhs = rhs.trim();
    if rhs == "empty" {
        return String::new();
    }
    if rhs.starts_with('$') {
        return lookup_raw(&rhs[1..], ctx).unwrap_or_default();
    }
    unquote(rhs)
}

fn lookup_raw(name: &str, ctx: &ExecutionContext) -> Option<String> {
    ctx.variables.get(name).cloned().or_else(|| ctx.parameters.get(name).map(|v| v.as_string()))
}

fn is_value_empty(value: &crate::value::Value) -> bool {
    match value {
        crate::value::Value::List(items) => items.is_empty(),
        other => other.as_string().trim().is_empty(),
    }
}

fn split_first_token(rest: &str) -> Option<(&str, &str)> {
    let idx = rest.find(" is ")?;
    Some((&rest[..idx], &rest[idx + 1..]))
}

/// `T1,T2,... is (not) available` (spec §4.10): `is available` requires
/// every named tool; `is not available` succeeds iff at least one is
/// missing.
async fn evaluate_availability(condition: &str, detector: &dyn Detector) -> Option<bool> {
    let (tools_part, negate) = if let Some(p) = condition.strip_suffix(" is not available") {
        (p, true)
    } else if let Some(p) = condition.strip_suffix(" is available") {
        (p, false)
    } else {
        return None;
    };
    if tools_part.trim().is_empty() || tools_part.contains(' ') && !tools_part.contains(',') {
        return None;
    }
    let mut all_present = true;
    for tool in tools_part.split(',') {
        if !detector.is_tool_available(tool.trim()).await {
            all_present = false;
        }
    }
    Some(if negate { !all_present } else { all_present })
}

/// `TOOL version OP "X.Y.Z"` (spec §4.10).
async fn evaluate_version_comparison(condition: &str, ctx: &ExecutionContext, detector: &dyn Detector) -> Option<bool> {
    let idx = condition.find(" version ")?;
    let tool = condition[..idx].trim();
    let rest = condition[idx + 9..].trim();
    for op in [">=", "<=", "==", "!=", ">", "<"] {
        if let Some(rhs) = rest.strip_prefix(op) {
            let want = unquote(interpolator::interpolate(rhs.trim(), ctx, true).resolved.trim());
            let actual = detector.get_tool_version(tool).await?;
            return Some(detector.compare_version(&actual, op, &want));
        }
    }
    None
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"'))) {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}
