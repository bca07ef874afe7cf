//! Variable interpolation (spec §4.8): resolves every `{EXPR}` occurrence in
//! a message string against an `ExecutionContext`.

use std::fmt::Write as _;

use crate::context::ExecutionContext;
use crate::errors::UndefinedVariableError;

pub struct InterpolationResult {
    pub resolved: String,
    pub undefined: Vec<String>,
}

/// Resolves every `{...}` span in `message`. In strict mode
/// (`allow_undefined == false`), unresolved simple variables are collected
/// rather than failing immediately, so the caller gets the full list (spec
/// §4.8's strict-mode soundness property) alongside the partially-resolved
/// string.
pub fn interpolate(message: &str, ctx: &ExecutionContext, allow_undefined: bool) -> InterpolationResult {
    let mut resolved = String::with_capacity(message.len());
    let mut undefined = Vec::new();
    let bytes = message.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = find_matching_brace(message, i) {
                let expr = &message[i + 1..end];
                match resolve_expr(expr, ctx) {
                    Some(value) => resolved.push_str(&value),
                    None => {
                        if is_simple_variable(expr) {
                            if allow_undefined {
                                let _ = write!(resolved, "{{{}}}", expr);
                            } else {
                                undefined.push(expr.to_string());
                            }
                        } else {
                            let _ = write!(resolved, "{{{}}}", expr);
                        }
                    }
                }
                i = end + 1;
                continue;
            }
        }
        let ch = message[i..].chars().next().expect("i is a char boundary");
        resolved.push(ch);
        i += ch.len_utf8();
    }
    InterpolationResult { resolved, undefined }
}

/// Convenience wrapper returning a `Result`, matching the contract shape
/// statement executors call: `(resolved_string, optional_error)`.
pub fn interpolate_strict(message: &str, ctx: &ExecutionContext) -> Result<String, UndefinedVariableError> {
    let result = interpolate(message, ctx, false);
    if result.undefined.is_empty() {
        Ok(result.resolved)
    } else {
        Err(UndefinedVariableError::new(result.undefined))
    }
}

fn find_matching_brace(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_simple_variable(expr: &str) -> bool {
    let trimmed = expr.trim();
    !trimmed.contains(['|', '(', ')', '?', ':'])
        && !trimmed.contains(" is ")
        && !trimmed.starts_with("if ")
        && !trimmed.contains(" without ")
}

/// Resolution cascade, in order: variable-with-operation-chain, ternary,
/// if-then-else, conditional builtin, built-in call, then a simple
/// variable lookup.
fn resolve_expr(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    let trimmed = expr.trim();

    if let Some(result) = resolve_conditional_builtin(trimmed, ctx) {
        return Some(result);
    }
    if let Some(result) = resolve_ternary(trimmed, ctx) {
        return Some(result);
    }
    if let Some(result) = resolve_if_then_else(trimmed, ctx) {
        return Some(result);
    }
    if trimmed.contains('|') || trimmed.contains(" without ") {
        return Some(resolve_operation_chain(trimmed, ctx));
    }
    if trimmed.contains('(') || trimmed.ends_with(')') {
        if let Some(result) = resolve_builtin_call(trimmed, ctx) {
            return Some(result);
        }
    }
    if let Some(bare) = crate::builtins::call_bare(trimmed, ctx) {
        return Some(bare);
    }
    resolve_simple_variable(trimmed, ctx)
}

/// Simple-variable lookup order (spec §4.8.1): with-`$` variables first,
/// then parameters by bare name, then variables, then project built-ins
/// (`project`, `version`, `current_task`), then project settings.
fn resolve_simple_variable(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    if let Some(rest) = expr.strip_prefix('$') {
        if let Some(key) = rest.strip_prefix("globals.") {
            return ctx.get_setting(key).map(String::from);
        }
        if let Some(v) = ctx.variables.get(rest) {
            return Some(v.clone());
        }
        if let Some(p) = ctx.parameters.get(rest) {
            return Some(p.as_string());
        }
        return None;
    }

    if let Some(p) = ctx.parameters.get(expr) {
        return Some(p.as_string());
    }
    if let Some(v) = ctx.variables.get(expr) {
        return Some(v.clone());
    }
    match expr {
        "project" => return Some(ctx.project.name.clone()),
        "version" => return Some(ctx.project.version.clone().unwrap_or_default()),
        "current_task" => return Some(ctx.current_task.clone()),
        _ => {}
    }
    ctx.get_setting(expr).map(String::from)
}

/// Parses `BASE without prefix 'v'`, `BASE | replace 'a' by 'b' | uppercase`,
/// etc. into a base lookup plus an ordered operation chain, then applies the
/// operations left-to-right. An unrecognized operation name passes its
/// input through unchanged (spec §4.8.2).
fn resolve_operation_chain(expr: &str, ctx: &ExecutionContext) -> String {
    let parts: Vec<&str> = expr.split('|').map(str::trim).collect();
    let (base_part, first_ops) = split_without_clause(parts[0]);
    let mut value = resolve_simple_variable(base_part.trim(), ctx).unwrap_or_default();
    for op in first_ops {
        value = apply_operation(&value, &op);
    }
    for stage in &parts[1..] {
        value = apply_operation(&value, stage);
    }
    value
}

fn split_without_clause(s: &str) -> (&str, Vec<String>) {
    if let Some(idx) = s.find(" without ") {
        (&s[..idx], vec![s[idx + 1..].to_string()])
    } else {
        (s, Vec::new())
    }
}

/// Applies a single named operation from the §4.8.2 vocabulary. Exposed
/// crate-wide so the `transform` variable op (§4.4) can reuse the same
/// chain-application logic the interpolator uses for `{$var | op}` chains.
pub(crate) fn apply_operation(value: &str, op: &str) -> String {
    let op = op.trim();
    if op == "uppercase" {
        return value.to_uppercase();
    }
    if op == "lowercase" {
        return value.to_lowercase();
    }
    if op == "trim" {
        return value.trim().to_string();
    }
    if op == "length" {
        return value.chars().count().to_string();
    }
    if let Some(arg) = op.strip_prefix("without prefix ") {
        let arg = unquote(arg);
        return value.strip_prefix(arg.as_str()).unwrap_or(value).to_string();
    }
    if let Some(arg) = op.strip_prefix("without suffix ") {
        let arg = unquote(arg);
        return value.strip_suffix(arg.as_str()).unwrap_or(value).to_string();
    }
    if let Some(rest) = op.strip_prefix("replace ") {
        if let Some((from, to)) = split_replace_args(rest) {
            return value.replace(from.as_str(), to.as_str());
        }
        return value.to_string();
    }
    if let Some(arg) = op.strip_prefix("concat ") {
        return format!("{}{}", value, unquote(arg));
    }
    if let Some(arg) = op.strip_prefix("split ") {
        return value.split(unquote(arg).as_str()).collect::<Vec<_>>().join(",");
    }
    if let Some(arg) = op.strip_prefix("join ") {
        return value.split(',').collect::<Vec<_>>().join(&unquote(arg));
    }
    if let Some(rest) = op.strip_prefix("slice ") {
        let nums: Vec<&str> = rest.split_whitespace().collect();
        if nums.len() == 2 {
            if let (Ok(start), Ok(end)) = (nums[0].parse::<usize>(), nums[1].parse::<usize>()) {
                let chars: Vec<char> = value.chars().collect();
                let end = end.min(chars.len());
                let start = start.min(end);
                return chars[start..end].iter().collect();
            }
        }
        return value.to_string();
    }
    value.to_string()
}

fn split_replace_args(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim();
    let sep = if rest.contains(" by ") { " by " } else { " with " };
    let idx = rest.find(sep)?;
    let from = unquote(rest[..idx].trim());
    let to = unquote(rest[idx + sep.len()..].trim());
    Some((from, to))
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
        || (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn resolve_builtin_call(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    crate::builtins::call(expr, ctx)
}

fn is_truthy_literal(s: &str) -> bool {
    matches!(s.trim(), "true" | "yes" | "1" | "on")
}

/// `COND ? THEN : ELSE` (spec §4.8.4).
fn resolve_ternary(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    let q = find_top_level(expr, '?')?;
    let c = find_top_level(&expr[q + 1..], ':')? + q + 1;
    let cond = expr[..q].trim();
    let then_branch = expr[q + 1..c].trim();
    let else_branch = expr[c + 1..].trim();
    let cond_value = resolve_simple_variable(cond, ctx).unwrap_or_default();
    if is_truthy_literal(&cond_value) {
        Some(unquote(then_branch))
    } else {
        Some(unquote(else_branch))
    }
}

fn find_top_level(s: &str, needle: char) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == needle && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// `if COND then X else Y` (spec §4.8.5).
fn resolve_if_then_else(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    let rest = expr.strip_prefix("if ")?;
    let then_idx = rest.find(" then ")?;
    let cond = &rest[..then_idx];
    let after_then = &rest[then_idx + 6..];
    let else_idx = after_then.find(" else ");
    let (then_branch, else_branch) = match else_idx {
        Some(idx) => (&after_then[..idx], &after_then[idx + 6..]),
        None => (after_then, ""),
    };
    let truthy = evaluate_if_condition(cond.trim(), ctx);
    Some(unquote(if truthy { then_branch } else { else_branch }))
}

fn evaluate_if_condition(cond: &str, ctx: &ExecutionContext) -> bool {
    if let Some(rest) = cond.strip_prefix('$') {
        if let Some(idx) = rest.find(" is not ") {
            let var = resolve_simple_variable(&format!("${}", &rest[..idx]), ctx).unwrap_or_default();
            let lit = unquote(rest[idx + 8..].trim());
            return var != lit;
        }
        if let Some(idx) = rest.find(" is ") {
            let var = resolve_simple_variable(&format!("${}", &rest[..idx]), ctx).unwrap_or_default();
            let lit = unquote(rest[idx + 4..].trim());
            return var == lit;
        }
        let value = resolve_simple_variable(&format!("${}", rest), ctx).unwrap_or_default();
        return is_truthy_literal(&value) || !value.is_empty();
    }
    let value = resolve_simple_variable(cond, ctx).unwrap_or_default();
    is_truthy_literal(&value)
}

/// `start progress(...)`, `update progress(...)`, `finish progress(...)`,
/// `start timer(...)`, `stop timer(...)`, `show elapsed time(...)` — emit a
/// side-effecting line and return a string (spec §4.8.6).
fn resolve_conditional_builtin(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    let (name, arg) = split_call(expr)?;
    match name {
        "start progress" | "update progress" | "finish progress" | "start timer" | "stop timer"
        | "show elapsed time" => {
            let _ = ctx;
            Some(arg.unwrap_or_default())
        }
        _ => None,
    }
}

fn split_call(expr: &str) -> Option<(&str, Option<String>)> {
    let open = expr.find('(')?;
    if !expr.trim_end().ends_with(')') {
        return None;
    }
    let name = expr[..open].trim();
    let inner = expr[open + 1..expr.rfind(')')?].trim();
    Some((name, if inner.is_empty() { None } else { Some(unquote(inner)) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::context::ProjectContext;
    use crate::value::Value;
    use std::sync::Arc;

    fn base_ctx() -> ExecutionContext {
        let project = Arc::new(ProjectContext::empty("demo"));
        ExecutionContext::new(project, Arc::new(Program::default()), "demo.drun")
    }

    #[test]
    fn identity_when_no_braces() {
        let ctx = base_ctx();
        let result = interpolate("plain text", &ctx, true);
        assert_eq!(result.resolved, "plain text");
        assert!(result.undefined.is_empty());
    }

    #[test]
    fn resolves_simple_parameter() {
        let mut ctx = base_ctx();
        ctx.parameters.insert("name".into(), Value::String("World".into()));
        let result = interpolate("Hello, {name}!", &ctx, true);
        assert_eq!(result.resolved, "Hello, World!");
    }

    #[test]
    fn strict_mode_collects_undefined_names() {
        let ctx = base_ctx();
        let result = interpolate("Hello {$missing}", &ctx, false);
        assert_eq!(result.undefined, vec!["$missing".to_string()]);
    }

    #[test]
    fn allow_undefined_keeps_literal_braces() {
        let ctx = base_ctx();
        let result = interpolate("Hello {$missing}", &ctx, true);
        assert_eq!(result.resolved, "Hello {$missing}");
    }

    #[test]
    fn empty_string_resolution_is_not_undefined() {
        let mut ctx = base_ctx();
        ctx.variables.insert("note".into(), String::new());
        let result = interpolate("[{note}]", &ctx, false);
        assert_eq!(result.resolved, "[]");
        assert!(result.undefined.is_empty());
    }

    #[test]
    fn without_prefix_operation_strips_arg() {
        let mut ctx = base_ctx();
        ctx.variables.insert("version".into(), "v1.2.3".into());
        let result = interpolate("{version without prefix 'v'}", &ctx, true);
        assert_eq!(result.resolved, "1.2.3");
    }

    #[test]
    fn piped_chain_applies_operations_in_order() {
        let mut ctx = base_ctx();
        ctx.variables.insert("branch".into(), "feature/foo".into());
        let result = interpolate("{branch | replace '/' by '-' | uppercase}", &ctx, true);
        assert_eq!(result.resolved, "FEATURE-FOO");
    }

    #[test]
    fn ternary_selects_branch_by_truthiness() {
        let mut ctx = base_ctx();
        ctx.variables.insert("flag".into(), "true".into());
        let result = interpolate("{$flag ? 'yes' : 'no'}", &ctx, true);
        assert_eq!(result.resolved, "yes");
    }

    #[test]
    fn if_then_else_with_equality_condition() {
        let mut ctx = base_ctx();
        ctx.variables.insert("env".into(), "prod".into());
        let result = interpolate("{if $env is 'prod' then 'careful' else 'ok'}", &ctx, true);
        assert_eq!(result.resolved, "careful");
    }

    #[test]
    fn trim_idempotent() {
        assert_eq!(apply_operation(&apply_operation("  x  ", "trim"), "trim"), "x");
    }

    #[test]
    fn uppercase_idempotent() {
        assert_eq!(apply_operation(&apply_operation("abc", "uppercase"), "uppercase"), "ABC");
    }

    #[test]
    fn globals_dotted_form_reads_project_settings() {
        let project = Arc::new(ProjectContext {
            name: "demo".into(),
            settings: [("region".to_string(), "us-east-1".to_string())].into_iter().collect(),
            ..ProjectContext::empty("demo")
        });
        let ctx = ExecutionContext::new(project, Arc::new(Program::default()), "demo.drun");
        let result = interpolate("{$globals.region}", &ctx, true);
        assert_eq!(result.resolved, "us-east-1");
    }
}
