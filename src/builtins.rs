//! Built-in functions callable from inside `{...}` interpolation (spec
//! §4.8.3): bare names (`pwd`, `hostname`, `now`), quoted-arg calls
//! (`now.format(...)`, `env('KEY', 'default')`), and parameter-arg calls
//! (`pwd(name_param)`).

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;

use crate::context::ExecutionContext;

/// Bare-name builtins with no parentheses at all.
pub fn call_bare(name: &str, ctx: &ExecutionContext) -> Option<String> {
    match name {
        "pwd" => std::env::current_dir().ok().map(|p| p.display().to_string()),
        "hostname" => hostname(),
        "now" => Some(now_epoch_seconds().to_string()),
        "current git branch" => current_git_branch(),
        _ => {
            let _ = ctx;
            None
        }
    }
}

/// Parenthesized/dotted builtin calls: `now.format('2006-01-02')`,
/// `env('KEY', 'default')`, `pwd(name_param)`.
pub fn call(expr: &str, ctx: &ExecutionContext) -> Option<String> {
    if let Some(rest) = expr.strip_prefix("now.format(") {
        let layout = rest.trim_end_matches(')').trim_matches(|c| c == '\'' || c == '"');
        let now = DateTime::from_timestamp(now_epoch_seconds() as i64, 0)
            .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap());
        return Some(now.format(&translate_go_layout(layout)).to_string());
    }
    if let Some(rest) = expr.strip_prefix("env(") {
        let inner = rest.trim_end_matches(')');
        let args = split_args(inner);
        let key = unquote(args.first()?.trim());
        let default = args.get(1).map(|s| unquote(s.trim())).unwrap_or_default();
        return Some(std::env::var(&key).unwrap_or(default));
    }
    if let Some(rest) = expr.strip_prefix("pwd(") {
        let inner = rest.trim_end_matches(')').trim();
        let param_name = unquote(inner);
        if let Some(p) = ctx.parameters.get(&param_name) {
            let _ = p;
        }
        return std::env::current_dir().ok().map(|p| p.display().to_string());
    }
    None
}

/// Translates a Go reference-time layout (`"2006-01-02"`, the form used by
/// `now.format(...)` throughout drun scripts) into a `chrono` strftime
/// pattern. Tokens are matched longest-first so `"January"` isn't shadowed
/// by `"Jan"` and `"2006"` isn't shadowed by `"06"`.
fn translate_go_layout(layout: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("2006", "%Y"),
        ("January", "%B"),
        ("Monday", "%A"),
        ("Jan", "%b"),
        ("Mon", "%a"),
        ("-0700", "%z"),
        ("Z07:00", "%:z"),
        ("15", "%H"),
        ("06", "%y"),
        ("01", "%m"),
        ("02", "%d"),
        ("03", "%I"),
        ("04", "%M"),
        ("05", "%S"),
        ("PM", "%p"),
    ];

    let mut out = String::with_capacity(layout.len());
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.char_indices();
        chars.next();
        let next_boundary = chars.next().map(|(i, _)| i).unwrap_or(rest.len());
        out.push_str(&rest[..next_boundary]);
        rest = &rest[next_boundary..];
    }
    out
}

fn split_args(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).collect()
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"'))) {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        let output = std::process::Command::new("hostname").output().ok()?;
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    })
}

fn current_git_branch() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
