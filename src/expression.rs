//! Expression evaluator (spec §4.9), distinct from `{...}` interpolation:
//! the small arithmetic/comparison language used by `let`/`set`/`capture`.

use crate::ast::{BinaryOp, ExpressionNode};
use crate::context::ExecutionContext;
use crate::errors::{ArithmeticError, InterpreterError, UndefinedVariableError};

pub fn evaluate(expr: &ExpressionNode, ctx: &ExecutionContext) -> Result<String, InterpreterError> {
    match expr {
        ExpressionNode::Literal(s) => Ok(s.clone()),
        ExpressionNode::Identifier(name) => lookup_identifier(name, ctx),
        ExpressionNode::Binary { op, left, right } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            evaluate_binary(*op, &l, &r)
        }
        ExpressionNode::Call { name, args } => evaluate_call(name, args, ctx),
    }
}

fn lookup_identifier(name: &str, ctx: &ExecutionContext) -> Result<String, InterpreterError> {
    if let Some(v) = ctx.variables.get(name) {
        return Ok(v.clone());
    }
    if let Some(p) = ctx.parameters.get(name) {
        return Ok(p.as_string());
    }
    Err(UndefinedVariableError::new(vec![name.to_string()]).into())
}

fn evaluate_binary(op: BinaryOp, l: &str, r: &str) -> Result<String, InterpreterError> {
    let numbers = l.trim().parse::<f64>().ok().zip(r.trim().parse::<f64>().ok());
    match op {
        BinaryOp::Add => match numbers {
            Some((a, b)) => Ok(format_number(a + b)),
            None => Ok(format!("{}{}", l, r)),
        },
        BinaryOp::Sub => arithmetic(numbers, |a, b| a - b),
        BinaryOp::Mul => arithmetic(numbers, |a, b| a * b),
        BinaryOp::Div => match numbers {
            Some((_, b)) if b == 0.0 => Err(ArithmeticError::division_by_zero().into()),
            Some((a, b)) => Ok(format_number(a / b)),
            None => Err(ArithmeticError::new(format!("cannot divide non-numeric operands '{}' / '{}'", l, r)).into()),
        },
        BinaryOp::Eq => Ok(bool_str(compare(numbers, l, r) == std::cmp::Ordering::Equal)),
        BinaryOp::Neq => Ok(bool_str(compare(numbers, l, r) != std::cmp::Ordering::Equal)),
        BinaryOp::Lt => Ok(bool_str(compare(numbers, l, r) == std::cmp::Ordering::Less)),
        BinaryOp::Gt => Ok(bool_str(compare(numbers, l, r) == std::cmp::Ordering::Greater)),
        BinaryOp::Le => Ok(bool_str(compare(numbers, l, r) != std::cmp::Ordering::Greater)),
        BinaryOp::Ge => Ok(bool_str(compare(numbers, l, r) != std::cmp::Ordering::Less)),
    }
}

fn arithmetic(numbers: Option<(f64, f64)>, f: impl Fn(f64, f64) -> f64) -> Result<String, InterpreterError> {
    match numbers {
        Some((a, b)) => Ok(format_number(f(a, b))),
        None => Err(ArithmeticError::new("arithmetic operation requires numeric operands").into()),
    }
}

/// Numeric comparison when both sides parse as numbers, else lexicographic
/// (spec §4.9).
fn compare(numbers: Option<(f64, f64)>, l: &str, r: &str) -> std::cmp::Ordering {
    match numbers {
        Some((a, b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        None => l.cmp(r),
    }
}

fn bool_str(b: bool) -> String {
    if b { "true".to_string() } else { "false".to_string() }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// `now()` returns Unix epoch seconds; any other name falls back to
/// executing the literal via the shell and returning trimmed stdout (spec
/// §4.9).
fn evaluate_call(name: &str, args: &[ExpressionNode], ctx: &ExecutionContext) -> Result<String, InterpreterError> {
    if name == "now" && args.is_empty() {
        return Ok(crate::builtins::call_bare("now", ctx).unwrap_or_default());
    }
    let mut command = name.to_string();
    for a in args {
        command.push(' ');
        command.push_str(&evaluate(a, ctx)?);
    }
    let output = std::process::Command::new("sh").arg("-c").arg(&command).output();
    match output {
        Ok(out) => Ok(String::from_utf8_lossy(&out.stdout).trim().to_string()),
        Err(e) => Err(crate::errors::ShellFailureError {
            command,
            exit_code: -1,
            stderr: e.to_string(),
        }
        .into()),
    }
}
