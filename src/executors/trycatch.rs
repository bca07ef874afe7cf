//! Try/catch/finally executor (spec §4.13). `break`/`continue` signals are
//! never treated as catchable errors — spec §9 is explicit that they must
//! reach the owning loop, never an enclosing `try`.

use crate::ast::{ThrowStatement, TryStatement};
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, UserThrownError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;

pub async fn execute(stmt: &TryStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let try_result = crate::executors::run_body(&stmt.try_body, ctx, services).await;

    let mut final_error = None;
    if let Err(err) = try_result {
        if err.is_loop_control() {
            return Err(err);
        }

        ctx.current_error = Some(err.to_string());
        let mut handled = false;
        for clause in &stmt.catches {
            let matches = clause.error_type.as_deref().map(|t| err.matches_kind(t)).unwrap_or(true);
            if !matches {
                continue;
            }
            if let Some(var) = &clause.error_var {
                ctx.variables.insert(var.clone(), err.to_string());
            }
            if let Err(catch_err) = crate::executors::run_body(&clause.body, ctx, services).await {
                final_error = Some(catch_err);
            }
            handled = true;
            break;
        }
        if !handled {
            final_error = Some(err);
        }
        ctx.current_error = None;
    }

    // Finally always runs; its own failure supersedes whatever try_error
    // remained (spec §4.13).
    if let Err(finally_err) = crate::executors::run_body(&stmt.finally_body, ctx, services).await {
        final_error = Some(finally_err);
    }

    match final_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub fn execute_throw(stmt: &ThrowStatement, ctx: &mut ExecutionContext) -> Result<(), InterpreterError> {
    let message = interpolate_strict(&stmt.message, ctx)?;
    Err(UserThrownError::new(message).into())
}

/// Re-raises the error currently being handled, preserving its original
/// cause rather than a synthetic "rethrown error" message (spec §9 Open
/// Questions — resolved in favor of preserving the cause; see DESIGN.md).
pub fn execute_rethrow(ctx: &mut ExecutionContext) -> Result<(), InterpreterError> {
    match ctx.current_error.clone() {
        Some(cause) => Err(UserThrownError::new(cause).into()),
        None => Err(UserThrownError::new("rethrow called outside of a catch block").into()),
    }
}
