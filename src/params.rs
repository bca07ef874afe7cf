//! Parameter binding (spec §4.3), shared by the engine orchestrator (project-
//! and task-level parameters bound against CLI input) and by task
//! call/snippet/template instantiation (§4.14), which bind against a caller-
//! supplied override map instead of CLI args.

use indexmap::IndexMap;

use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, ParameterValidationError};
use crate::interpolator::interpolate_strict;
use crate::ast::ParameterNode;
use crate::value::Value;

/// Binds `declared` parameters against `provided` raw strings, falling back
/// to each parameter's default (interpolated against `ctx` so defaults may
/// reference built-ins like `now()`), and failing required-but-missing
/// parameters with `ParameterValidation`. Declaration order is preserved so
/// later parameters can reference earlier ones' raw strings if `provided`
/// was itself built that way by the caller.
pub fn bind_parameters(
    declared: &[ParameterNode],
    provided: &IndexMap<String, String>,
    ctx: &ExecutionContext,
) -> Result<IndexMap<String, Value>, InterpreterError> {
    let mut bound = IndexMap::new();
    for param in declared {
        let raw = if let Some(v) = provided.get(&param.name) {
            v.clone()
        } else if let Some(default) = &param.default {
            interpolate_strict(default, ctx)
                .map_err(|e| ParameterValidationError::new(format!(
                    "parameter '{}' default could not be resolved: {}",
                    param.name, e
                )))?
        } else if param.required {
            return Err(ParameterValidationError::new(format!(
                "parameter '{}' is required",
                param.name
            ))
            .into());
        } else {
            String::new()
        };

        let value = match param.param_type {
            Some(ty) => Value::parse_as(&raw, ty).map_err(|msg| {
                ParameterValidationError::new(format!("parameter '{}' {}", param.name, msg))
            })?,
            None => Value::infer(&raw),
        };

        if let Some(constraint) = &param.constraint {
            value.validate_constraint(&param.name, constraint)?;
        }

        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}
