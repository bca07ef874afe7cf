//! Secrets interface executor (spec §4.4, §6): `set`/`get`/`delete`/`exists`/
//! `list` against the configured `SecretsStore`. Values never appear in
//! `[DRY RUN]` output (spec §6 "secrets are never echoed").

use crate::ast::{SecretOp, SecretStatement};
use crate::context::ExecutionContext;
use crate::errors::{InterpreterError, ParameterValidationError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;

pub async fn execute(stmt: &SecretStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let namespace = interpolate_strict(&stmt.namespace, ctx)?;

    match stmt.op {
        SecretOp::Set => {
            let key = require_key(stmt, ctx)?;
            let value = stmt
                .value
                .as_ref()
                .map(|v| interpolate_strict(v, ctx))
                .transpose()?
                .ok_or_else(|| ParameterValidationError::new("secret set requires a value"))?;
            if ctx.dry_run {
                services.emit(format!("[DRY RUN] secret set {}.{}", namespace, key));
                return Ok(());
            }
            services.secrets.set(&namespace, &key, &value).await;
        }
        SecretOp::Get => {
            let key = require_key(stmt, ctx)?;
            let found = services.secrets.get(&namespace, &key).await.unwrap_or_default();
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), found);
            }
        }
        SecretOp::Delete => {
            let key = require_key(stmt, ctx)?;
            if ctx.dry_run {
                services.emit(format!("[DRY RUN] secret delete {}.{}", namespace, key));
                return Ok(());
            }
            let removed = services.secrets.delete(&namespace, &key).await;
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), removed.to_string());
            }
        }
        SecretOp::Exists => {
            let key = require_key(stmt, ctx)?;
            let exists = services.secrets.exists(&namespace, &key).await;
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), exists.to_string());
            }
        }
        SecretOp::List => {
            let keys = services.secrets.list(&namespace).await;
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), keys.join(","));
            }
        }
    }
    Ok(())
}

fn require_key(stmt: &SecretStatement, ctx: &ExecutionContext) -> Result<String, InterpreterError> {
    let key = stmt
        .key
        .as_ref()
        .ok_or_else(|| ParameterValidationError::new("secret statement requires a key"))?;
    interpolate_strict(key, ctx)
}
