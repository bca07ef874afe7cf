//! Network probe executor (SPEC_FULL §4.17): TCP-connect reachability check,
//! capturing `"reachable"`/`"unreachable"` and latency in milliseconds.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::ast::NetworkProbeStatement;
use crate::context::ExecutionContext;
use crate::errors::InterpreterError;
use crate::interpolator::interpolate_strict;
use crate::services::Services;
use crate::value::parse_duration;

const DEFAULT_TIMEOUT_MS: u64 = 3_000;

pub async fn execute(stmt: &NetworkProbeStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let host = interpolate_strict(&stmt.host, ctx)?;
    let timeout_ms = match &stmt.timeout {
        Some(raw) => {
            let resolved = interpolate_strict(raw, ctx)?;
            parse_duration(&resolved).unwrap_or(DEFAULT_TIMEOUT_MS)
        }
        None => DEFAULT_TIMEOUT_MS,
    };

    if ctx.dry_run {
        services.emit(format!("[DRY RUN] probe {}:{} (timeout {}ms)", host, stmt.port, timeout_ms));
        if let Some(var) = &stmt.capture {
            ctx.variables.insert(var.clone(), "unknown".to_string());
        }
        return Ok(());
    }

    let addr = format!("{}:{}", host, stmt.port);
    let start = Instant::now();
    let reachable = timeout(Duration::from_millis(timeout_ms), TcpStream::connect(&addr))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    let elapsed_ms = start.elapsed().as_millis();

    if let Some(var) = &stmt.capture {
        let value = if reachable { format!("reachable:{}", elapsed_ms) } else { "unreachable".to_string() };
        ctx.variables.insert(var.clone(), value);
    }
    Ok(())
}
