//! File operations executor (SPEC_FULL §4.16 — present in the dispatch
//! table of spec.md §4.4 as the "file op" variant but given no dedicated
//! design subsection there). Grounded on the teacher's `commands/cp`,
//! `commands/mv`, `commands/rm`, `commands/mkdir`, `commands/chmod`,
//! `commands/cat` modules, adapted from the teacher's in-memory `FileSystem`
//! trait to the real filesystem via `tokio::fs`, since drun tasks manipulate
//! the host project tree rather than a sandboxed one.

use crate::ast::{FileOp, FileOpStatement};
use crate::context::ExecutionContext;
use crate::errors::{FileOperationError, InterpreterError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;

pub async fn execute(stmt: &FileOpStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let path = interpolate_strict(&stmt.path, ctx)?;
    let to = match &stmt.to {
        Some(t) => Some(interpolate_strict(t, ctx)?),
        None => None,
    };
    let content = match &stmt.content {
        Some(c) => Some(interpolate_strict(c, ctx)?),
        None => None,
    };

    if ctx.dry_run {
        services.emit(format!("[DRY RUN] {:?} {}{}", stmt.op, path, to.as_deref().map(|t| format!(" -> {}", t)).unwrap_or_default()));
        if matches!(stmt.op, FileOp::Read) {
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), String::new());
            }
        }
        if matches!(stmt.op, FileOp::Exists) {
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), "false".to_string());
            }
        }
        return Ok(());
    }

    match stmt.op {
        FileOp::Copy => {
            let to = to.clone().ok_or_else(|| FileOperationError::new("copy requires a destination"))?;
            copy_recursive(&path, &to, stmt.recursive).await.map_err(|e| FileOperationError::new(format!("copy '{}' to '{}' failed: {}", path, to, e)))?;
            services.emit(format!("📄  copied {} -> {}", path, to));
        }
        FileOp::Move => {
            let to = to.clone().ok_or_else(|| FileOperationError::new("move requires a destination"))?;
            tokio::fs::rename(&path, &to).await.map_err(|e| FileOperationError::new(format!("move '{}' to '{}' failed: {}", path, to, e)))?;
            services.emit(format!("📄  moved {} -> {}", path, to));
        }
        FileOp::Remove => {
            let meta = tokio::fs::metadata(&path).await;
            match meta {
                Ok(m) if m.is_dir() => {
                    if stmt.recursive {
                        tokio::fs::remove_dir_all(&path).await
                    } else {
                        tokio::fs::remove_dir(&path).await
                    }
                    .map_err(|e| FileOperationError::new(format!("remove '{}' failed: {}", path, e)))?;
                }
                Ok(_) => {
                    tokio::fs::remove_file(&path).await.map_err(|e| FileOperationError::new(format!("remove '{}' failed: {}", path, e)))?;
                }
                Err(e) => return Err(FileOperationError::new(format!("remove '{}' failed: {}", path, e)).into()),
            }
            services.emit(format!("📄  removed {}", path));
        }
        FileOp::Mkdir => {
            if stmt.recursive {
                tokio::fs::create_dir_all(&path).await
            } else {
                tokio::fs::create_dir(&path).await
            }
            .map_err(|e| FileOperationError::new(format!("mkdir '{}' failed: {}", path, e)))?;
            services.emit(format!("📄  created directory {}", path));
        }
        FileOp::Read => {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| FileOperationError::new(format!("read '{}' failed: {}", path, e)))?;
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), data);
            }
        }
        FileOp::Write => {
            let data = content.clone().unwrap_or_default();
            tokio::fs::write(&path, &data).await.map_err(|e| FileOperationError::new(format!("write '{}' failed: {}", path, e)))?;
            services.emit(format!("📄  wrote {}", path));
        }
        FileOp::Append => {
            use tokio::io::AsyncWriteExt;
            let data = content.clone().unwrap_or_default();
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .await
                .map_err(|e| FileOperationError::new(format!("append '{}' failed: {}", path, e)))?;
            file.write_all(data.as_bytes()).await.map_err(|e| FileOperationError::new(format!("append '{}' failed: {}", path, e)))?;
        }
        FileOp::Chmod => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode_str = stmt.mode.as_deref().unwrap_or("644");
                let mode = u32::from_str_radix(mode_str, 8)
                    .map_err(|_| FileOperationError::new(format!("invalid mode '{}'", mode_str)))?;
                let perms = std::fs::Permissions::from_mode(mode);
                tokio::fs::set_permissions(&path, perms).await.map_err(|e| FileOperationError::new(format!("chmod '{}' failed: {}", path, e)))?;
            }
            #[cfg(not(unix))]
            {
                let _ = &stmt.mode;
            }
            services.emit(format!("📄  chmod {} {}", stmt.mode.as_deref().unwrap_or(""), path));
        }
        FileOp::Exists => {
            let exists = tokio::fs::metadata(&path).await.is_ok();
            if let Some(var) = &stmt.capture {
                ctx.variables.insert(var.clone(), exists.to_string());
            }
        }
    }

    Ok(())
}

async fn copy_recursive(from: &str, to: &str, recursive: bool) -> std::io::Result<()> {
    let meta = tokio::fs::metadata(from).await?;
    if meta.is_dir() {
        if !recursive {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "source is a directory; use recursive copy"));
        }
        tokio::fs::create_dir_all(to).await?;
        let mut entries = tokio::fs::read_dir(from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let src = entry.path();
            let dst = std::path::Path::new(to).join(&name);
            Box::pin(copy_recursive(&src.display().to_string(), &dst.display().to_string(), recursive)).await?;
        }
        Ok(())
    } else {
        tokio::fs::copy(from, to).await.map(|_| ())
    }
}
