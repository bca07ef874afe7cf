//! HTTP request / download executor (SPEC_FULL §4.17): `http` issues a
//! request and captures status/body; `download` GETs a URL to a path and,
//! for archives, extracts it with `flate2`+`tar`, mirroring the teacher's
//! `commands/tar` and `commands/gzip` (adapted from an in-memory fs to the
//! real one) followed by a `commands/chmod`-style permission pass.

use std::time::Duration;

use crate::ast::{DownloadStatement, HttpStatement};
use crate::context::ExecutionContext;
use crate::errors::{DownloadFailureError, ExtractionFailureError, HttpFailureError, InterpreterError};
use crate::interpolator::interpolate_strict;
use crate::services::Services;
use crate::value::parse_duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub async fn execute(stmt: &HttpStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let url = interpolate_strict(&stmt.url, ctx)?;
    let method: reqwest::Method = stmt.method.to_uppercase().parse().unwrap_or(reqwest::Method::GET);

    let mut headers = Vec::new();
    for (k, v) in &stmt.headers {
        headers.push((k.clone(), interpolate_strict(v, ctx)?));
    }
    let body = stmt.body.as_ref().map(|b| interpolate_strict(b, ctx)).transpose()?;

    let timeout = stmt
        .timeout
        .as_ref()
        .map(|t| interpolate_strict(t, ctx))
        .transpose()?
        .and_then(|t| parse_duration(&t))
        .map(Duration::from_millis)
        .unwrap_or(REQUEST_TIMEOUT);

    if ctx.dry_run {
        services.emit(format!("[DRY RUN] {} {}", stmt.method, url));
        if let Some(var) = &stmt.capture {
            ctx.variables.insert(var.clone(), String::new());
        }
        return Ok(());
    }

    let mut req = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
        .request(method, &url);
    for (k, v) in &headers {
        req = req.header(k, v);
    }
    if let Some(body) = body {
        req = req.body(body);
    }

    let response = req.send().await.map_err(|e| HttpFailureError { url: url.clone(), message: e.to_string() })?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(|e| HttpFailureError { url: url.clone(), message: e.to_string() })?;

    if let Some(var) = &stmt.capture {
        ctx.variables.insert(var.clone(), text);
    }
    ctx.variables.insert("http_status".to_string(), status.to_string());

    if status >= 400 {
        return Err(HttpFailureError { url, message: format!("server responded with status {}", status) }.into());
    }
    Ok(())
}

pub async fn execute_download(stmt: &DownloadStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    let url = interpolate_strict(&stmt.url, ctx)?;
    let to = interpolate_strict(&stmt.to, ctx)?;

    let timeout = stmt
        .timeout
        .as_ref()
        .map(|t| interpolate_strict(t, ctx))
        .transpose()?
        .and_then(|t| parse_duration(&t))
        .map(Duration::from_millis)
        .unwrap_or(REQUEST_TIMEOUT);

    if ctx.dry_run {
        services.emit(format!("[DRY RUN] download {} -> {}", url, to));
        return Ok(());
    }

    let c = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .unwrap_or_else(|_| client());

    let response = c.get(&url).send().await.map_err(|e| DownloadFailureError { url: url.clone(), message: e.to_string() })?;
    if !response.status().is_success() {
        return Err(DownloadFailureError { url, message: format!("server responded with status {}", response.status()) }.into());
    }
    let bytes = response.bytes().await.map_err(|e| DownloadFailureError { url: url.clone(), message: e.to_string() })?;

    let should_extract = stmt.extract || to.ends_with(".tar.gz") || to.ends_with(".tgz") || to.ends_with(".zip");

    if should_extract {
        extract_archive(&bytes, &to)?;
    } else {
        if let Some(parent) = std::path::Path::new(&to).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadFailureError { url: url.clone(), message: e.to_string() })?;
        }
        tokio::fs::write(&to, &bytes)
            .await
            .map_err(|e| DownloadFailureError { url, message: e.to_string() })?;
    }

    Ok(())
}

fn extract_archive(bytes: &[u8], dest: &str) -> Result<(), InterpreterError> {
    std::fs::create_dir_all(dest).map_err(|e| ExtractionFailureError { path: dest.to_string(), message: e.to_string() })?;

    if dest.ends_with(".zip") {
        // spec only requires tar.gz in practice for drun's own release
        // artifacts; zip archives are rejected explicitly rather than
        // silently mishandled.
        return Err(ExtractionFailureError { path: dest.to_string(), message: "zip extraction is not supported".into() }.into());
    }

    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .map_err(|e| ExtractionFailureError { path: dest.to_string(), message: e.to_string() })?;

    #[cfg(unix)]
    apply_executable_bits(dest);

    Ok(())
}

#[cfg(unix)]
fn apply_executable_bits(dest: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(entries) = std::fs::read_dir(dest) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                if meta.is_file() {
                    let mut perms = meta.permissions();
                    perms.set_mode(perms.mode() | 0o100);
                    let _ = std::fs::set_permissions(entry.path(), perms);
                }
            }
        }
    }
}
