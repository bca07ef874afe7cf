//! Memory supervisor (spec §4.15): an out-of-band watchdog, independent of
//! the execution path, that samples resident allocation every 100ms, warns
//! once past 100MB, and dumps diagnostics + aborts the process past 500MB.
//! Runs as its own `tokio::task` (spec §5: "a single long-running concurrent
//! task orthogonal to execution") so it stays responsive while the engine
//! blocks on shell/HTTP/download I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sysinfo::{Pid, System};
use tokio::sync::watch;
use tokio::time::interval;

use crate::ast::Program;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
const WARN_THRESHOLD_MB: u64 = 100;
const CRASH_THRESHOLD_MB: u64 = 500;

#[derive(Serialize)]
struct MemoryStats {
    alloc_mb: u64,
    total_alloc_mb: u64,
    sys_mb: u64,
    num_gc: u64,
    timestamp: String,
}

#[derive(Serialize)]
struct RuntimeInfo {
    language_version: String,
    concurrency_units: usize,
    cpus: usize,
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct CrashDump<'a> {
    memory_stats: MemoryStats,
    program: &'a Program,
    runtime_info: RuntimeInfo,
}

/// Handle returned by [`start`]. Dropping or calling [`stop`] cancels the
/// supervisor loop; `stop` is idempotent and safe to call on every exit path
/// (spec §3 invariant: "stopped on all exit paths").
pub struct MemorySupervisorHandle {
    cancel: watch::Sender<bool>,
}

impl MemorySupervisorHandle {
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Starts the supervisor exactly once per top-level execution (spec §3).
/// `program` is cloned into an `Arc` so the crash dump can serialize the
/// whole AST without borrowing from the caller's execution state.
pub fn start(program: Arc<Program>, cwd: std::path::PathBuf) -> MemorySupervisorHandle {
    let (tx, mut rx) = watch::channel(false);
    let warned = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        let mut sys = System::new();
        let pid = Pid::from_u32(std::process::id());
        let mut ticker = interval(SAMPLE_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sys.refresh_process(pid);
                    let Some(process) = sys.process(pid) else { continue };
                    let alloc_mb = process.memory() / (1024 * 1024);

                    if alloc_mb >= CRASH_THRESHOLD_MB {
                        tracing::error!(alloc_mb, "memory supervisor: runaway allocation, terminating");
                        write_crash_artifacts(&program, alloc_mb, &sys, &cwd).await;
                        std::process::exit(1);
                    }

                    if alloc_mb >= WARN_THRESHOLD_MB && !warned.swap(true, Ordering::SeqCst) {
                        tracing::warn!(alloc_mb, "memory supervisor: elevated resident allocation");
                    }
                }
                _ = rx.changed() => {
                    if *rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    MemorySupervisorHandle { cancel: tx }
}

async fn write_crash_artifacts(program: &Program, alloc_mb: u64, sys: &System, cwd: &std::path::Path) {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let stamp = format_timestamp(now.as_secs());

    let dump = CrashDump {
        memory_stats: MemoryStats {
            alloc_mb,
            total_alloc_mb: alloc_mb,
            sys_mb: sys.total_memory() / (1024 * 1024),
            num_gc: 0,
            timestamp: stamp.clone(),
        },
        program,
        runtime_info: RuntimeInfo {
            language_version: "rustc (drun)".to_string(),
            concurrency_units: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            cpus: sys.cpus().len(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        },
    };

    let json_path = cwd.join(format!("drun-crash-dump-{}.json", stamp));
    let summary_path = cwd.join(format!("drun-crash-summary-{}.txt", stamp));

    if let Ok(json) = serde_json::to_string_pretty(&dump) {
        let _ = tokio::fs::write(&json_path, json).await;
    }

    let summary = format!(
        "drun crash summary\nalloc_mb: {}\nsee: {}\n",
        alloc_mb,
        json_path.display()
    );
    let _ = tokio::fs::write(&summary_path, summary).await;
}

fn format_timestamp(epoch_secs: u64) -> String {
    let days = epoch_secs / 86_400;
    let secs_of_day = epoch_secs % 86_400;
    let (y, m, d) = civil_from_days(days as i64);
    format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}",
        y,
        m,
        d,
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

/// Howard Hinnant's days-from-civil algorithm, run in reverse: converts a
/// day count since the Unix epoch into (year, month, day). Self-contained so
/// the crash-dump path has no dependency on `chrono`'s timezone database.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}
