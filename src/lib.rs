pub mod agent;
pub mod config;
pub mod enrichment;
pub mod filters;
pub mod inference;
pub mod platform;
pub mod retry;
pub mod server;
pub mod usage;
pub mod wire;

#[cfg(test)]
mod testing;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// `RUST_LOG` fallback.
pub const DEFAULT_LOG_FILTER: &str = "prospect_agent=info,warn";

/// Set to `1` for JSON log lines.
pub const LOG_JSON_ENV: &str = "PROSPECT_AGENT_LOG_JSON";

const LOG_FILE_NAME: &str = "agent.log";
const LOG_KEEP: u32 = 3;

/// Initialize the tracing subscriber.
///
/// With a `log_dir`, logs go to `agent.log` in it:
/// 1. Rotates existing logs (agent.log → agent.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh agent.log with a line-flushing writer.
///
/// Without one, logs go to stdout. Returns the log file path, if any.
pub fn init_tracing(log_dir: Option<&Path>) -> std::io::Result<Option<PathBuf>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_JSON_ENV).is_ok_and(|v| v.trim() == "1");
    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    let Some(dir) = log_dir else {
        if json {
            builder.json().init();
        } else {
            builder.init();
        }
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let log_path = dir.join(LOG_FILE_NAME);
    rotate_log_file(&log_path, LOG_KEEP);

    let log_file = OpenOptions::new().create(true).append(true).open(&log_path)?;
    let builder = builder.with_writer(FlushingWriter::new(log_file)).with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(Some(log_path))
}

/// Rotate log files: `agent.log` → `agent.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps a `File` and flushes after every write, so each log
/// line is on disk immediately.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = f.write(buf)?;
        f.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        f.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
