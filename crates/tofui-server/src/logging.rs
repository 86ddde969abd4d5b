use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Keeps the log file alive and flushes it when dropped.
pub struct LogGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = lock(file).flush();
        }
    }
}

struct MultiWriter {
    stdout: Option<io::Stdout>,
    file: Option<Arc<Mutex<File>>>,
}

impl MultiWriter {
    fn new(file: Option<Arc<Mutex<File>>>, to_stdout: bool) -> Self {
        Self {
            stdout: to_stdout.then(io::stdout),
            file,
        }
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(stdout) = &mut self.stdout {
            let _ = stdout.write_all(buf);
        }
        if let Some(file) = &self.file {
            let _ = lock(file).write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(stdout) = &mut self.stdout {
            let _ = stdout.flush();
        }
        if let Some(file) = &self.file {
            let _ = lock(file).flush();
        }
        Ok(())
    }
}

fn lock(file: &Mutex<File>) -> MutexGuard<'_, File> {
    file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level;
/// stdout is only written when `to_stdout` is set so a local session never
/// draws log lines over its own terminal.
pub fn init_logging(config: &Config, debug: bool, to_stdout: bool) -> Option<LogGuard> {
    let level = if debug {
        "debug".to_string()
    } else {
        config.log.level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let guard = match open_log_file(&config.log_path()) {
        Ok(guard) => guard,
        Err(err) => {
            if to_stdout {
                eprintln!("log_file_error: {err}");
            }
            LogGuard { file: None }
        }
    };
    let file = guard.file.clone();
    let make_writer = BoxMakeWriter::new(move || MultiWriter::new(file.clone(), to_stdout));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_ansi(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

fn open_log_file(path: &Path) -> io::Result<LogGuard> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}
