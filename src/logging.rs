// Logging setup
//
// env_logger on stderr, optionally mirrored into a log file next to the
// executable that is truncated at startup. RUST_LOG still overrides the
// default level.

use crate::config::DebugConfig;
use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Writes every log record to stderr and, when present, to the log file
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Truncate (or create) the log file and write its header
fn open_log_file(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;
    writeln!(file, "=== Vulkan Bootstrap Log ===")?;
    writeln!(file, "Started: {:?}", SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}

/// Where records go. A log file that cannot be opened leaves stderr only;
/// the error comes back so it can be logged once the logger is up.
fn tee_writer(
    config: &DebugConfig,
    exe_dir: Option<&Path>,
) -> (TeeWriter, Option<PathBuf>, Option<anyhow::Error>) {
    if !config.log_to_file {
        return (TeeWriter { file: None }, None, None);
    }

    let path = config.log_path(exe_dir);
    match open_log_file(&path) {
        Ok(file) => (TeeWriter { file: Some(file) }, Some(path), None),
        Err(e) => (TeeWriter { file: None }, None, Some(e)),
    }
}

/// Initialize logging with optional file output. Only a second
/// initialization is an error; a bad log file just falls back to stderr.
pub fn init(config: &DebugConfig) -> Result<()> {
    let (writer, path, file_error) = tee_writer(config, crate::config::executable_dir().as_deref());

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();
    builder.target(Target::Pipe(Box::new(writer)));
    builder.try_init().context("Logger already initialized")?;

    if let Some(e) = file_error {
        log::warn!("{:#}. Logging to stderr only.", e);
    }
    if let Some(path) = path {
        log::info!("Logging to {}", path.display());
    }

    Ok(())
}
