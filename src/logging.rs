//! Diagnostic and operator output.
//!
//! Diagnostics go through the `log` facade. The binary initialises
//! `env_logger` with [`init`]; library code never writes to stderr directly
//! except through an [`OperatorSink`] or an error record echoed by the
//! logger.

use std::fs;
use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Logger, Target};
use log::{LevelFilter, Log, Metadata, Record};

/// Destination for lines meant for the person running apt.
///
/// apt passes the method's stderr straight through to the terminal, so a
/// line written here shows up next to apt's own `Get:`/`Hit:` output.
pub trait OperatorSink: Send + Sync {
    fn line(&self, text: &str);
}

/// Operator sink writing to the process stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl OperatorSink for StderrSink {
    fn line(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", text);
        let _ = stderr.flush();
    }
}

/// Where [`init`] ended up sending log records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Everything to the file, `info` and above echoed to stderr.
    File(std::path::PathBuf),
    Stderr,
}

/// Install the global logger.
///
/// With a log file that can be opened for appending, every record goes there
/// at `debug` and records at `info` or above are also echoed to stderr, so
/// interception failures stay visible in apt's terminal output. Otherwise
/// records go to stderr at `warn`. `RUST_LOG` overrides the file (or sole
/// stderr) level. Calling this twice is harmless; the second call keeps the
/// first logger.
pub fn init(log_file: Option<&Path>) -> LogDestination {
    let file = log_file.and_then(|path| match open_append(path) {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("tlog: cannot open log file {}: {}", path.display(), e);
            None
        }
    });

    let destination = match file {
        Some((path, file)) => {
            let tee = TeeLogger::new(file, Target::Stderr);
            let max_level = tee.max_level();
            if log::set_boxed_logger(Box::new(tee)).is_ok() {
                log::set_max_level(max_level);
            }
            LogDestination::File(path.to_path_buf())
        }
        None => {
            let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
            builder.target(Target::Stderr);
            let _ = builder.try_init();
            LogDestination::Stderr
        }
    };

    log::debug!(
        target: "apt_tlog::logging",
        "Logging initialised ({:?})",
        destination
    );
    destination
}

/// Logger writing to the log file and echoing operator-relevant records.
struct TeeLogger {
    file: Logger,
    echo: Logger,
}

impl TeeLogger {
    fn new(file: fs::File, echo: Target) -> Self {
        let file = Builder::from_env(Env::default().default_filter_or("debug"))
            .target(Target::Pipe(Box::new(file)))
            .build();
        let echo = Builder::new()
            .filter_level(LevelFilter::Info)
            .target(echo)
            .build();
        Self { file, echo }
    }

    fn max_level(&self) -> LevelFilter {
        self.file.filter().max(self.echo.filter())
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.file.enabled(metadata) || self.echo.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        self.file.log(record);
        self.echo.log(record);
    }

    fn flush(&self) {
        self.file.flush();
        self.echo.flush();
    }
}

fn open_append(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopenable_log_file_falls_back_to_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("no-such-dir").join("tlog.log");
        assert_eq!(init(Some(&missing)), LogDestination::Stderr);
    }

    #[test]
    fn open_append_creates_and_appends() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tlog.log");

        writeln!(open_append(&path).unwrap(), "one").unwrap();
        writeln!(open_append(&path).unwrap(), "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn tee_keeps_everything_in_the_file_and_echoes_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let file_path = dir.path().join("tlog.log");
        let echo_path = dir.path().join("stderr.log");
        let tee = TeeLogger::new(
            open_append(&file_path).unwrap(),
            Target::Pipe(Box::new(open_append(&echo_path).unwrap())),
        );

        tee.log(
            &Record::builder()
                .level(log::Level::Debug)
                .target("apt_tlog::dispatch")
                .args(format_args!("https sent message"))
                .build(),
        );
        tee.log(
            &Record::builder()
                .level(log::Level::Error)
                .target("apt_tlog::intercept")
                .args(format_args!("Verification of tlog://x/dists/y/InRelease failed"))
                .build(),
        );
        tee.flush();

        let file = fs::read_to_string(&file_path).unwrap();
        assert!(file.contains("https sent message"), "file: {}", file);
        assert!(file.contains("Verification of"), "file: {}", file);

        let echo = fs::read_to_string(&echo_path).unwrap();
        assert!(!echo.contains("https sent message"), "echo: {}", echo);
        assert!(echo.contains("Verification of"), "echo: {}", echo);
    }
}
