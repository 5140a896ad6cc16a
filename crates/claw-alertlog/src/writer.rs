//! File writer with monthly rotation and count-based retention.
//!
//! This module provides:
//! - [`RotatingWriter`]: Append-only writer over the current period file
//! - Banner emission on every (re)open of a period file
//! - Retention by file count, oldest modification time evicted first

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{is_rotation_file, ConfigProvider};
use crate::error::Result;
use crate::types::format_timestamp;

/// Width of the separator rule preceding each banner.
pub const SEPARATOR_WIDTH: usize = 50;

/// Internal state for the active file.
#[derive(Debug, Default)]
struct RotationState {
    /// Path of the file lines are currently appended to.
    active_path: Option<PathBuf>,
    /// Period file name the active path was opened for.
    period_key: Option<String>,
}

impl RotationState {
    const fn initialized(&self) -> bool {
        self.active_path.is_some()
    }
}

/// Append-only writer for period files.
///
/// Every call to [`append_with`](Self::append_with) reads the clock, renders
/// the line, runs the rotation check, and writes, all under one lock. A line
/// therefore always lands in the file for the period of its own timestamp,
/// after that file's banner, and lines within a file never go back in time.
pub struct RotatingWriter {
    config: Arc<ConfigProvider>,
    clock: Arc<dyn Clock>,
    state: Mutex<RotationState>,
}

impl RotatingWriter {
    /// Creates a writer. Nothing touches the filesystem until the first
    /// [`ensure_ready`](Self::ensure_ready) or [`append`](Self::append).
    #[must_use]
    pub fn new(config: Arc<ConfigProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(RotationState::default()),
        }
    }

    /// Makes sure the file for the current period is open.
    ///
    /// Creates the target directory if needed. When the file changes (first
    /// call, new period, or new target directory) a banner is written and
    /// retention runs. Calling it again within the same period is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the banner
    /// cannot be written.
    pub fn ensure_ready(&self) -> Result<()> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.ensure_ready_locked(&mut state, &now)
    }

    /// Appends `line` plus a newline to the current period file.
    ///
    /// The write is flushed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the rotation check or the write fails.
    pub fn append(&self, line: &str) -> Result<()> {
        self.append_with(|_| line.to_owned())
    }

    /// Reads the clock once, renders a line for that instant with `render`,
    /// and appends it to the file for that instant's period.
    ///
    /// `render` is always called, even when the write then fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the rotation check or the write fails.
    pub fn append_with<F>(&self, render: F) -> Result<()>
    where
        F: FnOnce(&DateTime<Local>) -> String,
    {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let line = render(&now);
        self.ensure_ready_locked(&mut state, &now)?;

        if let Some(ref path) = state.active_path {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Removes the oldest period files beyond the retention limit.
    ///
    /// Files are ranked by modification time, newest first. Each removal is
    /// attempted on its own; failures are logged and skipped. The active file
    /// is never removed, so a limit of zero keeps only the active file.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory cannot be listed.
    pub fn enforce_retention(&self) -> Result<usize> {
        let state = self.state.lock();
        self.enforce_retention_locked(&state)
    }

    /// Returns true once a period file has been opened.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized()
    }

    /// Returns the path lines are currently appended to.
    #[must_use]
    pub fn active_file(&self) -> Option<PathBuf> {
        self.state.lock().active_path.clone()
    }

    // ========== Internal Methods ==========

    fn ensure_ready_locked(&self, state: &mut RotationState, now: &DateTime<Local>) -> Result<()> {
        let dir = self.config.target_directory();
        let filename = self.config.current_period_filename(now);
        let path = dir.join(&filename);

        fs::create_dir_all(&dir)?;

        if state.active_path.as_ref() == Some(&path) {
            return Ok(());
        }

        let client = self.config.client_identity();
        let banner = format!(
            "\n{}\n[{client}] [{}] Logger successfully initialized.\n",
            "=".repeat(SEPARATOR_WIDTH),
            format_timestamp(now)
        );
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(banner.as_bytes())?;
        writer.flush()?;

        match state.period_key.replace(filename) {
            Some(previous) => info!(
                from = %previous,
                to = %path.display(),
                "rotated log file"
            ),
            None => info!(path = %path.display(), "opened log file"),
        }
        state.active_path = Some(path);

        if let Err(err) = self.enforce_retention_locked(state) {
            warn!(dir = %dir.display(), error = %err, "retention check failed");
        }
        Ok(())
    }

    fn enforce_retention_locked(&self, state: &RotationState) -> Result<usize> {
        let limit = self.config.retention_limit();
        let dir = self.config.target_directory();
        let mut files = list_rotation_files(&dir)?;
        if files.len() <= limit {
            return Ok(0);
        }

        // Newest first; ties broken by name so the order is stable.
        files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        let mut removed = 0;
        for (path, _) in files.iter().skip(limit) {
            if state.active_path.as_deref() == Some(path.as_path()) {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed expired log file");
                    removed += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove log file");
                }
            }
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingWriter")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Lists period files in `dir` with their modification times.
fn list_rotation_files(dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        let matches = path
            .file_name()
            .is_some_and(|n| is_rotation_file(&n.to_string_lossy()));
        if !matches || !path.is_file() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((path, modified));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LoggerConfig;
    use chrono::{DateTime, Local, NaiveDate, TimeZone};
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(h, min, s))
            .expect("valid date");
        Local
            .from_local_datetime(&naive)
            .earliest()
            .expect("representable local time")
    }

    fn make_writer(dir: &TempDir, limit: usize) -> (RotatingWriter, ManualClock) {
        let clock = ManualClock::new(local(2025, 6, 23, 14, 30, 15));
        let config = LoggerConfig::new("Acme")
            .with_target_dir(dir.path())
            .with_retention_limit(limit);
        let writer = RotatingWriter::new(
            Arc::new(ConfigProvider::new(config)),
            Arc::new(clock.clone()),
        );
        (writer, clock)
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).expect("read log file")
    }

    fn touch_with_age(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).expect("create file");
        file.set_modified(SystemTime::now() - age)
            .expect("set mtime");
        path
    }

    #[test]
    fn writer_creates_nested_directory() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let nested = temp_dir.path().join("a/b/c");
        let clock = ManualClock::new(local(2025, 6, 23, 0, 0, 0));
        let config = LoggerConfig::new("Acme").with_target_dir(&nested);
        let writer = RotatingWriter::new(Arc::new(ConfigProvider::new(config)), Arc::new(clock));

        assert!(writer.ensure_ready().is_ok());
        assert!(nested.join("log-2025-Jun.txt").exists());
    }

    #[test]
    fn writer_derives_directory_from_client() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let clock = ManualClock::new(local(2025, 6, 23, 0, 0, 0));
        let config = LoggerConfig::new("Acme").with_base_dir(temp_dir.path());
        let writer = RotatingWriter::new(Arc::new(ConfigProvider::new(config)), Arc::new(clock));

        assert!(writer.append("hello").is_ok());
        assert_eq!(
            writer.active_file(),
            Some(temp_dir.path().join("Acme").join("log-2025-Jun.txt"))
        );
    }

    #[test]
    fn banner_precedes_first_line() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 30);

        assert!(!writer.is_initialized());
        assert!(writer.append("first").is_ok());
        assert!(writer.is_initialized());

        let content = read(&temp_dir.path().join("log-2025-Jun.txt"));
        let expected = format!(
            "\n{}\n[Acme] [23/06/2025 14:30:15] Logger successfully initialized.\nfirst\n",
            "=".repeat(50)
        );
        assert_eq!(content, expected);
    }

    #[test]
    fn ensure_ready_is_idempotent() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 30);

        for _ in 0..3 {
            assert!(writer.ensure_ready().is_ok());
        }
        let _ = writer.append("line");

        let content = read(&temp_dir.path().join("log-2025-Jun.txt"));
        assert_eq!(content.matches("Logger successfully initialized.").count(), 1);
    }

    #[test]
    fn lines_keep_call_order() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 30);

        for i in 0..50 {
            assert!(writer.append(&format!("line {i}")).is_ok());
        }

        let content = read(&temp_dir.path().join("log-2025-Jun.txt"));
        let lines: Vec<&str> = content.lines().filter(|l| l.starts_with("line ")).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn rotates_on_month_boundary() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, clock) = make_writer(&temp_dir, 30);

        clock.set(local(2025, 6, 30, 23, 59, 59));
        assert!(writer.append("june").is_ok());
        let june = temp_dir.path().join("log-2025-Jun.txt");
        let june_before = read(&june);

        clock.set(local(2025, 7, 1, 0, 0, 1));
        assert!(writer.append("july").is_ok());
        let july = temp_dir.path().join("log-2025-Jul.txt");

        assert_eq!(writer.active_file(), Some(july.clone()));
        assert_eq!(read(&june), june_before);

        let content = read(&july);
        assert_eq!(content.matches("Logger successfully initialized.").count(), 1);
        let banner_at = content.find("Logger successfully initialized.");
        let line_at = content.find("july");
        assert!(banner_at < line_at);
        assert!(!content.contains("june"));
    }

    /// Clock that moves forward one second on every read.
    struct TickingClock {
        next: Mutex<DateTime<Local>>,
    }

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Local> {
            let mut next = self.next.lock();
            let now = *next;
            *next = now + chrono::TimeDelta::seconds(1);
            now
        }
    }

    #[test]
    fn line_period_matches_its_own_timestamp() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let clock = TickingClock {
            next: Mutex::new(local(2025, 6, 30, 23, 59, 58)),
        };
        let config = LoggerConfig::new("Acme").with_target_dir(temp_dir.path());
        let writer = RotatingWriter::new(Arc::new(ConfigProvider::new(config)), Arc::new(clock));

        for _ in 0..3 {
            let written = writer.append_with(|now| format!("[{}] line", format_timestamp(now)));
            assert!(written.is_ok());
        }

        let june = read(&temp_dir.path().join("log-2025-Jun.txt"));
        let july = read(&temp_dir.path().join("log-2025-Jul.txt"));
        assert!(june.contains("[30/06/2025 23:59:58] Logger successfully initialized."));
        assert!(june.contains("[30/06/2025 23:59:58] line"));
        assert!(june.contains("[30/06/2025 23:59:59] line"));
        assert!(!june.contains("01/07/2025"));
        assert!(july.contains("[01/07/2025 00:00:00] Logger successfully initialized."));
        assert!(july.contains("[01/07/2025 00:00:00] line"));
        assert!(!july.contains("30/06/2025"));
    }

    #[test]
    fn no_rotation_within_month() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, clock) = make_writer(&temp_dir, 30);

        let _ = writer.append("start");
        clock.advance(Duration::from_secs(3 * 24 * 3600));
        let _ = writer.append("later");

        let files = list_rotation_files(temp_dir.path()).expect("list");
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn changing_client_reopens_with_banner() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let clock = ManualClock::new(local(2025, 6, 23, 0, 0, 0));
        let provider = Arc::new(ConfigProvider::new(
            LoggerConfig::new("Acme").with_base_dir(temp_dir.path()),
        ));
        let writer = RotatingWriter::new(Arc::clone(&provider), Arc::new(clock));

        let _ = writer.append("acme line");
        provider.set_client_identity("Globex");
        let _ = writer.append("globex line");

        let globex = temp_dir.path().join("Globex").join("log-2025-Jun.txt");
        let content = read(&globex);
        assert!(content.contains("[Globex]"));
        assert!(content.contains("globex line"));
        assert!(!content.contains("acme line"));
    }

    #[test]
    fn retention_removes_oldest() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 3);

        let names = [
            "log-2025-Jan.txt",
            "log-2025-Feb.txt",
            "log-2025-Mar.txt",
            "log-2025-Apr.txt",
            "log-2025-May.txt",
        ];
        for (i, name) in names.iter().enumerate() {
            // Jan is oldest.
            let age = Duration::from_secs(3600 * (names.len() - i) as u64);
            touch_with_age(temp_dir.path(), name, age);
        }

        let removed = writer.enforce_retention().expect("retention");
        assert_eq!(removed, 2);
        assert!(!temp_dir.path().join("log-2025-Jan.txt").exists());
        assert!(!temp_dir.path().join("log-2025-Feb.txt").exists());
        assert!(temp_dir.path().join("log-2025-Mar.txt").exists());
        assert!(temp_dir.path().join("log-2025-Apr.txt").exists());
        assert!(temp_dir.path().join("log-2025-May.txt").exists());
    }

    #[test]
    fn retention_ignores_foreign_files() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 1);

        touch_with_age(temp_dir.path(), "notes.txt", Duration::from_secs(9000));
        touch_with_age(temp_dir.path(), "log-2025-Jan.txt", Duration::from_secs(7200));
        touch_with_age(temp_dir.path(), "log-2025-Feb.txt", Duration::from_secs(3600));

        assert_eq!(writer.enforce_retention().ok(), Some(1));
        assert!(temp_dir.path().join("notes.txt").exists());
        assert!(temp_dir.path().join("log-2025-Feb.txt").exists());
    }

    #[test]
    fn retention_zero_keeps_only_active() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 0);

        for name in ["log-2025-Jan.txt", "log-2025-Feb.txt", "log-2025-Mar.txt"] {
            touch_with_age(temp_dir.path(), name, Duration::from_secs(60));
        }
        assert!(writer.append("only").is_ok());

        let files = list_rotation_files(temp_dir.path()).expect("list");
        assert_eq!(files.len(), 1);
        assert_eq!(Some(files[0].0.clone()), writer.active_file());
        assert!(read(&temp_dir.path().join("log-2025-Jun.txt")).contains("only"));
    }

    #[test]
    fn retention_runs_on_open_and_keeps_active() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let (writer, _clock) = make_writer(&temp_dir, 2);

        touch_with_age(temp_dir.path(), "log-2025-Mar.txt", Duration::from_secs(7200));
        touch_with_age(temp_dir.path(), "log-2025-Apr.txt", Duration::from_secs(3600));

        assert!(writer.append("now").is_ok());

        assert!(temp_dir.path().join("log-2025-Jun.txt").exists());
        assert!(temp_dir.path().join("log-2025-Apr.txt").exists());
        assert!(!temp_dir.path().join("log-2025-Mar.txt").exists());
    }

    #[test]
    fn retention_missing_directory_is_error() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let missing = temp_dir.path().join("missing");
        let clock = ManualClock::new(local(2025, 6, 23, 0, 0, 0));
        let config = LoggerConfig::new("Acme").with_target_dir(&missing);
        let writer = RotatingWriter::new(Arc::new(ConfigProvider::new(config)), Arc::new(clock));

        assert!(writer.enforce_retention().is_err());
    }

    #[test]
    fn unwritable_target_reports_error() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").expect("write blocker");

        let clock = ManualClock::new(local(2025, 6, 23, 0, 0, 0));
        let config = LoggerConfig::new("Acme").with_target_dir(blocker.join("logs"));
        let writer = RotatingWriter::new(Arc::new(ConfigProvider::new(config)), Arc::new(clock));

        assert!(writer.ensure_ready().is_err());
        assert!(writer.append("lost").is_err());
        assert!(!writer.is_initialized());
    }
}
