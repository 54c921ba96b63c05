//! Terminal output: prefixed log lines, the dev server status block, and the
//! build progress line.
//!
//! ```ignore
//! log!("build"; "crawling {} entries", count);
//! debug!("watch"; "modified {}", path.display());
//!
//! let progress = ProgressLine::new(&[("pages", 12), ("data", 3)]);
//! progress.inc("pages");
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::{Duration, SystemTime},
};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Lines held by an active [`ProgressLine`]; log lines are printed above it.
static PINNED_LINES: AtomicUsize = AtomicUsize::new(0);

/// Set by `--verbose`.
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macros
// ============================================================================

/// Print `[module] message`.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like [`log!`], but only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Print one prefixed line, keeping an active progress line at the bottom.
#[allow(clippy::cast_possible_truncation)]
pub fn log(module: &str, message: &str) {
    let prefix = prefix(module);
    let pinned = PINNED_LINES.load(Ordering::SeqCst);
    let mut out = stdout().lock();

    if pinned > 0 {
        execute!(out, cursor::MoveUp(pinned as u16), Clear(ClearType::FromCursorDown)).ok();
    } else {
        execute!(out, Clear(ClearType::UntilNewLine)).ok();
    }
    writeln!(out, "{prefix} {message}").ok();
    for _ in 0..pinned {
        writeln!(out).ok();
    }
    out.flush().ok();
}

/// `[module]`, colored by the part of vessel it comes from.
fn prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" | "hmr" => prefix.bright_blue().bold().to_string(),
        "watch" | "routes" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warn" => prefix.yellow().bold().to_string(),
        "vercel" | "static" => prefix.bright_magenta().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

/// `1.24s` or `340ms`.
pub fn format_duration(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

// ============================================================================
// Watch Status
// ============================================================================

/// UTC wall clock as `HH:MM:SS`.
fn clock() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("{:02}:{:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60, secs % 60)
}

/// Status block the dev server rewrites after each batch of file changes,
/// so a long session does not scroll away.
pub struct WatchStatus {
    /// Height of the block printed last.
    height: usize,
}

static WATCH_STATUS: Mutex<WatchStatus> = parking_lot::const_mutex(WatchStatus::new());

impl WatchStatus {
    pub const fn new() -> Self {
        Self { height: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.show(&"✓".green().to_string(), message);
    }

    /// `summary`, with `detail` on the following lines when non-empty.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        self.show(&"✗".red().to_string(), &message);
    }

    pub fn warning(&mut self, message: &str) {
        self.show(&"⚠".yellow().to_string(), message);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn show(&mut self, symbol: &str, message: &str) {
        let mut out = stdout().lock();
        if self.height > 0 {
            execute!(
                out,
                cursor::MoveUp(self.height as u16),
                Clear(ClearType::FromCursorDown)
            )
            .ok();
        }

        let time = format!("[{}]", clock()).dimmed().to_string();
        writeln!(out, "{time} {symbol} {message}").ok();
        out.flush().ok();
        self.height = message.lines().count().max(1);
    }
}

impl Default for WatchStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn status_success(message: &str) {
    WATCH_STATUS.lock().success(message);
}

pub fn status_error(summary: &str, detail: &str) {
    WATCH_STATUS.lock().error(summary, detail);
}

pub fn status_warning(message: &str) {
    WATCH_STATUS.lock().warning(message);
}

// ============================================================================
// Progress Line
// ============================================================================

/// One line of counters updated in place: `[build] pages(42/69) data(5/10)`.
///
/// Workers call [`inc`](Self::inc) from any thread; a redraw is skipped
/// when another thread is already drawing.
pub struct ProgressLine {
    counters: Vec<Counter>,
    drawing: Mutex<()>,
}

struct Counter {
    name: &'static str,
    total: usize,
    done: AtomicUsize,
}

impl ProgressLine {
    /// Counters with a zero total are left out.
    pub fn new(items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .filter(|(_, total)| *total > 0)
            .map(|&(name, total)| Counter {
                name,
                total,
                done: AtomicUsize::new(0),
            })
            .collect();

        PINNED_LINES.store(1, Ordering::SeqCst);
        let progress = Self {
            counters,
            drawing: Mutex::new(()),
        };
        progress.draw(false);
        progress
    }

    pub fn inc(&self, name: &str) {
        let Some(counter) = self.counters.iter().find(|c| c.name == name) else {
            return;
        };
        counter.done.fetch_add(1, Ordering::Relaxed);
        if let Some(_guard) = self.drawing.try_lock() {
            self.draw(false);
        }
    }

    fn summary(&self) -> String {
        self.counters
            .iter()
            .map(|c| format!("{}({}/{})", c.name, c.done.load(Ordering::Relaxed), c.total))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn draw(&self, keep: bool) {
        let mut out = stdout().lock();
        execute!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        let line = format!("{} {}", prefix("build"), self.summary());
        if keep {
            writeln!(out, "{line}").ok();
        } else {
            write!(out, "{line}").ok();
        }
        out.flush().ok();
    }

    /// Leave the final counts on screen.
    pub fn finish(self) {
        PINNED_LINES.store(0, Ordering::SeqCst);
        {
            let _guard = self.drawing.lock();
            self.draw(true);
        }
        std::mem::forget(self);
    }
}

impl Drop for ProgressLine {
    /// Dropped without [`finish`](Self::finish): wipe the line.
    fn drop(&mut self) {
        PINNED_LINES.store(0, Ordering::SeqCst);
        let mut out = stdout().lock();
        execute!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        out.flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(340)), "340ms");
        assert_eq!(format_duration(Duration::from_millis(1240)), "1.24s");
    }

    #[test]
    fn test_prefix_keeps_module_name() {
        for module in ["serve", "build", "error", "Vercel"] {
            assert!(prefix(module).contains(&format!("[{module}]")));
        }
    }

    #[test]
    fn test_watch_status_height() {
        let mut status = WatchStatus::new();
        status.error("invalid route", "unknown matcher `int`\nin /[id=int]");
        assert_eq!(status.height, 3);
        status.success("1 route updated");
        assert_eq!(status.height, 1);
    }

    #[test]
    fn test_progress_counts() {
        let progress = ProgressLine::new(&[("pages", 2), ("empty", 0)]);
        assert_eq!(progress.counters.len(), 1);
        progress.inc("pages");
        progress.inc("unknown");
        assert_eq!(progress.counters[0].done.load(Ordering::Relaxed), 1);
        assert_eq!(progress.summary(), "pages(1/2)");
        progress.finish();
    }
}
