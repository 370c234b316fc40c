//! Terminal logging with colored stage prefixes and a single progress line.
//!
//! ```ignore
//! log!("scan"; "{} directories, {} files", dirs, files);
//!
//! let progress = Progress::new("render", pages.len());
//! pages.par_iter().for_each(|_| progress.inc());
//! progress.finish();
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{IsTerminal, Write, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Whether a progress line currently occupies the bottom row
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Serializes writes from worker threads
static OUTPUT_LOCK: Mutex<()> = parking_lot::const_mutex(());

// Progress line format: "[render] [████░░░░] 42/100"
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

/// Get terminal width, falling back to 120 columns.
fn terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Write one prefixed line, clearing the progress line first if one is drawn.
pub fn log(module: &str, message: &str) {
    let _guard = OUTPUT_LOCK.lock();
    let prefix = colorize_prefix(module);
    let mut stdout = stdout().lock();

    if PROGRESS_ACTIVE.load(Ordering::Acquire) {
        write!(stdout, "\r").ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
    }

    let max_len = (terminal_width() as usize).saturating_sub(module.len() + 3);
    let message = if message.contains('\n') {
        message
    } else {
        truncate_str(message, max_len)
    };
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type.
fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "warn" => prefix.bright_yellow().bold(),
        "error" => prefix.bright_red().bold(),
        "cache" => prefix.bright_magenta().bold(),
        "render" => prefix.bright_green().bold(),
        _ => prefix.bright_blue().bold(),
    }
}

/// Truncate a string to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress
// ============================================================================

/// A single progress line redrawn in place, safe to bump from rayon workers.
///
/// Nothing is drawn when stdout is not a terminal or the total is below two.
pub struct Progress {
    prefix: ColoredString,
    prefix_len: usize,
    total: usize,
    current: AtomicUsize,
    visible: bool,
}

impl Progress {
    pub fn new(module: &'static str, total: usize) -> Self {
        let visible = total > 1 && stdout().is_terminal();
        if visible {
            PROGRESS_ACTIVE.store(true, Ordering::Release);
        }
        Self {
            prefix: colorize_prefix(module),
            prefix_len: module.len() + 3,
            total,
            current: AtomicUsize::new(0),
            visible,
        }
    }

    /// Advance by one and redraw.
    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        if self.visible {
            self.draw(current);
        }
    }

    fn draw(&self, current: usize) {
        let _guard = OUTPUT_LOCK.lock();
        let count = format!("{current}/{}", self.total);
        let overhead = self.prefix_len + 4 + count.len();
        let bar_width = (terminal_width() as usize)
            .saturating_sub(overhead)
            .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
        let filled = (current * bar_width) / self.total.max(1);
        let bar = "█".repeat(filled) + &"░".repeat(bar_width.saturating_sub(filled));

        let mut stdout = stdout().lock();
        write!(stdout, "\r").ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        write!(stdout, "{} [{bar}] {count}", self.prefix).ok();
        stdout.flush().ok();
    }

    /// Erase the progress line.
    pub fn finish(&self) {
        if !self.visible {
            return;
        }
        let _guard = OUTPUT_LOCK.lock();
        PROGRESS_ACTIVE.store(false, Ordering::Release);
        let mut stdout = stdout().lock();
        write!(stdout, "\r").ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        stdout.flush().ok();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if PROGRESS_ACTIVE.load(Ordering::Acquire) {
            self.finish();
        }
    }
}
