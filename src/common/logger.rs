//! Structured logging with box-drawing output.
//!
//! The macros in this module produce the controller's console output. Blocks
//! open with `log_block_start!`, details hang off them with `log_decorated!`
//! and `log_indented!`, and the semantic macros (`log_info!`, `log_warning!`,
//! `log_error!`, `log_debug!`, `log_critical!`) carry a colored `[LEVEL]` tag.
//!
//! ## Conventions
//!
//! - **`log_block_start!`** starts a new conceptual block (state transition,
//!   schedule resolution, configuration change). Prints `┃` then `┣ message`.
//! - **`log_decorated!`** continues a block: `┣ message`.
//! - **`log_indented!`** nests details under the previous line: `┃   message`.
//! - **`log_pipe!`** inserts an empty `┃` spacer, typically before a semantic
//!   macro that opens its own block.
//! - **`log_version!`** / **`log_end!`** frame the whole run.
//!
//! Logging can be disabled at runtime (command modes and tests print only
//! their JSON result) and routed to a file while `run --log` is active.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// Channel for routing output to file when --log is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Runtime switches for the logging macros.
pub struct Log;

impl Log {
    /// Enable or disable all log output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Show `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix every line with the current UTC wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Start routing log output to `file_path` on a background writer thread.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix used by the macros; empty unless timestamps are on.
    pub fn timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}Z] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Keeps the file logger alive; flushes and joins the writer on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Route one formatted line to the file logger or stdout.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Shared body of every logging macro: `$decorate` receives the timestamp
/// prefix and the rendered message and returns the full output text.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($decorate:expr, $($arg:tt)+) => {{
        use $crate::common::logger::Log;
        if Log::is_enabled() {
            let prefix = Log::timestamp_prefix();
            let message = format!($($arg)+);
            let decorate: fn(&str, &str) -> String = $decorate;
            $crate::common::logger::write_output(&decorate(&prefix, &message));
        }
    }};
}

/// Log a message that continues the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┣ {m}\n"), $($arg)+)
    };
}

/// Log a nested detail line.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┃   {m}\n"), $($arg)+)
    };
}

/// Log an empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::__log_emit!(|p, _m| format!("{p}┃\n"), "")
    };
}

/// Start a new block of related output.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┃\n{p}┣ {m}\n"), $($arg)+)
    };
}

/// Log the startup header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_emit!(
            |p, m| format!("{p}┏ smartflag v{m} ━━╸\n"),
            "{}",
            env!("CARGO_PKG_VERSION")
        )
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::__log_emit!(|p, _m| format!("{p}╹\n"), "")
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┣[\x1b[33mWARNING\x1b[0m] {m}\n"), $($arg)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┣[\x1b[31mERROR\x1b[0m] {m}\n"), $($arg)+)
    };
}

/// Log an error and close the output frame (used right before exiting).
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┃\n{p}┗[\x1b[31mERROR\x1b[0m] {m}\n"), $($arg)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┣[\x1b[32mINFO\x1b[0m] {m}\n"), $($arg)+)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        if $crate::common::logger::Log::is_debug() {
            $crate::__log_emit!(|p, m| format!("{p}┣[\x1b[32mDEBUG\x1b[0m] {m}\n"), $($arg)+)
        }
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p, m| format!("{p}┣[\x1b[31mCRITICAL\x1b[0m] {m}\n"), $($arg)+)
    };
}
