//! Kernel logging infrastructure.
//!
//! Two kinds of output share one set of sinks:
//!
//! - **Raw prints** ([`kprint!`], [`kprintln!`]) go to every sink without a
//!   level or timestamp. Workload output and the final statistics report use
//!   this path.
//! - **Leveled logs** ([`klog!`] and the [`kfatal!`]..[`kinfo!`] shorthands)
//!   are timestamped and filtered by each sink's maximum level.
//!   [`kdebug!`] is additionally gated by per-subsystem [`DebugFlags`], so a
//!   run can trace, say, interrupts without drowning in context switches.
//!
//! Until [`init_logger`] is called, all output is silently discarded.

use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Log levels (lower = more severe)
// ---------------------------------------------------------------------------

/// Severity of a leveled log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    /// Fatal: the simulated machine is stopping.
    Fatal = 0,
    /// Error: something failed but the machine may continue.
    Error = 1,
    /// Warning: suspicious but harmless, e.g. a displaced joiner.
    Warn = 2,
    /// Informational: boot and workload progress.
    Info = 3,
    /// Debug: per-subsystem tracing, see [`DebugFlags`].
    Debug = 4,
    /// Trace: the most permissive filter a sink can have.
    Trace = 5,
}

impl LogLevel {
    /// Returns the fixed-width tag printed in front of each line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

// ---------------------------------------------------------------------------
// Debug flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Subsystems whose [`kdebug!`] output is enabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DebugFlags: u8 {
        /// Process creation, switching and destruction (`t`).
        const PROCESS = 1 << 0;
        /// Interrupt scheduling and delivery (`i`).
        const INTERRUPT = 1 << 1;
        /// Semaphores and locks (`s`).
        const SYNC = 1 << 2;
        /// System calls (`a`).
        const SYSCALL = 1 << 3;
        /// Machine and execution-unit state (`m`).
        const MACHINE = 1 << 4;
    }
}

impl DebugFlags {
    /// Parses a flag string such as `"ti"`. `+` enables every subsystem.
    /// Unknown letters are ignored.
    pub fn parse(letters: &str) -> Self {
        letters.chars().fold(Self::empty(), |flags, c| {
            flags
                | match c {
                    '+' => Self::all(),
                    't' => Self::PROCESS,
                    'i' => Self::INTERRUPT,
                    's' => Self::SYNC,
                    'a' => Self::SYSCALL,
                    'm' => Self::MACHINE,
                    _ => Self::empty(),
                }
        })
    }
}

static DEBUG_FLAGS: AtomicU8 = AtomicU8::new(0);

/// Replaces the set of enabled debug subsystems.
pub fn set_debug_flags(flags: DebugFlags) {
    DEBUG_FLAGS.store(flags.bits(), Ordering::Relaxed);
}

/// Returns the set of enabled debug subsystems.
pub fn debug_flags() -> DebugFlags {
    DebugFlags::from_bits_truncate(DEBUG_FLAGS.load(Ordering::Relaxed))
}

/// Whether [`kdebug!`] output for `flag` is enabled.
#[inline]
pub fn debug_enabled(flag: DebugFlags) -> bool {
    debug_flags().intersects(flag)
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

/// Implementation detail for [`kprint!`] / [`kprintln!`]. Not public API.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    LOGGER.write_fmt(args);
}

/// Implementation detail for [`klog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    LOGGER.log(level, args);
}

/// Prints to the kernel log sinks (raw, no level, no timestamp).
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => { $crate::log::_print(format_args!($($arg)*)) };
}

/// Prints to the kernel log sinks with a trailing newline (raw, no level).
#[macro_export]
macro_rules! kprintln {
    () => { $crate::kprint!("\n") };
    ($($arg:tt)*) => { $crate::kprint!("{}\n", format_args!($($arg)*)) };
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs a fatal-level message (level 0).
#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Fatal, $($arg)*) };
}

/// Logs an error-level message (level 1).
#[macro_export]
macro_rules! kerr {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message (level 2).
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message (level 3).
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message (level 4) for one subsystem.
///
/// ```ignore
/// kdebug!(PROCESS, "Switching from {} to {}", old.name(), next.name());
/// ```
#[macro_export]
macro_rules! kdebug {
    ($flag:ident, $($arg:tt)*) => {
        if $crate::log::debug_enabled($crate::log::DebugFlags::$flag) {
            $crate::klog!($crate::log::LogLevel::Debug, $($arg)*)
        }
    };
}

// ---------------------------------------------------------------------------
// LogSink trait
// ---------------------------------------------------------------------------

/// Somewhere kernel output ends up.
pub trait LogSink: Send + Sync {
    /// Appends `s` to the sink.
    fn write_str(&self, s: &str);
    /// Least severe level this sink still records.
    fn max_level(&self) -> LogLevel;
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// A [`LogSink`] that writes to the host's standard output.
pub struct StdoutSink {
    max_level: LogLevel,
}

impl StdoutSink {
    /// Creates a new stdout sink.
    pub fn new(max_level: LogLevel) -> Self {
        Self { max_level }
    }
}

impl LogSink for StdoutSink {
    fn write_str(&self, s: &str) {
        let _ = std::io::stdout().lock().write_all(s.as_bytes());
    }

    fn max_level(&self) -> LogLevel {
        self.max_level
    }
}

/// A [`LogSink`] that writes to the host's standard error.
pub struct StderrSink {
    max_level: LogLevel,
}

impl StderrSink {
    /// Creates a new stderr sink.
    pub fn new(max_level: LogLevel) -> Self {
        Self { max_level }
    }
}

impl LogSink for StderrSink {
    fn write_str(&self, s: &str) {
        let _ = std::io::stderr().lock().write_all(s.as_bytes());
    }

    fn max_level(&self) -> LogLevel {
        self.max_level
    }
}

/// A [`LogSink`] that accumulates output in memory.
///
/// Clones share the same buffer, so one clone can be registered with a
/// logger while another is kept to inspect what was written.
#[derive(Clone)]
pub struct BufferSink {
    buf: Arc<Mutex<String>>,
    max_level: LogLevel,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    pub fn new(max_level: LogLevel) -> Self {
        Self {
            buf: Arc::new(Mutex::new(String::new())),
            max_level,
        }
    }

    /// Returns a copy of everything written so far.
    pub fn contents(&self) -> String {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for BufferSink {
    fn write_str(&self, s: &str) {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(s);
    }

    fn max_level(&self) -> LogLevel {
        self.max_level
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Interior data protected by the logger's lock.
struct LoggerInner {
    sinks: Vec<Box<dyn LogSink>>,
}

/// The kernel logger.
///
/// Holds a `Vec<Box<dyn LogSink>>` behind a lock. Output is fanned out to
/// every registered sink. Construct with [`Logger::new`] (const) and store in
/// a `static`, or keep a local one for tests.
pub struct Logger {
    inner: Mutex<Option<LoggerInner>>,
    epoch: OnceLock<Instant>,
}

impl Logger {
    /// Creates a new logger (uninitialized). Writes are silent no-ops until
    /// [`init`](Self::init) is called.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
            epoch: OnceLock::new(),
        }
    }

    /// Installs `sinks`, replacing any previous set.
    pub fn init(&self, sinks: Vec<Box<dyn LogSink>>) {
        self.epoch.get_or_init(Instant::now);
        *self.lock() = Some(LoggerInner { sinks });
    }

    /// Raw write: fans out `args` to **all** sinks with no filtering.
    pub fn write_fmt(&self, args: fmt::Arguments<'_>) {
        let guard = self.lock();
        if let Some(inner) = guard.as_ref() {
            for sink in &inner.sinks {
                let mut w = SinkWriter(sink.as_ref());
                let _ = w.write_fmt(args);
            }
        }
    }

    /// Leveled write: formats a timestamped, level-tagged message and writes
    /// it only to sinks whose `max_level >= level`.
    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        let total_micros = self
            .epoch
            .get()
            .map_or(0, |epoch| epoch.elapsed().as_micros());
        let secs = total_micros / 1_000_000;
        let micros = total_micros % 1_000_000;
        let level_str = level.name();

        let guard = self.lock();
        if let Some(inner) = guard.as_ref() {
            for sink in &inner.sinks {
                if level <= sink.max_level() {
                    let mut w = SinkWriter(sink.as_ref());
                    let _ = writeln!(w, "[{secs:>5}.{micros:06}] {level_str} {args}");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<LoggerInner>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets `write!` target a sink.
struct SinkWriter<'a>(&'a dyn LogSink);

impl fmt::Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Global logger instance and public API
// ---------------------------------------------------------------------------

/// Global logger instance.
pub static LOGGER: Logger = Logger::new();

/// Initializes the global logger with a single sink.
pub fn init_logger(sink: Box<dyn LogSink>) {
    LOGGER.init(vec![sink]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger_with(level: LogLevel) -> (Logger, BufferSink) {
        let sink = BufferSink::new(level);
        let logger = Logger::new();
        logger.init(vec![Box::new(sink.clone())]);
        (logger, sink)
    }

    #[test]
    fn uninitialized_logger_is_silent() {
        let logger = Logger::new();
        logger.log(LogLevel::Fatal, format_args!("lost"));
        logger.write_fmt(format_args!("lost"));
    }

    #[test]
    fn raw_print_is_unfiltered() {
        let (logger, sink) = logger_with(LogLevel::Fatal);
        logger.write_fmt(format_args!("*** thread {} looped {} times\n", 1, 0));
        assert_eq!(sink.contents(), "*** thread 1 looped 0 times\n");
    }

    #[test]
    fn leveled_log_filters_and_tags() {
        let (logger, sink) = logger_with(LogLevel::Info);
        logger.log(LogLevel::Warn, format_args!("displaced waiter"));
        logger.log(LogLevel::Debug, format_args!("hidden"));
        let out = sink.contents();
        assert!(out.contains("WARN  displaced waiter\n"));
        assert!(!out.contains("hidden"));
        assert!(out.starts_with('['));
    }

    #[test]
    fn reinit_replaces_sinks() {
        let (logger, old) = logger_with(LogLevel::Trace);
        let new = BufferSink::new(LogLevel::Trace);
        logger.init(vec![Box::new(new.clone())]);
        logger.write_fmt(format_args!("x"));
        assert_eq!(old.contents(), "");
        assert_eq!(new.contents(), "x");
    }

    #[test]
    fn level_names() {
        assert_eq!(LogLevel::Warn.name(), "WARN ");
        assert_eq!(LogLevel::Trace.name(), "TRACE");
        assert!(LogLevel::Error < LogLevel::Info);
    }

    #[test]
    fn parse_debug_flags() {
        assert_eq!(DebugFlags::parse(""), DebugFlags::empty());
        assert_eq!(
            DebugFlags::parse("ti"),
            DebugFlags::PROCESS | DebugFlags::INTERRUPT
        );
        assert_eq!(DebugFlags::parse("s?a"), DebugFlags::SYNC | DebugFlags::SYSCALL);
        assert_eq!(DebugFlags::parse("m"), DebugFlags::MACHINE);
        assert_eq!(DebugFlags::parse("+"), DebugFlags::all());
    }
}
