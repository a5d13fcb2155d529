// Low-latency logger
//
// Logging must never stall the matching thread. The hot path only stamps a
// timestamp and pushes a small entry onto an SPSC ring; string formatting and
// the actual write happen on a background thread. Static messages with a
// deferred numeric value cover almost every call site without allocating.

use crate::lf_queue::LFQueue;
use crate::time::{now_nanos, Nanos};

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Capacity of the log hand-off ring. Entries are dropped, not blocked on,
/// when the writer falls this far behind.
const LOG_QUEUE_CAPACITY: usize = 4096;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log message payloads. Formatting of the numeric variants is deferred to
/// the background thread; `Formatted` is the slow path for rare cases.
pub enum LogMessage {
    Static(&'static str),
    StaticWithI64(&'static str, i64),
    StaticWithU64(&'static str, u64),
    StaticWithF64(&'static str, f64),
    Formatted(String),
}

impl LogMessage {
    #[inline]
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            LogMessage::Static(s) => write!(writer, "{}", s),
            LogMessage::StaticWithI64(s, v) => write!(writer, "{}: {}", s, v),
            LogMessage::StaticWithU64(s, v) => write!(writer, "{}: {}", s, v),
            LogMessage::StaticWithF64(s, v) => write!(writer, "{}: {:.6}", s, v),
            LogMessage::Formatted(s) => write!(writer, "{}", s),
        }
    }
}

/// A single log entry
pub struct LogEntry {
    pub timestamp: Nanos,
    pub level: LogLevel,
    pub message: LogMessage,
}

struct LoggerShared {
    queue: LFQueue<LogEntry>,
    running: AtomicBool,
    flush_requested: AtomicBool,
    flush_complete: AtomicBool,
}

/// Logger that offloads formatting and I/O to a background thread.
///
/// The hand-off ring is single-producer: at most one thread may log through
/// a given `Logger` at a time. Give each producing thread its own instance
/// (or hand the instance over between phases, as the demo binary does).
///
/// # Example
/// ```ignore
/// let logger = Logger::new();
/// logger.log(LogLevel::Info, "engine started");
/// logger.log_with_u64(LogLevel::Error, "order pool exhausted, ticker", 3);
/// logger.flush();
/// ```
pub struct Logger {
    shared: Arc<LoggerShared>,
    writer_thread: Option<JoinHandle<()>>,
    min_level: LogLevel,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_level(LogLevel::Debug)
    }

    /// Creates a logger that records entries at or above `min_level`.
    pub fn with_level(min_level: LogLevel) -> Self {
        let shared = Arc::new(LoggerShared {
            queue: LFQueue::new(LOG_QUEUE_CAPACITY),
            running: AtomicBool::new(true),
            flush_requested: AtomicBool::new(false),
            flush_complete: AtomicBool::new(false),
        });

        let shared_clone = Arc::clone(&shared);
        let writer_thread = thread::spawn(move || {
            Self::writer_loop(shared_clone);
        });

        Self {
            shared,
            writer_thread: Some(writer_thread),
            min_level,
        }
    }

    fn writer_loop(shared: Arc<LoggerShared>) {
        let mut stderr = std::io::stderr().lock();
        let mut idle_count = 0u32;

        while shared.running.load(Ordering::Relaxed) {
            let mut processed = 0;

            while let Some(entry) = shared.queue.pop() {
                Self::write_entry(&mut stderr, &entry);
                processed += 1;
            }

            // A flush only completes once the ring has drained, so entries
            // enqueued before the request are on disk when it returns.
            if shared.queue.is_empty() && shared.flush_requested.swap(false, Ordering::AcqRel) {
                let _ = stderr.flush();
                shared.flush_complete.store(true, Ordering::Release);
            }

            if processed > 0 {
                idle_count = 0;
            } else {
                idle_count = idle_count.saturating_add(1);
                // Spin briefly, then yield, then sleep. Keeps the writer
                // responsive without burning a core when quiet.
                if idle_count < 100 {
                    std::hint::spin_loop();
                } else if idle_count < 1100 {
                    thread::yield_now();
                } else {
                    thread::sleep(std::time::Duration::from_micros(100));
                }
            }
        }

        while let Some(entry) = shared.queue.pop() {
            Self::write_entry(&mut stderr, &entry);
        }
        let _ = stderr.flush();
    }

    #[inline]
    fn write_entry<W: Write>(writer: &mut W, entry: &LogEntry) {
        let _ = write!(
            writer,
            "[{:016}] {:5} ",
            entry.timestamp.as_u64(),
            entry.level.as_str()
        );
        let _ = entry.message.write_to(writer);
        let _ = writeln!(writer);
    }

    #[inline]
    fn enqueue(&self, level: LogLevel, message: LogMessage) {
        if level < self.min_level {
            return;
        }
        let entry = LogEntry {
            timestamp: now_nanos(),
            level,
            message,
        };
        // A full ring drops the entry instead of blocking the caller.
        let _ = self.shared.queue.push(entry);
    }

    /// Log a static message. Fastest path: no allocation, no formatting.
    #[inline]
    pub fn log(&self, level: LogLevel, msg: &'static str) {
        self.enqueue(level, LogMessage::Static(msg));
    }

    #[inline]
    pub fn log_with_i64(&self, level: LogLevel, msg: &'static str, value: i64) {
        self.enqueue(level, LogMessage::StaticWithI64(msg, value));
    }

    #[inline]
    pub fn log_with_u64(&self, level: LogLevel, msg: &'static str, value: u64) {
        self.enqueue(level, LogMessage::StaticWithU64(msg, value));
    }

    #[inline]
    pub fn log_with_f64(&self, level: LogLevel, msg: &'static str, value: f64) {
        self.enqueue(level, LogMessage::StaticWithF64(msg, value));
    }

    /// Log a pre-formatted message. Allocates on the caller's thread; keep
    /// off the hot path.
    #[inline]
    pub fn log_formatted(&self, level: LogLevel, msg: String) {
        self.enqueue(level, LogMessage::Formatted(msg));
    }

    /// Blocks until every queued entry has been written.
    pub fn flush(&self) {
        self.shared.flush_complete.store(false, Ordering::Release);
        self.shared.flush_requested.store(true, Ordering::Release);
        while !self.shared.flush_complete.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    #[inline]
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.min_level
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}
