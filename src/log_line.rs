use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::String;

use crate::constants::LOG_LINE_MAX;

pub type LogLine = String<LOG_LINE_MAX>;

/// Writer that drops whatever does not fit instead of failing
struct Truncate<'a>(&'a mut LogLine);

impl Write for Truncate<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Formats a record as `LEVEL target: message`, cut at [`LOG_LINE_MAX`] bytes.
pub fn format_line(level: log::Level, target: &str, args: fmt::Arguments) -> LogLine {
    let mut line = LogLine::new();
    let _ = write!(Truncate(&mut line), "{:<5} {}: {}", level, target, args);
    line
}

/// Hands formatted lines to a network sender without ever blocking the logger.
/// Lines offered while the queue is full are dropped and counted.
pub struct Forwarder<M: RawMutex, const N: usize> {
    enabled: AtomicBool,
    dropped: AtomicU32,
    lines: Channel<M, LogLine, N>,
}

impl<M: RawMutex, const N: usize> Forwarder<M, N> {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
            lines: Channel::new(),
        }
    }

    pub fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Returns whether the line was queued
    pub fn offer(&self, line: LogLine) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }
        if self.lines.try_send(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    pub async fn next(&self) -> LogLine {
        self.lines.receive().await
    }

    /// Lines dropped since the last call
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl<M: RawMutex, const N: usize> Default for Forwarder<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use log::Level;

    fn line(text: &str) -> LogLine {
        format_line(Level::Info, "t", format_args!("{}", text))
    }

    #[test]
    fn formats_record() {
        let line = format_line(Level::Info, "mqtt_oled_mon::mqtt", format_args!("connected"));
        assert_eq!(line.as_str(), "INFO  mqtt_oled_mon::mqtt: connected");
    }

    #[test]
    fn formats_arguments() {
        let line = format_line(Level::Warn, "t", format_args!("retry in {}ms", 5000));
        assert_eq!(line.as_str(), "WARN  t: retry in 5000ms");
    }

    #[test]
    fn truncates_long_lines() {
        let long = "x".repeat(LOG_LINE_MAX * 2);
        let line = format_line(Level::Error, "t", format_args!("{}", long));
        assert_eq!(line.len(), LOG_LINE_MAX);
        assert!(line.starts_with("ERROR t: xxx"));
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "é".repeat(LOG_LINE_MAX);
        let line = format_line(Level::Debug, "t", format_args!("{}", long));
        assert!(line.len() <= LOG_LINE_MAX);
        assert!(line.ends_with('é'));
    }

    #[test]
    fn disabled_forwarder_queues_nothing() {
        let forwarder = Forwarder::<NoopRawMutex, 2>::new();
        assert!(!forwarder.offer(line("a")));
        assert_eq!(forwarder.take_dropped(), 0);
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let forwarder = Forwarder::<NoopRawMutex, 2>::new();
        forwarder.enable(true);
        assert!(forwarder.offer(line("a")));
        assert!(forwarder.offer(line("b")));
        assert!(!forwarder.offer(line("c")));
        assert!(!forwarder.offer(line("d")));
        assert_eq!(forwarder.take_dropped(), 2);
        assert_eq!(forwarder.take_dropped(), 0);

        assert_eq!(block_on(forwarder.next()).as_str(), "INFO  t: a");
        assert!(forwarder.offer(line("e")));
        assert_eq!(block_on(forwarder.next()).as_str(), "INFO  t: b");
        assert_eq!(block_on(forwarder.next()).as_str(), "INFO  t: e");
    }
}
