//! Console log sink adapter.
//!
//! Implements `log::Log` by writing level-tagged lines to stderr, which
//! stands in for the platform's UART log transport. Installed once
//! during bring-up; a hardware build would install its own sink here
//! instead.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Sink writing `[LEVEL] target: message` lines to stderr.
pub struct ConsoleLogSink;

static SINK: ConsoleLogSink = ConsoleLogSink;

impl Log for ConsoleLogSink {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let tag = match record.level() {
            Level::Error => "E",
            Level::Warn => "W",
            Level::Info => "I",
            Level::Debug => "D",
            Level::Trace => "V",
        };
        eprintln!("[{tag}] {}: {}", record.target(), record.args());
    }

    fn flush(&self) {}
}

/// Install the console sink as the process-wide logger.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&SINK)?;
    log::set_max_level(LevelFilter::Debug);
    Ok(())
}
