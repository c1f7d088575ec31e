//! `log`-crate facade over the serial UART.
//!
//! A single `log(level, text)` call, buffered externally (here: by the
//! serial line itself, not by us). Uses the lock-free raw writer so
//! it's safe to call from interrupt handlers and the panic handler.

use core::fmt::Write;
use log::{Level, Log, Metadata, Record};

struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let _ = writeln!(
            crate::serial::RawSerialWriter,
            "[{:>5}] {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Install the serial logger as the global `log` backend. Call once,
/// early in boot, before any other subsystem starts logging.
pub fn init() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(Level::Trace.to_level_filter()))
        .expect("logger already initialized");
}
