//! Leveled logging through the console.
//!
//! Records are printed as `[LEVEL] message`. Warnings and errors go to the
//! error console, everything else to the normal one.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use mokernel_shared::{eprintln, println};

pub static LOGGER: Logger = Logger;

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if record.level() <= Level::Warn {
            eprintln!("[{}] {}", record.level(), record.args());
        } else {
            println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs [`LOGGER`]. Debug builds log at `Debug`, release builds at `Info`.
///
/// # Errors
///
/// Fails if a logger was already installed.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(
        #[cfg(debug_assertions)]
        LevelFilter::Debug,
        #[cfg(not(debug_assertions))]
        LevelFilter::Info,
    );
    Ok(())
}
