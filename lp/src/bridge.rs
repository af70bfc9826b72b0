//! Bridge from the `log` facade into a [`Logger`]
//!
//! Records from `log::info!` and friends become regular records with extra
//! `target` and `module` tags.

use log::{Log, Metadata, Record, SetLoggerError};

use crate::level::Level;
use crate::logger::Logger;
use crate::payload::Payload;
use crate::tags::Tags;

/// Tag holding `log::Record::target`
pub const KEY_TARGET: &str = "target";
/// Tag holding `log::Record::module_path`
pub const KEY_MODULE: &str = "module";

pub struct LogBridge<P: Payload = Tags> {
    logger: Logger<P>,
}

impl<P: Payload> LogBridge<P> {
    pub fn new(logger: Logger<P>) -> Self {
        Self { logger }
    }

    fn record_tags(record: &Record<'_>) -> Tags {
        let mut tags = Tags::new().with(KEY_TARGET, record.target());
        if let Some(module) = record.module_path() {
            tags.push(KEY_MODULE, module);
        }
        tags
    }
}

impl<P: Payload> Log for LogBridge<P> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.logger.enabled(Level::from(metadata.level()))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.logger.log_tags(
            Level::from(record.level()),
            record.args().to_string(),
            Self::record_tags(record),
        );
    }

    fn flush(&self) {
        let _ = self.logger.flush();
    }
}

/// Route the `log` facade into `logger`, passing records at `level` and above
pub fn install<P: Payload>(logger: Logger<P>, level: Level) -> Result<(), SetLoggerError> {
    let logger = logger.with_min_level(level);
    log::set_boxed_logger(Box::new(LogBridge::new(logger)))?;
    log::set_max_level(level.into());
    Ok(())
}
