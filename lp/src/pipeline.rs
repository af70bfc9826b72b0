//! Pipeline - a logger wired to the consumers named in a [`Config`]

use dispatchq::{ErrorPolicy, QueueConfig, Subscription};
use eyre::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::consumers::{ConsoleConsumer, FileConsumer, own_thread};
use crate::logger::Logger;
use crate::tags::Tags;

/// Logger plus the subscriptions that keep its consumers attached
pub struct Pipeline {
    logger: Logger,
    subscriptions: Vec<Subscription>,
}

impl Pipeline {
    /// Build the logger and attach the configured consumers.
    ///
    /// Consumer failures are logged as diagnostics and do not stop delivery.
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!(level = %config.level, "Pipeline::from_config: called");
        let tags: Tags = config.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let logger = Logger::<Tags>::new(config.queue.clone(), ErrorPolicy::log_and_continue())
            .context("Failed to start dispatcher")?
            .extend(tags)
            .with_min_level(config.level);

        let mut subscriptions = Vec::new();
        if config.console.enabled {
            subscriptions.push(logger.attach(ConsoleConsumer::stdout(config.console.color)));
        }
        if let Some(file) = &config.file {
            let consumer = FileConsumer::open(&file.path, file.format)
                .context(format!("Failed to open log file {}", file.path.display()))?;
            let subscription = if file.own_thread {
                let name = format!("{}-file", config.queue.name);
                let sink = own_thread(consumer, QueueConfig::named(name), ErrorPolicy::log_and_continue())
                    .context("Failed to start file writer thread")?;
                logger.subscribe(sink.into_consumer::<Tags>())
            } else {
                logger.attach(consumer)
            };
            subscriptions.push(subscription);
        }
        debug!(consumers = subscriptions.len(), "Pipeline::from_config: consumers attached");

        Ok(Self { logger, subscriptions })
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Deliver everything logged so far and detach every consumer
    pub fn shutdown(self) -> Result<()> {
        self.logger.flush().context("Failed to flush log records")?;
        for subscription in &self.subscriptions {
            subscription.release();
        }
        Ok(())
    }
}
