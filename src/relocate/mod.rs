//! Relocation engine
//!
//! Drives the pull → decide → publish → acknowledge cycle against a
//! [`Broker`]. Messages are handled strictly one at a time.
//!
//! A run ends in one of three ways:
//! - the source is drained (a pull returns nothing before the poll timeout),
//!   the configured message ceiling is reached, or the handler says quit;
//! - [`MAX_CONSECUTIVE_PULL_ERRORS`] pulls in a row fail;
//! - the shutdown future resolves, which drops whatever call is in flight.
//!
//! The broker is closed on every one of those paths.

pub mod console;
pub mod handler;
pub mod input;

use std::future::Future;

use tracing::{debug, warn};

use crate::broker::Broker;
use crate::config::RelocationConfig;
use crate::utils::error::RelocationError;

pub use console::Console;
pub use handler::{Handler, MoveHandler, ReviewHandler};
pub use input::OperatorInput;

/// Back-to-back pull failures tolerated before a run is aborted.
pub const MAX_CONSECUTIVE_PULL_ERRORS: u32 = 5;

/// What the loop does with a message once its handler is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Remove it from the source and count it.
    Acknowledge,
    /// Leave it for redelivery; not counted.
    Skip,
    /// Stop the run; the current message is left untouched.
    Quit,
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessingOutcome {
    pub processed: u64,
}

/// Counts pull failures since the last successful pull.
#[derive(Debug)]
struct ConsecutiveErrorCounter {
    count: u32,
    ceiling: u32,
}

impl ConsecutiveErrorCounter {
    fn new(ceiling: u32) -> Self {
        Self { count: 0, ceiling }
    }

    /// Record a failure; true once the ceiling is reached.
    fn record(&mut self) -> bool {
        self.count = (self.count + 1).min(self.ceiling);
        self.count >= self.ceiling
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

pub struct Relocator<'a> {
    broker: &'a dyn Broker,
    console: &'a Console,
    config: &'a RelocationConfig,
}

impl<'a> Relocator<'a> {
    pub fn new(broker: &'a dyn Broker, console: &'a Console, config: &'a RelocationConfig) -> Self {
        Self {
            broker,
            console,
            config,
        }
    }

    /// Run until done, then close the broker.
    pub async fn run(&self, handler: &mut Handler) -> Result<ProcessingOutcome, RelocationError> {
        self.run_until(handler, std::future::pending()).await
    }

    /// Like [`Relocator::run`], but `shutdown` resolving cancels the run with
    /// [`RelocationError::Cancelled`].
    pub async fn run_until(
        &self,
        handler: &mut Handler,
        shutdown: impl Future<Output = ()>,
    ) -> Result<ProcessingOutcome, RelocationError> {
        let result = tokio::select! {
            result = self.process(handler) => result,
            _ = shutdown => Err(RelocationError::Cancelled),
        };
        self.broker.close().await;

        if let Ok(outcome) = &result {
            self.console.line(format!(
                "{} message(s) {}",
                outcome.processed,
                handler.summary_verb()
            ))?;
        }
        result
    }

    async fn process(&self, handler: &mut Handler) -> Result<ProcessingOutcome, RelocationError> {
        let mut errors = ConsecutiveErrorCounter::new(MAX_CONSECUTIVE_PULL_ERRORS);
        let mut outcome = ProcessingOutcome::default();
        let mut seq: u64 = 0;

        loop {
            let message = match self.broker.pull(self.config.poll_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("No message within {:?}, source drained", self.config.poll_timeout);
                    self.console.line("No more messages available")?;
                    break;
                }
                Err(e) if e.is_deadline_exceeded() => {
                    debug!("Pull deadline exceeded, source drained");
                    self.console.line("No more messages available")?;
                    break;
                }
                Err(e) => {
                    let limit_reached = errors.record();
                    self.console.line(format!(
                        "Error pulling message ({}/{}): {e}",
                        errors.count, errors.ceiling
                    ))?;
                    if limit_reached {
                        return Err(RelocationError::TooManyPullErrors {
                            count: errors.count,
                        });
                    }
                    continue;
                }
            };

            errors.reset();
            seq += 1;
            self.console.line(format!("Pulled message {seq}"))?;

            match handler.handle(self.broker, self.console, &message, seq).await? {
                Decision::Quit => {
                    self.console.line(format!("Quitting at message {seq}"))?;
                    break;
                }
                Decision::Skip => {
                    debug!("Leaving message {seq} on the source for redelivery");
                }
                Decision::Acknowledge => {
                    match self.broker.acknowledge(&message.ack_id).await {
                        Ok(()) => self.console.line(format!("Acknowledged message {seq}"))?,
                        Err(e) => {
                            warn!("Failed to acknowledge message {seq}: {e}");
                            self.console.line(format!(
                                "Warning: failed to acknowledge message {seq}: {e}"
                            ))?;
                        }
                    }
                    outcome.processed += 1;
                    self.console.line(format!("Processed message {seq}"))?;
                }
            }

            if self.config.is_bounded() && outcome.processed >= self.config.max_messages {
                debug!("Reached message limit of {}", self.config.max_messages);
                break;
            }
        }

        Ok(outcome)
    }
}
