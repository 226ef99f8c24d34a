//! Per-message decision policies.
//!
//! A [`Handler`] looks at one pulled message and decides what the
//! processing loop does with it next. `Move` relocates everything
//! unattended; `Review` asks an operator for every message.

use tracing::debug;

use crate::broker::{Broker, Message};
use crate::config::RelocationConfig;
use crate::format::format_payload;
use crate::relocate::Decision;
use crate::relocate::console::Console;
use crate::relocate::input::OperatorInput;
use crate::utils::error::RelocationError;

pub const REVIEW_PROMPT: &str = "Choose action: [m]ove, [d]iscard, [q]uit: ";

pub enum Handler {
    Move(MoveHandler),
    Review(ReviewHandler),
}

impl Handler {
    pub fn unattended() -> Self {
        Handler::Move(MoveHandler)
    }

    pub fn review(input: OperatorInput, pretty_json: bool) -> Self {
        Handler::Review(ReviewHandler::new(input, pretty_json))
    }

    /// Review handler when operator input is given, unattended otherwise.
    /// Display settings come from `config`.
    pub fn for_config(config: &RelocationConfig, input: Option<OperatorInput>) -> Self {
        match input {
            Some(input) => Handler::review(input, config.pretty_json),
            None => Handler::unattended(),
        }
    }

    /// Decide what happens to `message`, performing any publish it needs.
    pub async fn handle(
        &mut self,
        broker: &dyn Broker,
        console: &Console,
        message: &Message,
        seq: u64,
    ) -> Result<Decision, RelocationError> {
        match self {
            Handler::Move(h) => h.handle(broker, console, message, seq).await,
            Handler::Review(h) => h.handle(broker, console, message, seq).await,
        }
    }

    /// Word used in the final summary line.
    pub fn summary_verb(&self) -> &'static str {
        match self {
            Handler::Move(_) => "relocated",
            Handler::Review(_) => "processed",
        }
    }
}

/// Publish `message` to the destination. A failure is reported and turns
/// into `Skip` so the message stays on the source for redelivery.
async fn relocate(
    broker: &dyn Broker,
    console: &Console,
    message: &Message,
    seq: u64,
) -> Result<Decision, RelocationError> {
    match broker.publish(message).await {
        Ok(token) => {
            console.line(format!("Published message {seq} (id {})", token.0))?;
            Ok(Decision::Acknowledge)
        }
        Err(e) => {
            console.line(format!("Error publishing message {seq}: {e}"))?;
            Ok(Decision::Skip)
        }
    }
}

#[derive(Debug, Default)]
pub struct MoveHandler;

impl MoveHandler {
    pub async fn handle(
        &mut self,
        broker: &dyn Broker,
        console: &Console,
        message: &Message,
        seq: u64,
    ) -> Result<Decision, RelocationError> {
        relocate(broker, console, message, seq).await
    }
}

pub struct ReviewHandler {
    input: OperatorInput,
    pretty_json: bool,
}

impl ReviewHandler {
    pub fn new(input: OperatorInput, pretty_json: bool) -> Self {
        Self { input, pretty_json }
    }

    pub async fn handle(
        &mut self,
        broker: &dyn Broker,
        console: &Console,
        message: &Message,
        seq: u64,
    ) -> Result<Decision, RelocationError> {
        self.show(console, message, seq)?;

        loop {
            console.prompt(REVIEW_PROMPT)?;

            let Some(answer) = self.input.next_line().await else {
                // Nobody left to answer.
                console.line("")?;
                debug!("Review input closed at message {seq}");
                return Ok(Decision::Quit);
            };

            match answer.trim() {
                "m" => return relocate(broker, console, message, seq).await,
                "d" => {
                    console.line(format!("Discarding message {seq}"))?;
                    return Ok(Decision::Acknowledge);
                }
                "q" => return Ok(Decision::Quit),
                other => {
                    console.line(format!("Invalid input '{other}', expected m, d or q"))?;
                }
            }
        }
    }

    fn show(&self, console: &Console, message: &Message, seq: u64) -> Result<(), RelocationError> {
        console.line(format!("Message {seq}:"))?;
        if let Some(id) = &message.message_id {
            console.line(format!("  ID: {id}"))?;
        }
        if let Some(published) = &message.publish_time {
            console.line(format!("  Published: {published}"))?;
        }
        console.line("Data:")?;
        console.line(format_payload(&message.payload, self.pretty_json))?;
        console.line("Attributes:")?;
        let attributes = message.sorted_attributes();
        if attributes.is_empty() {
            console.line("  (none)")?;
        }
        for (key, value) in attributes {
            console.line(format!("  {key}: {value}"))?;
        }
        Ok(())
    }
}
