//! # pubsub-relocate
//!
//! `pubsub-relocate` moves messages from a Cloud Pub/Sub subscription to a
//! topic, either unattended ("move") or one by one under operator review
//! ("dead-letter review"). Delivery is at-least-once: a message may end up
//! on the destination and still be on the source if its acknowledgment
//! fails after a successful publish.
//!
//! ## Core Modules
//!
//! - `broker`: the pull/publish/acknowledge client abstraction, the Pub/Sub
//!   REST client and an in-memory broker.
//! - `config`: settings loading and validation of run parameters.
//! - `format`: payload rendering for display.
//! - `relocate`: the processing loop and the move/review handlers.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod format;
pub mod relocate;
pub mod utils;

#[cfg(test)]
mod tests;
