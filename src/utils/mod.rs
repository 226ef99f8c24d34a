//! The `utils` module holds the pieces shared by every other part of
//! `pubsub-relocate`: the crate error types and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;
