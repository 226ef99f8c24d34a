//! Operator input for interactive review.
//!
//! Lines are read on a dedicated `std::thread` and forwarded over a
//! `tokio::sync::mpsc` channel. The reader thread may stay blocked in a read
//! forever; nothing joins it, so cancelling a run never waits on the
//! operator and the process can exit.

use std::io::{BufRead, BufReader};
use std::thread;

use tokio::sync::mpsc;
use tracing::debug;

pub struct OperatorInput {
    lines: mpsc::UnboundedReceiver<String>,
}

impl OperatorInput {
    /// Read decisions from the process's standard input.
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }

    /// Read decisions line by line from `reader` on a background thread.
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("Operator input closed");
        });
        Self { lines: rx }
    }

    /// Next line without its terminator, or `None` once input is closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }
}
