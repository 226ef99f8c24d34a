//! Line-oriented progress output.
//!
//! Every pulled/published/acknowledged/processed event and every error is
//! one line. The writer sits behind a `std::sync::Mutex`; the lock is only
//! held for the duration of a single write.

use std::io::{self, Write};
use std::sync::Mutex;

pub struct Console {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write `text` followed by a newline.
    pub fn line(&self, text: impl AsRef<str>) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", text.as_ref())?;
        out.flush()
    }

    /// Write `text` without a trailing newline (prompts).
    pub fn prompt(&self, text: impl AsRef<str>) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        write!(out, "{}", text.as_ref())?;
        out.flush()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

/// In-memory writer whose contents can be read back while a `Console` owns it.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct Capture(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl Capture {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub(crate) fn lines_starting_with(&self, prefix: &str) -> usize {
        self.contents()
            .lines()
            .filter(|l| l.starts_with(prefix))
            .count()
    }
}

#[cfg(test)]
impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
