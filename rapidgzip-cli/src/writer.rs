//! Output writer wrapper for the rapidgzip CLI.
//!
//! This module provides a thin wrapper around the output writer to provide
//! a consistent interface and ensure proper cleanup via the `finish()` method.

use std::io::{self, Write};

/// Wrapper around an output writer.
///
/// This newtype pattern provides:
/// - Explicit `finish()` method for flushing and cleanup
/// - Consistent error handling
/// - Future extensibility (e.g., progress tracking)
pub struct OutputWriter(Box<dyn Write + Send>);

impl OutputWriter {
    /// Creates a new output writer.
    pub fn new(writer: Box<dyn Write + Send>) -> io::Result<Self> {
        Ok(OutputWriter(writer))
    }

    /// Flushes and finalizes the output.
    pub fn finish(mut self) -> io::Result<()> {
        self.0.flush()?;
        Ok(())
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
