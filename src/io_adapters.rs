use std::io::{Result as IoResult, Write};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

/// Memory-backed writer for capturing the output of a command.
///
/// Cloning shares the underlying buffer, so a caller can keep one handle and
/// hand the other to the interpreter as a stdout or stderr sink.
#[derive(Clone, Default)]
pub struct MemWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemWriter {
    /// Public constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl crate::command::Stdout for MemWriter {
    /// A child process cannot write into our memory; it gets a pipe that the
    /// runner drains into this writer (see [`Self::needs_relay`]).
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::piped()
    }

    fn needs_relay(&self) -> bool {
        true
    }

    fn try_clone_box(&self) -> Option<Box<dyn crate::command::Stdout>> {
        Some(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let handle = MemWriter::new();
        let mut writer = handle.clone();
        write!(writer, "hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(handle.contents_lossy(), "hello world");
    }
}
