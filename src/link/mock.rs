//! Mock transport for testing without a modem attached.
//!
//! Cloning shares the underlying channel, so a test can keep one handle to
//! script replies and inspect writes while the link owns the other.

use crate::error::NodeResult;
use crate::link::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Channel {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// Scripted in-memory transport.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    channel: Arc<Mutex<Channel>>,
}

impl MockTransport {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self) -> std::sync::MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue one modem reply line, `\r\n`-terminated.
    pub fn push_line(&self, line: &str) {
        let mut ch = self.channel();
        ch.rx.extend(line.as_bytes());
        ch.rx.extend(b"\r\n");
    }

    /// Queue raw bytes without a terminator (e.g. the bare `> ` prompt).
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.channel().rx.extend(bytes);
    }

    /// Everything the link wrote so far, as UTF-8.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.channel().tx).into_owned()
    }

    /// Drain and return the written bytes.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.channel().tx)
    }
}

impl Transport for MockTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> NodeResult<usize> {
        let mut ch = self.channel();
        let n = buf.len().min(ch.rx.len());
        for slot in buf.iter_mut().take(n) {
            // n <= rx.len() so pop_front cannot come up empty here
            *slot = ch.rx.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> NodeResult<()> {
        self.channel().tx.extend_from_slice(bytes);
        Ok(())
    }
}
