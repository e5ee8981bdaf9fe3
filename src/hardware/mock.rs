// src/hardware/mock.rs - Scripted in-memory link for tests and dry runs
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::hardware::transport::{Link, TransportError};

/// Records every line sent and answers queries from a script.
///
/// Clones share state, so a test can keep one handle while the driver owns
/// another.
#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sent: Vec<String>,
    replies: HashMap<String, VecDeque<String>>,
    pending: VecDeque<String>,
    broken: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Always answer `command` with `reply`.
    pub fn on(&self, command: &str, reply: &str) -> &Self {
        self.on_sequence(command, &[reply])
    }

    /// Answer `command` with each reply in turn; the last one repeats.
    pub fn on_sequence(&self, command: &str, replies: &[&str]) -> &Self {
        self.state().replies.insert(
            command.to_string(),
            replies.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    /// Make every send fail as if the port had gone away.
    pub fn set_broken(&self, broken: bool) {
        self.state().broken = broken;
    }

    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.state().sent.iter().filter(|s| s.as_str() == command).count()
    }

    pub fn clear_sent(&self) {
        self.state().sent.clear();
    }
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.broken {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock link broken").into());
        }
        state.sent.push(text.to_string());
        let reply = state.replies.get_mut(text).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        if let Some(reply) = reply {
            state.pending.push_back(reply);
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        Ok(self.state().pending.pop_front().unwrap_or_default())
    }
}
