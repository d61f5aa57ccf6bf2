//! Mock bus transport for testing.
//!
//! Provides:
//! - Scripted query responses (one-shot queues and sticky defaults)
//! - A command log for test verification
//! - Controllable failure injection

use crate::error::{Error, Result};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};

/// In-process transport that replays scripted responses.
///
/// Commands and queries are recorded, in order, in a single log so tests
/// can assert on the exact bus traffic. Queries are answered first from a
/// per-command FIFO queue, then from a sticky default; an unscripted query
/// is a transport error, which keeps tests honest about what they exercise.
#[derive(Debug, Default)]
pub struct MockTransport {
    log: Vec<String>,
    queued: HashMap<String, VecDeque<String>>,
    sticky: HashMap<String, String>,
    srq_waits: usize,
    fail_next_write: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot response for `cmd`. Multiple calls queue in order.
    pub fn queue_response(&mut self, cmd: &str, response: &str) {
        self.queued
            .entry(cmd.to_string())
            .or_default()
            .push_back(response.to_string());
    }

    /// Set a response returned for `cmd` whenever no queued one remains.
    pub fn set_response(&mut self, cmd: &str, response: &str) {
        self.sticky.insert(cmd.to_string(), response.to_string());
    }

    /// Fail the next write with a transport error.
    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }

    /// Everything sent over the bus, in order.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// How many commands in the log start with `prefix`.
    pub fn count_matching(&self, prefix: &str) -> usize {
        self.log.iter().filter(|cmd| cmd.starts_with(prefix)).count()
    }

    /// Position of the first logged command starting with `prefix`.
    pub fn position_of(&self, prefix: &str) -> Option<usize> {
        self.log.iter().position(|cmd| cmd.starts_with(prefix))
    }

    /// How many times the session waited on a service request.
    pub fn srq_waits(&self) -> usize {
        self.srq_waits
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, cmd: &str) -> Result<()> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(Error::Transport(format!("injected failure on '{cmd}'")));
        }
        self.log.push(cmd.to_string());
        Ok(())
    }

    async fn query(&mut self, cmd: &str) -> Result<String> {
        self.log.push(cmd.to_string());
        if let Some(queue) = self.queued.get_mut(cmd) {
            if let Some(response) = queue.pop_front() {
                return Ok(response);
            }
        }
        if let Some(response) = self.sticky.get(cmd) {
            return Ok(response.clone());
        }
        Err(Error::Transport(format!(
            "no scripted response for query '{cmd}'"
        )))
    }

    async fn wait_for_event(&mut self) -> Result<()> {
        self.srq_waits += 1;
        self.log.push("<SRQ WAIT>".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_drain_before_sticky() {
        let mut transport = MockTransport::new();
        transport.set_response("LEVEL?", "0.0");
        transport.queue_response("LEVEL?", "1.5");
        assert_eq!(transport.query("LEVEL?").await.unwrap(), "1.5");
        assert_eq!(transport.query("LEVEL?").await.unwrap(), "0.0");
        assert_eq!(transport.query("LEVEL?").await.unwrap(), "0.0");
    }

    #[tokio::test]
    async fn unscripted_query_errors() {
        let mut transport = MockTransport::new();
        assert!(matches!(
            transport.query("*IDN?").await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn log_preserves_order() {
        let mut transport = MockTransport::new();
        transport.write("OUTPUT ON").await.unwrap();
        transport.wait_for_event().await.unwrap();
        transport.write("OUTPUT OFF").await.unwrap();
        assert_eq!(transport.log(), ["OUTPUT ON", "<SRQ WAIT>", "OUTPUT OFF"]);
        assert_eq!(transport.count_matching("OUTPUT"), 2);
        assert_eq!(transport.srq_waits(), 1);
    }

    #[tokio::test]
    async fn injected_write_failure_fires_once() {
        let mut transport = MockTransport::new();
        transport.fail_next_write();
        assert!(transport.write("*RST").await.is_err());
        assert!(transport.write("*RST").await.is_ok());
    }

    #[tokio::test]
    async fn query_values_uses_query_scripting() {
        let mut transport = MockTransport::new();
        transport.queue_response("TRACE:DATA?", "1.0,2.0,3.0");
        let values = transport.query_values("TRACE:DATA?").await.unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }
}
