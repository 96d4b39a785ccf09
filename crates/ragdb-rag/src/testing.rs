//! Scripted model for tests and offline dry-runs: replays canned
//! responses in order instead of calling a network endpoint.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::llm::{ChatModel, LlmError};

#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions requested so far (streamed or not).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .map_err(|_| LlmError::Fatal("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| LlmError::Fatal("script exhausted".to_string()))
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.next_response()
    }

    async fn complete_stream(
        &self,
        _system: &str,
        _user: &str,
    ) -> Result<mpsc::Receiver<String>, LlmError> {
        let response = self.next_response()?;
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            // Fragment on whitespace so consumers see a real stream.
            for word in response.split_inclusive(' ') {
                if tx.send(word.to_string()).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Always fails with the given error kind; for retry/unavailable paths.
pub struct FailingModel {
    retryable: bool,
    calls: AtomicUsize,
}

impl FailingModel {
    pub fn new(retryable: bool) -> Self {
        Self { retryable, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn error(&self) -> LlmError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.retryable {
            LlmError::Transient("scripted transient failure".to_string())
        } else {
            LlmError::Fatal("scripted fatal failure".to_string())
        }
    }
}

#[async_trait]
impl ChatModel for FailingModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(self.error())
    }

    async fn complete_stream(
        &self,
        _system: &str,
        _user: &str,
    ) -> Result<mpsc::Receiver<String>, LlmError> {
        Err(self.error())
    }
}
