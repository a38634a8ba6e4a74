//! Deterministic `CompletionClient` for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use super::{CompletionClient, DeltaStream, LlmError};
use crate::models::conversation::ChatMessage;

/// How a scripted reply ends after its fragments are emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ending {
    Finish,
    Fail,
    /// Never yields again; models a stalled upstream.
    Hang,
}

pub struct ScriptedCompletion {
    fragments: Vec<String>,
    ending: Ending,
    refuse_stream: bool,
    analyses: Mutex<VecDeque<Result<serde_json::Value, String>>>,
    pub stream_calls: AtomicUsize,
    pub json_calls: AtomicUsize,
    pub last_transcript: Mutex<Vec<ChatMessage>>,
    pub last_system: Mutex<String>,
}

impl ScriptedCompletion {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ending: Ending::Finish,
            refuse_stream: false,
            analyses: Mutex::new(VecDeque::new()),
            stream_calls: AtomicUsize::new(0),
            json_calls: AtomicUsize::new(0),
            last_transcript: Mutex::new(Vec::new()),
            last_system: Mutex::new(String::new()),
        }
    }

    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    /// `stream_reply` itself fails, before any fragment.
    pub fn refusing_streams(mut self) -> Self {
        self.refuse_stream = true;
        self
    }

    /// Queues the result of the next `complete_json` call.
    pub fn with_analysis(self, result: Result<serde_json::Value, &str>) -> Self {
        self.analyses
            .lock()
            .unwrap()
            .push_back(result.map_err(str::to_string));
        self
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn json_calls(&self) -> usize {
        self.json_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn stream_reply(
        &self,
        system: &str,
        transcript: &[ChatMessage],
    ) -> Result<DeltaStream, LlmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_transcript.lock().unwrap() = transcript.to_vec();
        *self.last_system.lock().unwrap() = system.to_string();

        if self.refuse_stream {
            return Err(LlmError::Api {
                status: 529,
                message: "overloaded".to_string(),
            });
        }

        let fragments = stream::iter(self.fragments.clone().into_iter().map(Ok));
        let tail: DeltaStream = match self.ending {
            Ending::Finish => Box::pin(stream::empty()),
            Ending::Fail => Box::pin(stream::iter([Err(LlmError::Stream(
                "connection reset".to_string(),
            ))])),
            Ending::Hang => Box::pin(stream::pending()),
        };
        Ok(Box::pin(futures_util::StreamExt::chain(fragments, tail)))
    }

    async fn complete_json(
        &self,
        _prompt: &str,
        _system: &str,
    ) -> Result<serde_json::Value, LlmError> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        match self.analyses.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(LlmError::Api {
                status: 500,
                message,
            }),
            None => Err(LlmError::EmptyContent),
        }
    }
}
