//! Anthropic Messages SSE stream to text deltas.
//!
//! Event order on the wire: `message_start`, then per content block
//! `content_block_start` -> N x `content_block_delta` -> `content_block_stop`,
//! then `message_delta` and a final `message_stop`. `ping` may appear anywhere
//! and `error` may appear mid-stream. Only `text_delta` fragments are
//! surfaced; a body that ends before `message_stop` is an error.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::Deserialize;

use super::{DeltaStream, LlmError};

#[derive(Debug, Deserialize)]
struct BlockDeltaEvent {
    delta: BlockDelta,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    #[serde(rename = "type")]
    delta_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// What one upstream SSE event means for the reply.
#[derive(Debug, PartialEq)]
enum Step {
    Text(String),
    Stop,
    Skip,
}

fn interpret(event: &str, data: &str) -> Result<Step, LlmError> {
    match event {
        "content_block_delta" => {
            let parsed: BlockDeltaEvent = serde_json::from_str(data)?;
            match parsed.delta.text {
                Some(text) if parsed.delta.delta_type == "text_delta" && !text.is_empty() => {
                    Ok(Step::Text(text))
                }
                _ => Ok(Step::Skip),
            }
        }
        "message_stop" => Ok(Step::Stop),
        "error" => {
            let parsed: ErrorEvent = serde_json::from_str(data)?;
            Err(LlmError::Stream(format!(
                "{}: {}",
                parsed.error.error_type, parsed.error.message
            )))
        }
        _ => Ok(Step::Skip),
    }
}

pub(super) fn text_deltas(response: reqwest::Response) -> DeltaStream {
    let events = response.bytes_stream().eventsource();

    Box::pin(async_stream::stream! {
        let mut events = Box::pin(events);
        let mut failure = Some(LlmError::Stream(
            "upstream closed before message_stop".to_string(),
        ));

        while let Some(event) = events.next().await {
            let step = match event {
                Ok(event) => interpret(&event.event, &event.data),
                Err(e) => Err(LlmError::Stream(e.to_string())),
            };
            match step {
                Ok(Step::Text(text)) => yield Ok(text),
                Ok(Step::Stop) => {
                    failure = None;
                    break;
                }
                Ok(Step::Skip) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            yield Err(e);
        }
    })
}
