//! Remote agents over server-sent events.
//!
//! The proxy POSTs the request to `{server_url}/sse/chat` and reads the
//! event stream until the `done` sentinel:
//!
//! ```text
//! data: {"type": "tool_call", ...}     forwarded progress, ignored
//! data: {"type": "answer", "content": "..."}
//! data: done
//! ```
//!
//! Non-JSON `data:` payloads are accepted as the answer when no structured
//! answer has arrived yet.

use agentweave_config::RemoteAgentConfig;
use agentweave_core::{Error, Request, Response, Unit, USER};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::profile::{profile_builders, unit_identity, Profile};

const SSE_PATH: &str = "/sse/chat";
const EMPTY_ANSWER: &str = "Remote call completed without an answer";

// ── Stream parsing ────────────────────────────────────────────────────────

/// Incremental parser for the answer carried by an event stream.
#[derive(Debug, Default)]
pub struct SseAnswerParser {
    buffer: Vec<u8>,
    answer: Option<String>,
    done: bool,
}

impl SseAnswerParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes. Returns `true` once the sentinel has been seen.
    ///
    /// Only complete lines are decoded, so a multi-byte character split
    /// across chunks survives intact.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> bool {
        self.buffer.extend_from_slice(chunk.as_ref());
        while !self.done {
            let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            self.handle_line(line.trim_end_matches('\r'));
        }
        self.done
    }

    /// Flush a trailing line without newline.
    pub fn finish(&mut self) {
        if !self.done && !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            self.handle_line(line.trim_end_matches('\r'));
        }
    }

    fn handle_line(&mut self, line: &str) {
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() {
            return;
        }
        if data == "done" || data == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<Value>(data) {
            Ok(Value::Object(event)) => match event.get("type").and_then(Value::as_str) {
                Some("answer") => {
                    if let Some(content) = event.get("content") {
                        let text = content
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| content.to_string());
                        self.answer = Some(text);
                    }
                }
                other => debug!(event = ?other, "Remote progress event"),
            },
            _ => {
                if self.answer.is_none() {
                    self.answer = Some(data.to_string());
                }
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The answer, or a fixed notice when the stream carried none.
    pub fn into_answer(self) -> String {
        self.answer
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| EMPTY_ANSWER.to_string())
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────

/// Proxy for an agent system served over SSE.
pub struct RemoteAgent {
    profile: Profile,
    server_url: String,
    share_call_stack: bool,
    client: reqwest::Client,
}

impl RemoteAgent {
    /// Fails unless `server_url` is an http(s) URL.
    pub fn new(name: impl Into<String>, server_url: impl Into<String>) -> Result<Self, Error> {
        let server_url = server_url.into();
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(Error::Config {
                message: format!("remote agent URL must start with http:// or https://: {server_url}"),
            });
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            profile: Profile::new(name),
            server_url: server_url.trim_end_matches('/').to_string(),
            share_call_stack: false,
            client,
        })
    }

    /// Build from a `[[remote_agents]]` entry.
    pub fn from_config(config: &RemoteAgentConfig) -> Result<Self, Error> {
        Ok(Self::new(&config.name, &config.server_url)?
            .with_description(&config.description)
            .with_share_call_stack(config.share_call_stack))
    }

    /// Send our caller and call stack instead of presenting as the user.
    pub fn with_share_call_stack(mut self, share: bool) -> Self {
        self.share_call_stack = share;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{SSE_PATH}", self.server_url)
    }

    pub(crate) fn payload(&self, request: &Request) -> Value {
        let caller = if self.share_call_stack {
            request.caller.as_str()
        } else {
            USER
        };
        let mut payload = json!({
            "query": request.query,
            "trace_id": request.trace_id,
            "caller": caller,
            "callee": request.target,
            "caller_category": "user",
            "callee_category": "agent",
            "arguments": request.arguments,
        });
        if self.share_call_stack {
            payload["call_stack"] = json!(request.call_stack);
        }
        payload
    }

    async fn stream_answer(&self, request: &Request) -> Result<String, String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Accept", "text/event-stream")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("server returned {status}: {body}"));
        }

        let mut parser = SseAnswerParser::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| format!("stream interrupted: {e}"))?;
            if parser.feed(&chunk) {
                break;
            }
        }
        parser.finish();
        Ok(parser.into_answer())
    }
}

profile_builders!(RemoteAgent);

#[async_trait]
impl Unit for RemoteAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        info!(unit = %self.profile.name, url = %self.endpoint(), "Calling remote agent");
        match self.stream_answer(&request).await {
            Ok(answer) => Response::completed(answer).with_request(request),
            Err(reason) => {
                warn!(unit = %self.profile.name, %reason, "Remote agent call failed");
                Response::failed(format!("Remote call failed: {reason}")).with_request(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_takes_last_answer_and_stops_at_sentinel() {
        let mut parser = SseAnswerParser::new();
        assert!(!parser.feed("data: {\"type\": \"tool_call\", \"tool_name\": \"x\"}\n"));
        assert!(!parser.feed("data: {\"type\": \"answer\", \"content\": \"draft\"}\n\n"));
        assert!(!parser.feed("data: {\"type\": \"answer\", \"con"));
        assert!(parser.feed("tent\": \"final\"}\r\ndata: done\ndata: {\"type\": \"answer\", \"content\": \"late\"}\n"));
        assert_eq!(parser.into_answer(), "final");
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let event = "data: {\"type\":\"answer\",\"content\":\"你好\"}\n".as_bytes();
        let split = event.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut parser = SseAnswerParser::new();
        assert!(!parser.feed(&event[..split]));
        assert!(!parser.feed(&event[split..]));
        assert!(parser.feed(b"data: done\n"));
        assert_eq!(parser.into_answer(), "你好");
    }

    #[test]
    fn plain_text_payload_is_accepted_once() {
        let mut parser = SseAnswerParser::new();
        parser.feed("event: message\ndata: hello there\ndata: second line\n: comment\n");
        parser.finish();
        assert_eq!(parser.into_answer(), "hello there");
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut parser = SseAnswerParser::new();
        parser.feed("data: {\"type\":\"answer\",\"content\":\"tail\"}");
        parser.finish();
        assert_eq!(parser.into_answer(), "tail");
    }

    #[test]
    fn empty_stream_has_notice() {
        let mut parser = SseAnswerParser::new();
        assert!(parser.feed("data: [DONE]\n"));
        assert!(parser.is_done());
        assert_eq!(parser.into_answer(), EMPTY_ANSWER);
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            RemoteAgent::new("r", "ftp://example.com"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn payload_hides_caller_unless_sharing() {
        let agent = RemoteAgent::new("remote", "http://localhost:8080/").unwrap();
        assert_eq!(agent.endpoint(), "http://localhost:8080/sse/chat");

        let mut request = Request::new("hello");
        request.caller = "planner".into();
        request.target = "remote".into();

        let payload = agent.payload(&request);
        assert_eq!(payload["caller"], "user");
        assert_eq!(payload["callee"], "remote");
        assert_eq!(payload["caller_category"], "user");
        assert!(payload.get("call_stack").is_none());

        let shared = agent.with_share_call_stack(true).payload(&request);
        assert_eq!(shared["caller"], "planner");
        assert_eq!(shared["call_stack"], json!(["user"]));
    }

    #[test]
    fn from_config_copies_fields() {
        let config = RemoteAgentConfig {
            name: "far".into(),
            description: "a remote helper".into(),
            server_url: "https://agents.example.com".into(),
            share_call_stack: true,
        };
        let agent = RemoteAgent::from_config(&config).unwrap();
        assert_eq!(agent.name(), "far");
        assert_eq!(agent.description(), "a remote helper");
    }

    #[tokio::test]
    async fn unreachable_server_is_failed_response() {
        let agent = RemoteAgent::new("remote", "http://127.0.0.1:9").unwrap();
        let response = agent.execute(Request::new("q")).await;
        assert!(response.is_failed());
        assert!(response.output.starts_with("Remote call failed"));
    }
}
