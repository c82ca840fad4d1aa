//! The session driver: one non-interactive conversation, turn by turn.

use std::io::{self, Write};
use std::sync::Arc;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use capforge_core::{
    AgentClient, AgentEvent, CapError, ContentPart, Message, ToolCallRequest, ToolExecutor,
};

use crate::capture_hint::{capture_hint, references_capture};
use crate::notes;
use crate::output::OutputSink;

/// How a session ended. Every variant maps to a successful process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A turn produced no tool calls; the reply is complete.
    Completed,
    /// The configured turn limit stopped the session.
    TurnLimit,
    /// Cancellation was observed while draining events.
    Canceled,
    /// The downstream consumer closed the output stream.
    OutputClosed,
}

/// Drives one conversation to completion against an agent client and a tool
/// executor, both shared with the caller through the configuration layer.
pub struct SessionDriver {
    client: Arc<dyn AgentClient>,
    executor: Arc<dyn ToolExecutor>,
    max_session_turns: i64,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(
        client: Arc<dyn AgentClient>,
        executor: Arc<dyn ToolExecutor>,
        max_session_turns: i64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            executor,
            max_session_turns,
            cancel,
        }
    }

    /// Run the session loop until the agent stops requesting tools, the turn
    /// limit is hit, or cancellation is observed.
    ///
    /// The pending batch is a single message replaced atomically each turn:
    /// all tool responses of a turn collapse into one user message.
    pub async fn run_session<W: Write>(
        &self,
        input: &str,
        prompt_id: &str,
        out: &mut OutputSink<W>,
    ) -> Result<SessionOutcome, CapError> {
        let mut batch = initial_message(input);
        let mut turn: i64 = 0;

        loop {
            turn += 1;
            if self.max_session_turns >= 0 && turn > self.max_session_turns {
                notes::note_warn(&format!(
                    "Reached max session turns ({}), ending session.",
                    self.max_session_turns
                ));
                return Ok(SessionOutcome::TurnLimit);
            }
            debug!(turn, prompt_id, "Opening streamed exchange");

            let mut stream = self
                .client
                .send_message_stream(batch.parts.clone(), self.cancel.clone(), prompt_id)
                .await?;

            // Pending calls for this turn, with their resolved identifiers.
            let mut pending: Vec<(String, ToolCallRequest)> = Vec::new();

            while let Some(event) = stream.next().await {
                if self.cancel.is_cancelled() {
                    notes::note_warn("Session canceled.");
                    return Ok(SessionOutcome::Canceled);
                }
                match event {
                    AgentEvent::Content(text) => {
                        if write_closed(out.token(&text))? {
                            return Ok(SessionOutcome::OutputClosed);
                        }
                    }
                    AgentEvent::ToolCallRequest(request) => {
                        let call_id = request.resolved_call_id();
                        if write_closed(out.tool_call(&request, &call_id))? {
                            return Ok(SessionOutcome::OutputClosed);
                        }
                        pending.push((call_id, request));
                    }
                }
            }

            if pending.is_empty() {
                if write_closed(out.finish())? {
                    return Ok(SessionOutcome::OutputClosed);
                }
                info!(turns = turn, "Session complete");
                return Ok(SessionOutcome::Completed);
            }

            let mut parts: Vec<ContentPart> = Vec::new();
            for (call_id, received) in pending {
                let request = ToolCallRequest {
                    call_id: Some(call_id.clone()),
                    name: received.name,
                    args: received.args,
                    is_client_initiated: false,
                    prompt_id: prompt_id.to_string(),
                };
                debug!(tool = %request.name, call_id = %call_id, "Dispatching tool call");

                let response = self
                    .executor
                    .execute(request.clone(), self.cancel.clone())
                    .await;

                if write_closed(out.tool_result(&call_id, &request.name, &response))? {
                    return Ok(SessionOutcome::OutputClosed);
                }
                if let Some(error) = &response.error {
                    notes::note_error(&format!(
                        "Error executing tool {}: {}",
                        request.name, error
                    ));
                }
                parts.extend(response.into_parts());
            }
            batch = Message::user(parts);
        }
    }
}

/// Build the opening user message, attaching the capture hint when the input
/// references a capture file.
fn initial_message(input: &str) -> Message {
    let mut parts = vec![ContentPart::text(input)];
    if references_capture(input) {
        parts.push(ContentPart::text(capture_hint()));
    }
    Message::user(parts)
}

/// Distinguish a closed downstream pipe (benign early exit) from a real
/// write failure.
fn write_closed(result: io::Result<()>) -> Result<bool, CapError> {
    match result {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(true),
        Err(e) => Err(CapError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use crate::output::OutputMode;
    use capforge_core::{EventStream, ResponsePart, ResponseParts, ToolCallResponse};

    /// Canned per-turn events, recording the parts of every exchange.
    struct ScriptedClient {
        turns: Mutex<VecDeque<Vec<AgentEvent>>>,
        exchanges: Mutex<Vec<Vec<ContentPart>>>,
    }

    impl ScriptedClient {
        fn new(turns: Vec<Vec<AgentEvent>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                exchanges: Mutex::new(Vec::new()),
            }
        }

        fn exchange_count(&self) -> usize {
            self.exchanges.lock().unwrap().len()
        }

        fn exchange_parts(&self, index: usize) -> Vec<ContentPart> {
            self.exchanges.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl AgentClient for ScriptedClient {
        async fn send_message_stream(
            &self,
            parts: Vec<ContentPart>,
            _cancel: CancellationToken,
            _prompt_id: &str,
        ) -> Result<EventStream, CapError> {
            self.exchanges.lock().unwrap().push(parts);
            let events = self.turns.lock().unwrap().pop_front().unwrap_or_default();
            let (tx, rx) = mpsc::channel(32);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(ReceiverStream::new(rx))
        }
    }

    /// Records dispatch order; responses scripted per tool name.
    struct RecordingExecutor {
        responses: HashMap<String, ToolCallResponse>,
        calls: Mutex<Vec<ToolCallRequest>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_response(mut self, name: &str, response: ToolCallResponse) -> Self {
            self.responses.insert(name.to_string(), response);
            self
        }

        fn calls(&self) -> Vec<ToolCallRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolExecutor for RecordingExecutor {
        async fn execute(
            &self,
            request: ToolCallRequest,
            _cancel: CancellationToken,
        ) -> ToolCallResponse {
            let response = self
                .responses
                .get(&request.name)
                .cloned()
                .unwrap_or_default();
            self.calls.lock().unwrap().push(request);
            response
        }
    }

    fn tool_request(name: &str, args: Map<String, Value>) -> AgentEvent {
        AgentEvent::ToolCallRequest(ToolCallRequest::new(name, args))
    }

    fn driver(
        client: &Arc<ScriptedClient>,
        executor: &Arc<RecordingExecutor>,
        max_turns: i64,
        cancel: CancellationToken,
    ) -> SessionDriver {
        SessionDriver::new(
            Arc::clone(client) as Arc<dyn AgentClient>,
            Arc::clone(executor) as Arc<dyn ToolExecutor>,
            max_turns,
            cancel,
        )
    }

    fn jsonl_lines(sink: OutputSink<Vec<u8>>) -> Vec<Value> {
        let out = String::from_utf8(sink.into_inner()).unwrap();
        out.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn plain_session_ends_with_single_newline() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            AgentEvent::Content("hello ".to_string()),
            AgentEvent::Content("world".to_string()),
        ]]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        let outcome = driver.run_session("hello", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Completed);
        assert_eq!(sink.into_inner(), b"hello world\n");
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn jsonl_token_records_parse_back() {
        let client = Arc::new(ScriptedClient::new(vec![vec![AgentEvent::Content(
            "abc".to_string(),
        )]]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Jsonl);
        driver.run_session("hi", "p-1", &mut sink).await.unwrap();

        let lines = jsonl_lines(sink);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "token");
        assert_eq!(lines[0]["data"], "abc");
    }

    #[tokio::test]
    async fn zero_turn_limit_never_reaches_the_client() {
        let client = Arc::new(ScriptedClient::new(vec![vec![AgentEvent::Content(
            "never".to_string(),
        )]]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, 0, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        let outcome = driver.run_session("hi", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::TurnLimit);
        assert_eq!(client.exchange_count(), 0);
        assert!(sink.into_inner().is_empty());
    }

    #[tokio::test]
    async fn turn_limit_stops_after_allowed_turns() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![tool_request("search", Map::new())],
            vec![AgentEvent::Content("unreached".to_string())],
        ]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, 1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        let outcome = driver.run_session("hi", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::TurnLimit);
        assert_eq!(client.exchange_count(), 1);
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn tool_calls_run_sequentially_in_request_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![
                tool_request("alpha", Map::new()),
                tool_request("beta", Map::new()),
                tool_request("gamma", Map::new()),
            ],
            vec![],
        ]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Jsonl);
        let outcome = driver.run_session("go", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Completed);
        let names: Vec<String> = executor.calls().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["alpha", "beta", "gamma"]);

        let results: Vec<Value> = jsonl_lines(sink)
            .into_iter()
            .filter(|line| line["type"] == "tool_result")
            .collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["data"]["name"], "alpha");
        assert_eq!(results[1]["data"]["name"], "beta");
        assert_eq!(results[2]["data"]["name"], "gamma");
    }

    #[tokio::test]
    async fn synthesized_id_is_shared_across_records() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![tool_request("search", Map::new())],
            vec![],
        ]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Jsonl);
        driver.run_session("go", "p-1", &mut sink).await.unwrap();

        let lines = jsonl_lines(sink);
        let call = &lines[0];
        let result = &lines[1];
        assert_eq!(call["type"], "tool_call");
        assert_eq!(result["type"], "tool_result");
        let id = call["data"]["call_id"].as_str().unwrap();
        assert!(id.starts_with("search-"));
        assert_eq!(result["data"]["call_id"], id);

        let dispatched = executor.calls();
        assert_eq!(dispatched[0].call_id.as_deref(), Some(id));
        assert_eq!(dispatched[0].prompt_id, "p-1");
        assert!(!dispatched[0].is_client_initiated);
    }

    #[tokio::test]
    async fn explicit_id_is_used_verbatim() {
        let mut request = ToolCallRequest::new("search", Map::new());
        request.call_id = Some("given-7".to_string());
        let client = Arc::new(ScriptedClient::new(vec![
            vec![AgentEvent::ToolCallRequest(request)],
            vec![],
        ]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Jsonl);
        driver.run_session("go", "p-1", &mut sink).await.unwrap();

        let lines = jsonl_lines(sink);
        assert_eq!(lines[0]["data"]["call_id"], "given-7");
        assert_eq!(lines[1]["data"]["call_id"], "given-7");
    }

    #[tokio::test]
    async fn failing_tool_is_reported_and_session_continues() {
        let mut args = Map::new();
        args.insert("q".to_string(), Value::String("x".to_string()));
        let client = Arc::new(ScriptedClient::new(vec![
            vec![tool_request("search", args)],
            vec![],
        ]));
        let executor = Arc::new(
            RecordingExecutor::new()
                .with_response("search", ToolCallResponse::from_error("boom")),
        );
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Jsonl);
        let outcome = driver.run_session("go", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Completed);
        let lines = jsonl_lines(sink);
        assert_eq!(lines[0]["type"], "tool_call");
        assert_eq!(lines[0]["data"]["args"]["q"], "x");
        assert_eq!(lines[1]["type"], "tool_result");
        assert_eq!(lines[1]["data"]["error"], "boom");
        assert_eq!(lines[1]["data"]["result"], "boom");

        // The failed call produced no parts: the next turn carries an
        // empty-parts user message.
        assert_eq!(client.exchange_count(), 2);
        assert!(client.exchange_parts(1).is_empty());
    }

    #[tokio::test]
    async fn tool_response_parts_feed_the_next_turn() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![tool_request("lookup", Map::new())],
            vec![AgentEvent::Content("done".to_string())],
        ]));
        let response = ToolCallResponse {
            error: None,
            display: Some("2 hosts".to_string()),
            parts: Some(ResponseParts::Many(vec![
                ResponsePart::Text("found".to_string()),
                ResponsePart::Part(ContentPart::data(serde_json::json!({"hosts": 2}))),
            ])),
        };
        let executor = Arc::new(RecordingExecutor::new().with_response("lookup", response));
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        let outcome = driver.run_session("go", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Completed);
        let next = client.exchange_parts(1);
        assert_eq!(next.len(), 2);
        assert_eq!(next[0], ContentPart::text("found"));
        assert_eq!(next[1], ContentPart::data(serde_json::json!({"hosts": 2})));
        assert_eq!(sink.into_inner(), b"done\n");
    }

    #[tokio::test]
    async fn cancellation_stops_event_draining() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            AgentEvent::Content("a".to_string()),
            AgentEvent::Content("b".to_string()),
        ]]));
        let executor = Arc::new(RecordingExecutor::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let driver = driver(&client, &executor, -1, cancel);

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        let outcome = driver.run_session("go", "p-1", &mut sink).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Canceled);
        assert!(sink.into_inner().is_empty());
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn capture_paths_attach_the_hint() {
        let client = Arc::new(ScriptedClient::new(vec![vec![]]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        driver
            .run_session("summarize /tmp/trace.pcap", "p-1", &mut sink)
            .await
            .unwrap();

        let parts = client.exchange_parts(0);
        assert_eq!(parts.len(), 2);
        assert!(parts[1].as_text().unwrap().contains("capture_info"));
    }

    #[tokio::test]
    async fn plain_prompts_send_a_single_part() {
        let client = Arc::new(ScriptedClient::new(vec![vec![]]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        driver.run_session("hello", "p-1", &mut sink).await.unwrap();

        assert_eq!(client.exchange_parts(0), vec![ContentPart::text("hello")]);
    }

    #[tokio::test]
    async fn broken_pipe_is_a_graceful_exit() {
        struct ClosedPipe;
        impl Write for ClosedPipe {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let client = Arc::new(ScriptedClient::new(vec![vec![AgentEvent::Content(
            "text".to_string(),
        )]]));
        let executor = Arc::new(RecordingExecutor::new());
        let driver = driver(&client, &executor, -1, CancellationToken::new());

        let mut sink = OutputSink::new(ClosedPipe, OutputMode::Plain);
        let outcome = driver.run_session("go", "p-1", &mut sink).await.unwrap();
        assert_eq!(outcome, SessionOutcome::OutputClosed);
    }
}
