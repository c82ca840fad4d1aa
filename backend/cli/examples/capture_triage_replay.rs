//! End-to-end session demo driven by an in-code transcript: the agent
//! inspects a capture through `capture_info`, then closes with a summary.
//!
//! Run with: `cargo run -p capforge-cli --example capture_triage_replay`

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use capforge_core::{AgentEvent, ToolCallRequest};
use capforge_executor::RegistryExecutor;
use capforge_session::{OutputMode, OutputSink, ReplayClient, SessionDriver};

const DEMO_CAPTURE: &str = "triage_demo.pcap";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    write_demo_capture(DEMO_CAPTURE)?;

    let mut args = Map::new();
    args.insert(
        "path".to_string(),
        Value::String(DEMO_CAPTURE.to_string()),
    );
    let request = ToolCallRequest::new("capture_info", args);

    // Turn 1: the agent inspects the capture; turn 2: it answers.
    let client = Arc::new(ReplayClient::new(vec![
        vec![
            AgentEvent::Content("Inspecting the capture first.".to_string()),
            AgentEvent::ToolCallRequest(request),
        ],
        vec![AgentEvent::Content(
            "One Ethernet frame captured; see the summary record above.".to_string(),
        )],
    ]));
    let executor = Arc::new(RegistryExecutor::with_default_tools(256 * 1024));

    let driver = SessionDriver::new(client, executor, -1, CancellationToken::new());
    let mut sink = OutputSink::stdout(OutputMode::Jsonl);
    let outcome = driver
        .run_session(
            &format!("triage {DEMO_CAPTURE}"),
            "demo-prompt",
            &mut sink,
        )
        .await?;
    eprintln!("outcome: {outcome:?}");

    std::fs::remove_file(DEMO_CAPTURE)?;
    Ok(())
}

/// A one-packet little-endian pcap so the tool call has something to read.
fn write_demo_capture(path: &str) -> Result<()> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0xd4, 0xc3, 0xb2, 0xa1]);
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&65535u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    // One 60-byte frame of zeroes.
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&60u32.to_le_bytes());
    bytes.extend_from_slice(&60u32.to_le_bytes());
    bytes.extend(std::iter::repeat(0u8).take(60));
    std::fs::write(path, bytes)?;
    Ok(())
}
