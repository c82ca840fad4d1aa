use std::io::{self, Write};

use capforge_core::{StreamRecord, ToolCallRequest, ToolCallResponse};

/// Session output framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Raw text fragments, one trailing newline at end-of-session.
    Plain,
    /// One self-contained JSON record per line.
    Jsonl,
}

/// Writes session output in the selected framing, flushing per fragment so
/// downstream consumers see tokens as they arrive.
pub struct OutputSink<W: Write> {
    writer: W,
    mode: OutputMode,
}

impl OutputSink<io::Stdout> {
    pub fn stdout(mode: OutputMode) -> Self {
        Self::new(io::stdout(), mode)
    }
}

impl<W: Write> OutputSink<W> {
    pub fn new(writer: W, mode: OutputMode) -> Self {
        Self { writer, mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Emit one content fragment. Plain mode writes the raw text with no
    /// added newline.
    pub fn token(&mut self, text: &str) -> io::Result<()> {
        match self.mode {
            OutputMode::Plain => {
                self.writer.write_all(text.as_bytes())?;
                self.writer.flush()
            }
            OutputMode::Jsonl => self.record(&StreamRecord::token(text)),
        }
    }

    /// Emit a `tool_call` record; a no-op in plain mode.
    pub fn tool_call(&mut self, request: &ToolCallRequest, call_id: &str) -> io::Result<()> {
        match self.mode {
            OutputMode::Plain => Ok(()),
            OutputMode::Jsonl => self.record(&StreamRecord::tool_call(request, call_id)),
        }
    }

    /// Emit a `tool_result` record; a no-op in plain mode.
    pub fn tool_result(
        &mut self,
        call_id: &str,
        name: &str,
        response: &ToolCallResponse,
    ) -> io::Result<()> {
        match self.mode {
            OutputMode::Plain => Ok(()),
            OutputMode::Jsonl => self.record(&StreamRecord::tool_result(call_id, name, response)),
        }
    }

    /// Close out a completed session: plain mode gets its single trailing
    /// newline, JSONL lines are already self-terminated.
    pub fn finish(&mut self) -> io::Result<()> {
        match self.mode {
            OutputMode::Plain => {
                self.writer.write_all(b"\n")?;
                self.writer.flush()
            }
            OutputMode::Jsonl => Ok(()),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn record(&mut self, record: &StreamRecord) -> io::Result<()> {
        let line = serde_json::to_string(record).map_err(io::Error::other)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_writes_raw_fragments() {
        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        sink.token("hello ").unwrap();
        sink.token("world").unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.into_inner(), b"hello world\n");
    }

    #[test]
    fn plain_mode_suppresses_tool_records() {
        let mut sink = OutputSink::new(Vec::new(), OutputMode::Plain);
        let request = ToolCallRequest::new("search", Default::default());
        sink.tool_call(&request, "search-1").unwrap();
        sink.tool_result("search-1", "search", &ToolCallResponse::default())
            .unwrap();
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn jsonl_mode_emits_one_line_per_record() {
        let mut sink = OutputSink::new(Vec::new(), OutputMode::Jsonl);
        sink.token("a").unwrap();
        sink.token("b").unwrap();
        sink.finish().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["type"], "token");
        }
        assert!(out.ends_with('\n'));
        assert!(!out.ends_with("\n\n"));
    }
}
