use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use capforge_core::{ResponsePart, ResponseParts, Tool, ToolOutput};

/// Size-capped UTF-8 file read.
pub struct ReadFileTool {
    max_bytes: u64,
}

impl ReadFileTool {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a UTF-8 text file at the given path."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .context("missing 'path' argument")?;

        let meta = fs::metadata(path)
            .await
            .with_context(|| format!("cannot stat {path}"))?;
        if meta.len() > self.max_bytes {
            bail!(
                "{path} is {} bytes, over the {} byte read limit",
                meta.len(),
                self.max_bytes
            );
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {path}"))?;
        debug!(path, bytes = content.len(), "Read file");

        Ok(ToolOutput {
            display: Some(format!("Read {} bytes from {path}", content.len())),
            parts: Some(ResponseParts::One(ResponsePart::Text(content))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[tokio::test]
    async fn reads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"dns query log").unwrap();

        let tool = ReadFileTool::new(1024);
        let args = serde_json::json!({"path": file.path().to_str().unwrap()});
        let output = tool.execute(args).await.unwrap();

        assert_eq!(output.display.as_deref(), Some(&*format!(
            "Read 13 bytes from {}",
            file.path().display()
        )));
        let parts = output.parts.unwrap().normalize();
        assert_eq!(parts[0].as_text(), Some("dns query log"));
    }

    #[tokio::test]
    async fn rejects_files_over_the_cap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 64]).unwrap();

        let tool = ReadFileTool::new(16);
        let args = serde_json::json!({"path": file.path().to_str().unwrap()});
        let err = tool.execute(args).await.unwrap_err();
        assert!(err.to_string().contains("read limit"));
    }

    #[tokio::test]
    async fn requires_path_argument() {
        let tool = ReadFileTool::new(16);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("path"));
    }
}
