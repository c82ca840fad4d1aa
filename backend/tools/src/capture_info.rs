//! Capture file inspection.
//!
//! Walks pcap record headers or pcapng block headers without ever loading
//! packet payloads, so arbitrarily large captures summarize in one pass.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use capforge_core::{ContentPart, ResponsePart, ResponseParts, Tool, ToolOutput};

/// Summarizes a pcap or pcapng file: format, version, link type, snap
/// length, and packet/block counts.
pub struct CaptureInfoTool;

#[derive(Debug)]
struct CaptureSummary {
    format: &'static str,
    endianness: &'static str,
    version: String,
    link_type: Option<u32>,
    snap_len: Option<u32>,
    ts_resolution: Option<&'static str>,
    packets: u64,
    blocks: Option<u64>,
    file_bytes: u64,
}

impl CaptureSummary {
    fn to_json(&self) -> Value {
        serde_json::json!({
            "format": self.format,
            "endianness": self.endianness,
            "version": self.version,
            "link_type": self.link_type,
            "snap_len": self.snap_len,
            "timestamp_resolution": self.ts_resolution,
            "packets": self.packets,
            "blocks": self.blocks,
            "file_bytes": self.file_bytes,
        })
    }

    fn display(&self, path: &str) -> String {
        let link = self
            .link_type
            .map(|l| format!("linktype {l}"))
            .unwrap_or_else(|| "unknown linktype".to_string());
        format!(
            "{path}: {} v{} ({}-endian), {}, {} packets, {} bytes",
            self.format, self.version, self.endianness, link, self.packets, self.file_bytes
        )
    }
}

fn read_u16(bytes: &[u8], le: bool) -> u16 {
    let pair = [bytes[0], bytes[1]];
    if le {
        u16::from_le_bytes(pair)
    } else {
        u16::from_be_bytes(pair)
    }
}

fn read_u32(bytes: &[u8], le: bool) -> u32 {
    let quad = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if le {
        u32::from_le_bytes(quad)
    } else {
        u32::from_be_bytes(quad)
    }
}

/// Walk the fixed 16-byte record headers after the pcap global header.
async fn summarize_pcap(
    file: &mut File,
    file_bytes: u64,
    le: bool,
    nanos: bool,
) -> Result<CaptureSummary> {
    let mut header = [0u8; 20];
    file.read_exact(&mut header)
        .await
        .context("truncated pcap global header")?;
    let major = read_u16(&header[0..2], le);
    let minor = read_u16(&header[2..4], le);
    let snap_len = read_u32(&header[12..16], le);
    let link_type = read_u32(&header[16..20], le);

    let mut packets: u64 = 0;
    let mut pos: u64 = 24;
    while pos < file_bytes {
        if file_bytes - pos < 16 {
            bail!("truncated packet record header at byte {pos}");
        }
        let mut record = [0u8; 16];
        file.read_exact(&mut record).await?;
        let incl_len = read_u32(&record[8..12], le) as u64;
        pos += 16;
        if pos + incl_len > file_bytes {
            bail!("packet record at byte {} runs past end of file", pos - 16);
        }
        file.seek(SeekFrom::Current(incl_len as i64)).await?;
        pos += incl_len;
        packets += 1;
    }

    Ok(CaptureSummary {
        format: "pcap",
        endianness: if le { "little" } else { "big" },
        version: format!("{major}.{minor}"),
        link_type: Some(link_type),
        snap_len: Some(snap_len),
        ts_resolution: Some(if nanos { "nano" } else { "micro" }),
        packets,
        blocks: None,
        file_bytes,
    })
}

/// Walk pcapng blocks: the section header fixes endianness, interface
/// description blocks carry link type and snap length, enhanced/simple
/// packet blocks count as packets.
async fn summarize_pcapng(file: &mut File, file_bytes: u64) -> Result<CaptureSummary> {
    let mut head = [0u8; 8];
    file.read_exact(&mut head)
        .await
        .context("truncated section header block")?;
    let le = match &head[4..8] {
        [0x4d, 0x3c, 0x2b, 0x1a] => true,
        [0x1a, 0x2b, 0x3c, 0x4d] => false,
        _ => bail!("bad byte-order magic in section header"),
    };
    let shb_len = read_u32(&head[0..4], le) as u64;
    if shb_len < 28 || shb_len % 4 != 0 || shb_len > file_bytes {
        bail!("invalid section header length {shb_len}");
    }
    let mut version = [0u8; 4];
    file.read_exact(&mut version)
        .await
        .context("truncated section header block")?;
    let major = read_u16(&version[0..2], le);
    let minor = read_u16(&version[2..4], le);

    file.seek(SeekFrom::Start(shb_len)).await?;
    let mut pos = shb_len;
    let mut blocks: u64 = 1;
    let mut packets: u64 = 0;
    let mut link_type: Option<u32> = None;
    let mut snap_len: Option<u32> = None;

    while pos < file_bytes {
        if file_bytes - pos < 8 {
            bail!("truncated block header at byte {pos}");
        }
        let mut head = [0u8; 8];
        file.read_exact(&mut head).await?;
        let block_type = read_u32(&head[0..4], le);
        let block_len = read_u32(&head[4..8], le) as u64;
        if block_len < 12 || block_len % 4 != 0 || pos + block_len > file_bytes {
            bail!("invalid block length {block_len} at byte {pos}");
        }

        match block_type {
            // Interface description: first one fixes link type and snap length.
            0x0000_0001 if link_type.is_none() && block_len >= 20 => {
                let mut body = [0u8; 8];
                file.read_exact(&mut body).await?;
                link_type = Some(read_u16(&body[0..2], le) as u32);
                snap_len = Some(read_u32(&body[4..8], le));
            }
            // Enhanced, simple, and obsolete packet blocks.
            0x0000_0006 | 0x0000_0003 | 0x0000_0002 => packets += 1,
            _ => {}
        }

        pos += block_len;
        blocks += 1;
        file.seek(SeekFrom::Start(pos)).await?;
    }

    Ok(CaptureSummary {
        format: "pcapng",
        endianness: if le { "little" } else { "big" },
        version: format!("{major}.{minor}"),
        link_type,
        snap_len,
        ts_resolution: None,
        packets,
        blocks: Some(blocks),
        file_bytes,
    })
}

#[async_trait]
impl Tool for CaptureInfoTool {
    fn name(&self) -> &str {
        "capture_info"
    }

    fn description(&self) -> &str {
        "Summarize a pcap or pcapng capture file: format, link type, snap length, and packet count."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the capture file"
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

        let mut file = File::open(path)
            .await
            .with_context(|| format!("cannot open {path}"))?;
        let file_bytes = file
            .metadata()
            .await
            .with_context(|| format!("cannot stat {path}"))?
            .len();

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .await
            .with_context(|| format!("{path} is too short to be a capture file"))?;

        let summary = match magic {
            [0xd4, 0xc3, 0xb2, 0xa1] => summarize_pcap(&mut file, file_bytes, true, false).await,
            [0xa1, 0xb2, 0xc3, 0xd4] => summarize_pcap(&mut file, file_bytes, false, false).await,
            [0x4d, 0x3c, 0xb2, 0xa1] => summarize_pcap(&mut file, file_bytes, true, true).await,
            [0xa1, 0xb2, 0x3c, 0x4d] => summarize_pcap(&mut file, file_bytes, false, true).await,
            [0x0a, 0x0d, 0x0d, 0x0a] => summarize_pcapng(&mut file, file_bytes).await,
            _ => bail!("{path} is not a pcap or pcapng capture"),
        }
        .with_context(|| format!("cannot summarize {path}"))?;

        debug!(
            path,
            format = summary.format,
            packets = summary.packets,
            "Summarized capture"
        );

        Ok(ToolOutput {
            display: Some(summary.display(path)),
            parts: Some(ResponseParts::One(ResponsePart::Part(ContentPart::data(
                summary.to_json(),
            )))),
        })
    }
}
