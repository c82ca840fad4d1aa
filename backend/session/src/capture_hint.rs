//! Packet-capture prompt hint.
//!
//! When the user's input names a capture file, the opening message carries an
//! extra instruction fragment so the agent inspects captures before loading
//! bytes.

const CAPTURE_EXTENSIONS: [&str; 3] = [".pcap", ".pcapng", ".cap"];

const CAPTURE_HINT: &str = "\
The request involves one or more packet capture files. Before reading any \
capture bytes, call the capture_info tool on each file to learn its format, \
link type, snap length, and packet count. Work from summaries and filtered \
views rather than raw payloads, and never print raw packet bytes unless the \
user explicitly asks for them.";

/// The system-prompt fragment for capture-file handling.
pub fn capture_hint() -> &'static str {
    CAPTURE_HINT
}

/// Whether the input text references a capture file by path.
pub fn references_capture(input: &str) -> bool {
    input
        .split_whitespace()
        .map(|token| token.trim_end_matches(|c: char| "\"'`,;:?!()[]".contains(c)))
        .map(|token| token.trim_start_matches(|c: char| "\"'`([".contains(c)))
        .any(|token| {
            let lower = token.to_ascii_lowercase();
            CAPTURE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_capture_paths() {
        assert!(references_capture("summarize /tmp/trace.pcap for me"));
        assert!(references_capture("open 'session.PCAPNG'"));
        assert!(references_capture("what is in dump.cap?"));
    }

    #[test]
    fn ignores_plain_prompts() {
        assert!(!references_capture("hello"));
        assert!(!references_capture("what does pcap stand for"));
        assert!(!references_capture("file.pcaps is not a capture"));
    }
}
