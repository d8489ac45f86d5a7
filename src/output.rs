//! Tagged Output Writer (C1): prefixes each line of remote output with a colored,
//! fixed-width node label and filters the echoed sudo password prompt.

use std::io::Write;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use owo_colors::{AnsiColors, OwoColorize};

use crate::node::Color;

/// Substring the remote shell echoes back while waiting for a sudo password; lines
/// containing it never reach the terminal.
const SUDO_PROMPT_MARKER: &str = "[sudo] password for";

/// Field width of the node label, including the trailing `..` used on truncation.
const LABEL_WIDTH: usize = 10;

/// Process-wide lock serializing line emission across concurrently writing nodes, so
/// two nodes' lines never interleave mid-line.
static OUTPUT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn to_ansi_color(color: Color) -> AnsiColors {
    match color {
        Color::Red => AnsiColors::Red,
        Color::Green => AnsiColors::Green,
        Color::Yellow => AnsiColors::Yellow,
        Color::Blue => AnsiColors::Blue,
        Color::Magenta => AnsiColors::Magenta,
        Color::Cyan => AnsiColors::Cyan,
        Color::White => AnsiColors::White,
    }
}

/// Right-pads or truncates `name` to exactly [`LABEL_WIDTH`] characters, truncating to
/// 8 chars + `..` when longer.
pub fn format_label(name: &str) -> String {
    if name.chars().count() > LABEL_WIDTH {
        let truncated: String = name.chars().take(LABEL_WIDTH - 2).collect();
        format!("{truncated}..")
    } else {
        format!("{name:>width$}", width = LABEL_WIDTH)
    }
}

/// Wraps a byte sink, prefixing every line written to it with `name`'s colored,
/// fixed-width label and dropping blank lines and echoed sudo prompts.
pub struct TaggedWriter<W: Write> {
    label: String,
    color: Color,
    inner: W,
    /// Bytes accumulated since the last newline, carried across `write` calls so a
    /// line split across two writes is still tagged once.
    pending: Vec<u8>,
}

impl<W: Write> TaggedWriter<W> {
    pub fn new(name: &str, color: Color, inner: W) -> Self {
        Self {
            label: format_label(name),
            color,
            inner,
            pending: Vec::new(),
        }
    }

    fn emit_line(&mut self, line: &str) -> std::io::Result<()> {
        if line.is_empty() || line.contains(SUDO_PROMPT_MARKER) {
            return Ok(());
        }
        let _guard = OUTPUT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(
            self.inner,
            "{} | {}",
            self.label.color(to_ansi_color(self.color)),
            line
        )
    }

    /// Flushes any buffered partial line as a final line, used on stream close so the
    /// last unterminated line of output is not silently dropped.
    pub fn finish(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.emit_line(&line)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for TaggedWriter<W> {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).into_owned();
            self.emit_line(&line)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_right_padded_when_short() {
        assert_eq!(format_label("nodeA"), "     nodeA");
        assert_eq!(format_label("nodeA").len(), LABEL_WIDTH);
    }

    #[test]
    fn label_is_truncated_with_ellipsis_when_long() {
        let label = format_label("a-very-long-hostname");
        assert_eq!(label, "a-very-l..");
        assert_eq!(label.len(), LABEL_WIDTH);
    }

    #[test]
    fn write_returns_input_length_not_emitted_length() {
        let mut buf: Vec<u8> = Vec::new();
        let mut w = TaggedWriter::new("nodeA", Color::White, &mut buf);
        let n = w.write(b"hello\nworld\n").unwrap();
        assert_eq!(n, 12);
    }

    #[test]
    fn sudo_prompt_lines_are_suppressed() {
        let mut buf: Vec<u8> = Vec::new();
        let mut w = TaggedWriter::new("nodeA", Color::White, &mut buf);
        w.write_all(b"[sudo] password for pi: \nreal output\n").unwrap();
        let text = strip_ansi(&buf);
        assert!(!text.contains("password for"));
        assert!(text.contains("real output"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut buf: Vec<u8> = Vec::new();
        let mut w = TaggedWriter::new("nodeA", Color::White, &mut buf);
        w.write_all(b"\n\nhello\n").unwrap();
        let lines: Vec<&str> = std::str::from_utf8(&buf).unwrap().lines().collect();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn partial_line_is_buffered_until_newline() {
        let mut buf: Vec<u8> = Vec::new();
        let mut w = TaggedWriter::new("nodeA", Color::White, &mut buf);
        w.write_all(b"hel").unwrap();
        assert!(w.inner.is_empty());
        w.write_all(b"lo\n").unwrap();
        assert!(!w.inner.is_empty());
    }

    fn strip_ansi(bytes: &[u8]) -> String {
        let s = String::from_utf8_lossy(bytes);
        let mut out = String::new();
        let mut in_escape = false;
        for c in s.chars() {
            if c == '\u{1b}' {
                in_escape = true;
                continue;
            }
            if in_escape {
                if c == 'm' {
                    in_escape = false;
                }
                continue;
            }
            out.push(c);
        }
        out
    }
}
