//! Line decoding for process output
//!
//! Output is treated as newline-delimited, mostly-UTF-8 text that may arrive
//! in arbitrary chunks. Bytes are buffered until `\n`; each completed line is
//! decoded lossily, stripped of trailing whitespace (which also removes the
//! `\r` of CRLF endings), and dropped if it is blank. Leading indentation is
//! kept so code in the output stays readable.
//!
//! A line never grows past the decoder's cap ([`DEFAULT_MAX_LINE_BYTES`]
//! unless configured). Once the buffered bytes reach the cap they are emitted
//! as a line of their own and decoding carries on with the rest, so a process
//! that never prints `\n` cannot grow the buffer without bound. Splits depend
//! only on the byte count since the last line break, never on how the input
//! was chunked. A split may land inside a multi-byte character, which then
//! decodes as U+FFFD on both sides.

use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Longest line the decoder buffers before forcing a split
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental newline splitter
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    /// Create an empty decoder with the default line cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty decoder that splits lines longer than `max` bytes
    ///
    /// A cap of zero is treated as one.
    pub fn with_max_line_bytes(max: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line: max.max(1),
        }
    }

    /// Feed a chunk and collect every line it completes
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.push(&rest[..pos], &mut lines);
            lines.extend(self.take_line());
            rest = &rest[pos + 1..];
        }

        self.push(rest, &mut lines);
        lines
    }

    /// Flush the unterminated tail at end of stream
    pub fn finish(&mut self) -> Option<String> {
        self.take_line()
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer `bytes`, emitting a forced line each time the cap is reached
    fn push(&mut self, mut bytes: &[u8], lines: &mut Vec<String>) {
        while self.buffer.len() + bytes.len() > self.max_line {
            let room = self.max_line - self.buffer.len();
            self.buffer.extend_from_slice(&bytes[..room]);
            bytes = &bytes[room..];
            trace!(max = self.max_line, "splitting over-long line");
            lines.extend(self.take_line());
        }
        self.buffer.extend_from_slice(bytes);
    }

    fn take_line(&mut self) -> Option<String> {
        let bytes = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&bytes);
        let line = text.trim_end();
        if line.trim_start().is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

/// Async reader yielding one decoded line at a time
///
/// `next_line` is cancel safe: bytes already read stay buffered in the
/// decoder, so dropping the future inside `tokio::select!` loses nothing.
pub struct LineReader<R> {
    reader: R,
    decoder: LineDecoder,
    ready: VecDeque<String>,
    chunk: Box<[u8]>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a byte stream
    pub fn new(reader: R) -> Self {
        Self::with_max_line_bytes(reader, DEFAULT_MAX_LINE_BYTES)
    }

    /// Wrap a byte stream, splitting lines longer than `max` bytes
    pub fn with_max_line_bytes(reader: R, max: usize) -> Self {
        Self {
            reader,
            decoder: LineDecoder::with_max_line_bytes(max),
            ready: VecDeque::new(),
            chunk: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
            eof: false,
        }
    }

    /// Next non-blank line, or `None` once the stream has ended
    ///
    /// A trailing line without a terminator is returned before `None`.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.eof = true;
                if let Some(line) = self.decoder.finish() {
                    return Ok(Some(line));
                }
                continue;
            }

            trace!(bytes = n, pending = self.decoder.pending(), "read process output");
            let lines = self.decoder.decode(&self.chunk[..n]);
            self.ready.extend(lines);
        }
    }
}
