//! Incremental decoding of the analyzer's output stream.
//!
//! The analyzer writes one JSON object per watch cycle to stdout, with no
//! framing. Pipe reads may split one document across several chunks or
//! coalesce several documents into one chunk, so bytes are buffered and
//! complete JSON values are cut out with serde_json's stream deserializer.
//!
//! [`BatchDecoder`] is the synchronous buffer; [`BatchReader`] drives it from
//! an async reader.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::DiagnosticBatch;

/// Maximum buffered bytes (16 MiB) without a complete document.
pub const MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// A document that could not be turned into a [`DiagnosticBatch`].
///
/// All variants are recoverable: the decoder has already discarded the bad
/// bytes and the next call continues with whatever follows.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON in analyzer output: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("analyzer output is not a diagnostics batch: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("analyzer output exceeded {limit} bytes without a complete document")]
    Oversized { limit: usize },
    #[error("analyzer output ended mid-document ({0} bytes discarded)")]
    Truncated(usize),
}

/// Outcome of decoding one document.
pub type Decoded = Result<DiagnosticBatch, DecodeError>;

/// Buffers raw output bytes and yields complete documents.
///
/// Parsing is only attempted once the buffer might hold a whole document:
/// a top-level `}` or `]` has arrived, or a newline has arrived since the
/// last attempt. A large document read in many small chunks is therefore
/// parsed once, not once per chunk.
#[derive(Debug)]
pub struct BatchDecoder {
    buf: Vec<u8>,
    limit: usize,
    scan: Scan,
    attempts: usize,
}

/// Lexical state of the bytes scanned so far, relative to `buf[0]`.
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    closed: bool,
    newline: bool,
}

impl Scan {
    /// Scan forward, stopping right after a value closes at top level.
    fn advance(&mut self, buf: &[u8]) {
        while self.pos < buf.len() && !self.closed {
            let byte = buf[self.pos];
            self.pos += 1;
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    b'\n' => self.newline = true,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.closed = self.depth == 0;
                }
                b'\n' => self.newline = true,
                _ => {}
            }
        }
    }

    fn ready(&self) -> bool {
        self.closed || self.newline
    }
}

impl Default for BatchDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            scan: Scan::default(),
            attempts: 0,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet decoded.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// How many times the buffer has been handed to the JSON parser.
    #[must_use]
    pub fn parse_attempts(&self) -> usize {
        self.attempts
    }

    /// Cut the next complete document out of the buffer.
    ///
    /// Returns `None` when the buffer holds only whitespace or an incomplete
    /// document; feed more bytes and call again.
    pub fn decode_next(&mut self) -> Option<Decoded> {
        self.scan.advance(&self.buf);
        if !self.scan.ready() {
            return self.check_limit();
        }
        self.parse()
    }

    /// Like [`decode_next`](Self::decode_next), but parses whatever is
    /// buffered. For end of stream, when no more bytes can complete it.
    pub fn decode_remaining(&mut self) -> Option<Decoded> {
        self.scan.advance(&self.buf);
        self.parse()
    }

    /// Flush at end of stream: any non-whitespace left over is a truncated
    /// document.
    pub fn finish(&mut self) -> Option<DecodeError> {
        let leftover = self
            .buf
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .count();
        let len = self.buf.len();
        self.clear();
        (leftover > 0).then_some(DecodeError::Truncated(len))
    }

    fn parse(&mut self) -> Option<Decoded> {
        self.attempts += 1;
        let (result, consumed) = {
            let mut stream =
                serde_json::Deserializer::from_slice(&self.buf).into_iter::<serde_json::Value>();
            let result = stream.next();
            (result, stream.byte_offset())
        };

        match result {
            None => {
                self.clear();
                None
            }
            Some(Ok(value)) => {
                self.consume(consumed);
                Some(DiagnosticBatch::from_value(value).map_err(DecodeError::Shape))
            }
            Some(Err(e)) if e.is_eof() => {
                // Wait for the next close or newline before trying again.
                self.scan.closed = false;
                self.scan.newline = false;
                self.check_limit()
            }
            Some(Err(e)) => {
                // `consumed` is where the bad document starts. Resync at the
                // next line; analyzers terminate documents with a newline.
                let start = consumed.min(self.buf.len());
                match self.buf[start..].iter().position(|&b| b == b'\n') {
                    Some(rel) => self.consume(start + rel + 1),
                    None => self.clear(),
                }
                Some(Err(DecodeError::Syntax(e)))
            }
        }
    }

    fn check_limit(&mut self) -> Option<Decoded> {
        if self.buf.len() <= self.limit {
            return None;
        }
        self.clear();
        Some(Err(DecodeError::Oversized { limit: self.limit }))
    }

    fn consume(&mut self, len: usize) {
        self.buf.drain(..len);
        self.scan = Scan::default();
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.scan = Scan::default();
    }
}

/// Reads [`DiagnosticBatch`]es from an async reader (the analyzer's stdout).
pub struct BatchReader<R> {
    reader: R,
    decoder: BatchDecoder,
    chunk: Box<[u8]>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> BatchReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_decoder(reader, BatchDecoder::new())
    }

    pub fn with_decoder(reader: R, decoder: BatchDecoder) -> Self {
        Self {
            reader,
            decoder,
            chunk: vec![0u8; READ_CHUNK_BYTES].into_boxed_slice(),
            eof: false,
        }
    }

    /// Read the next document.
    ///
    /// Returns `Ok(None)` on EOF, `Ok(Some(Err(_)))` for a recoverable bad
    /// document, and `Err` only when the underlying read fails.
    pub async fn read_batch(&mut self) -> Result<Option<Decoded>> {
        loop {
            if let Some(decoded) = self.decoder.decode_next() {
                return Ok(Some(decoded));
            }
            if self.eof {
                if let Some(decoded) = self.decoder.decode_remaining() {
                    return Ok(Some(decoded));
                }
                return Ok(self.decoder.finish().map(Err));
            }

            let n = self
                .reader
                .read(&mut self.chunk)
                .await
                .context("reading analyzer output")?;
            if n == 0 {
                self.eof = true;
            } else {
                self.decoder.extend(&self.chunk[..n]);
            }
        }
    }
}
