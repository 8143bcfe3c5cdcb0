//! Converter diagnostic output reader
//!
//! Splits the converter's stderr into records on `\n` or `\r`. ffmpeg ends
//! progress updates with a bare carriage return and copies source metadata
//! verbatim, so records are decoded lossily and capped at [`MAX_LINE_LEN`]
//! bytes. Bytes past the cap are discarded up to the next terminator.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Longest record kept, in bytes
pub const MAX_LINE_LEN: usize = 4096;

/// Record reader over a converter's diagnostic stream
#[derive(Debug)]
pub struct DiagnosticLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> DiagnosticLines<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_LINE_LEN)
    }

    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
            max_len: max_len.max(1),
        }
    }

    /// Next non-empty record, `None` at end of stream
    ///
    /// Cancel safe: a partially read record is kept for the next call.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_record()));
            }

            let end = available.iter().position(|b| *b == b'\n' || *b == b'\r');
            let chunk = &available[..end.unwrap_or(available.len())];
            let room = self.max_len.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

            match end {
                Some(pos) => {
                    self.reader.consume(pos + 1);
                    // `\r\n` and blank lines yield nothing
                    if !self.buf.is_empty() {
                        return Ok(Some(self.take_record()));
                    }
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_record(&mut self) -> String {
        let record = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        record
    }
}
