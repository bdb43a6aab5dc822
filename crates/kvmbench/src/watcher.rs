//! Line watcher for candidate output.
//!
//! A spawned task reads the candidate's readiness stream line by line, echoes
//! every line to the log and fires a one-shot signal on the first line that
//! satisfies the [`ReadyPattern`]. It keeps draining after that so the
//! candidate never blocks on a full pipe. The other stream is drained by
//! [`echo_lines`], which only logs.

use kvmbench_core::{Error, OutputStream, ReadyPattern, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Resolves with the first matching line.
pub struct ReadySignal {
    rx: oneshot::Receiver<String>,
    pattern: String,
}

impl ReadySignal {
    /// Waits for the readiness line.
    ///
    /// Fails with [`Error::ReadinessStreamClosed`] if the stream ends first.
    pub async fn wait(self) -> Result<String> {
        self.rx
            .await
            .map_err(|_| Error::ReadinessStreamClosed {
                pattern: self.pattern,
            })
    }
}

/// Starts draining `reader` on a background task.
///
/// Dropping the returned handle does not stop the task; call `abort` on it.
pub fn watch_lines<R>(reader: R, pattern: ReadyPattern, label: String) -> (ReadySignal, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let signal = ReadySignal {
        rx,
        pattern: pattern.to_string(),
    };

    let task = tokio::spawn(async move {
        let mut lines = LineReader::new(reader);
        let mut tx = Some(tx);

        while let Some(line) = lines.next_line(&label).await {
            tracing::info!(case = %label, "{}", line);

            if tx.is_some() && pattern.matches(&line) {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(line);
                }
            }
        }
    });

    (signal, task)
}

/// Drains `reader` on a background task, logging every line.
pub fn echo_lines<R>(reader: R, stream: OutputStream, label: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LineReader::new(reader);
        while let Some(line) = lines.next_line(&label).await {
            tracing::info!(case = %label, %stream, "{}", line);
        }
    })
}

struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    // None at EOF or on a read error.
    async fn next_line(&mut self, label: &str) -> Option<String> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(0) => None,
            Ok(_) => Some(decode_latin1(&self.buf)),
            Err(e) => {
                tracing::debug!(case = %label, "output stream read failed: {}", e);
                None
            }
        }
    }
}

/// Decodes one output line as Latin-1, which maps every byte to a char and
/// therefore cannot fail. The line terminator is stripped.
pub fn decode_latin1(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    bytes.iter().map(|&b| b as char).collect()
}
