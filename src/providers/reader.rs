//! Provider over any async byte reader (serial device, capture file, socket)

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::provider::Provider;
use crate::wire::{DEFAULT_WINDOW, Framer, Packet};
use crate::{ListenError, Result};

const READ_CHUNK: usize = 4096;

/// Frames packets out of an [`AsyncRead`].
pub struct ReaderProvider<R> {
    reader: R,
    framer: Framer,
    ready: VecDeque<Packet>,
    chunk: Box<[u8]>,
    path: PathBuf,
    /// Pacing for replaying captures at their recorded rate
    pacing: Option<Interval>,
    bytes_read: u64,
    eof: bool,
}

impl ReaderProvider<File> {
    /// Open a device node or capture file.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| ListenError::source_error(path, e))?;
        info!(path = %path.display(), "Opened byte source");
        Ok(Self::new(file).with_path(path))
    }
}

impl<R> ReaderProvider<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            framer: Framer::with_window(DEFAULT_WINDOW),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            path: PathBuf::from("<reader>"),
            pacing: None,
            bytes_read: 0,
            eof: false,
        }
    }

    /// Framer lookahead in bytes.
    pub fn with_window(mut self, window: usize) -> Self {
        self.framer = Framer::with_window(window);
        self
    }

    /// Hand out at most one packet per `period`.
    pub fn with_pacing(mut self, period: Duration) -> Self {
        let mut pacing = interval(period);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.pacing = Some(pacing);
        debug!(?period, "Packet pacing enabled");
        self
    }

    fn with_path(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Bytes held by the framer waiting for a sentinel.
    pub fn pending_bytes(&self) -> usize {
        self.framer.pending().len()
    }
}

#[async_trait::async_trait]
impl<R> Provider for ReaderProvider<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn next_packet(&mut self) -> Result<Option<Packet>> {
        while self.ready.is_empty() {
            if self.eof {
                return Ok(None);
            }

            let n = self
                .reader
                .read(&mut self.chunk)
                .await
                .map_err(|e| ListenError::source_error(&self.path, e))?;
            if n == 0 {
                debug!(
                    bytes_read = self.bytes_read,
                    unframed = self.framer.pending().len(),
                    "Byte source ended"
                );
                self.eof = true;
                continue;
            }

            self.bytes_read += n as u64;
            trace!(n, "Read bytes");
            self.ready.extend(self.framer.feed_slice(&self.chunk[..n]));
        }

        if let Some(pacing) = self.pacing.as_mut() {
            pacing.tick().await;
        }
        Ok(self.ready.pop_front())
    }

    fn framer_overflows(&self) -> u64 {
        self.framer.overflows()
    }
}
