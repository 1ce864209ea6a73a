//! Listening sessions.
//!
//! A [`ListenConnection`] runs the ingest task for one byte source and hands out its
//! rounds, counters and shared history. Dropping the connection stops the task.

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ListenConfig;
use crate::driver::Driver;
use crate::history::SharedHistory;
use crate::pipeline::{IngestStats, Pipeline};
use crate::provider::Provider;
use crate::providers::ReaderProvider;
use crate::stream::ThrottleExt;
use crate::topology::Network;
use crate::types::{Round, TimestampFormat, UpdateRate};
use crate::Result;


/// A running listening session
pub struct ListenConnection {
    /// Handed to the first `rounds()` caller so it sees the session from the start
    first_rounds: Mutex<Option<broadcast::Receiver<Arc<Round>>>>,
    round_source: broadcast::WeakSender<Arc<Round>>,
    latest: watch::Receiver<Option<Arc<Round>>>,
    stats: watch::Receiver<IngestStats>,
    network: Arc<Network>,
    history: Option<SharedHistory>,
    timestamp: TimestampFormat,
    cancel: CancellationToken,
}

impl ListenConnection {
    /// Listen on a serial device node or replay a capture file.
    ///
    /// # Errors
    ///
    /// Configuration errors and a source that cannot be opened are reported here;
    /// problems with individual packets are not.
    pub async fn open<P: AsRef<Path>>(path: P, config: &ListenConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        info!(path = %path.display(), "Opening listen connection");

        let provider = ReaderProvider::open(path).await?.with_window(config.framer_window);
        Self::from_provider(provider, config)
    }

    /// Run a session over any packet provider.
    pub fn from_provider<P: Provider>(provider: P, config: &ListenConfig) -> Result<Self> {
        let pipeline = Pipeline::from_config(config)?;
        let network = Arc::clone(pipeline.network());
        let history = config.history(&network)?.map(|buffer| Arc::new(Mutex::new(buffer)));

        let channels =
            Driver::spawn(provider, pipeline, config.round_buffer, history.as_ref().map(Arc::clone));

        info!(
            links = network.num_links_subset(),
            of = network.num_links_all(),
            order = %network.order(),
            history = config.history_depth.unwrap_or(0),
            "Listen connection ready"
        );

        Ok(Self {
            first_rounds: Mutex::new(Some(channels.rounds)),
            round_source: channels.round_source,
            latest: channels.latest,
            stats: channels.stats,
            network,
            history,
            timestamp: config.timestamp,
            cancel: channels.cancel,
        })
    }

    /// Every round, in order, until the byte source ends.
    ///
    /// The first call sees the session from its start; later calls start at the next
    /// round. A subscriber that falls too far behind skips ahead and logs how many
    /// rounds it missed.
    pub fn rounds(&self) -> BoxStream<'static, Arc<Round>> {
        let first = self.first_rounds.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        // Once the ingest task has ended there is nothing left to subscribe to
        let Some(receiver) = first.or_else(|| self.round_source.upgrade().map(|tx| tx.subscribe())) else {
            return stream::empty().boxed();
        };

        BroadcastStream::new(receiver)
            .filter_map(|item| async move {
                match item {
                    Ok(round) => Some(round),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!(missed, "Round subscriber fell behind");
                        None
                    }
                }
            })
            .boxed()
    }

    /// The newest round at up to `rate`, skipping rounds in between.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, Arc<Round>> {
        let latest = WatchStream::new(self.latest.clone()).filter_map(|opt| async move { opt });

        match rate.normalize().throttle_interval() {
            None => latest.boxed(),
            Some(period) => latest.throttle(period).boxed(),
        }
    }

    /// The most recent round, if any has closed yet.
    pub fn latest(&self) -> Option<Arc<Round>> {
        self.latest.borrow().clone()
    }

    /// Current session counters.
    pub fn stats(&self) -> IngestStats {
        *self.stats.borrow()
    }

    /// Session counters as they change.
    pub fn stats_updates(&self) -> impl Stream<Item = IngestStats> + 'static {
        WatchStream::new(self.stats.clone())
    }

    /// The rolling history, when the session was configured with a depth.
    pub fn history(&self) -> Option<SharedHistory> {
        self.history.as_ref().map(Arc::clone)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn timestamp_format(&self) -> TimestampFormat {
        self.timestamp
    }

    /// Stop the ingest task. Streams end once it has wound down.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ListenConnection {
    fn drop(&mut self) {
        debug!("Dropping listen connection");
        self.cancel.cancel();
    }
}
