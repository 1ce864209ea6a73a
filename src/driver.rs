//! Driver spawns and manages the ingest task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::history::SharedHistory;
use crate::pipeline::{IngestStats, Pipeline};
use crate::provider::Provider;
use crate::types::Round;

const MAX_ERRORS: u32 = 10;

/// Result of spawning the ingest task
pub struct DriverChannels {
    /// Every round, in order, from the first one published
    pub rounds: broadcast::Receiver<Arc<Round>>,
    /// Subscribes later receivers while the task runs; dead once it has ended
    pub round_source: broadcast::WeakSender<Arc<Round>>,
    /// The most recent round
    pub latest: watch::Receiver<Option<Arc<Round>>>,
    /// Session counters, updated per packet
    pub stats: watch::Receiver<IngestStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the ingest task
///
/// The task owns the provider and the pipeline. The provider read is its only
/// suspension point besides the round deadline; once a packet is framed it is decoded
/// and accumulated before cancellation is looked at again.
pub struct Driver;

impl Driver {
    /// Spawn the ingest task for `provider`.
    ///
    /// Each `rounds` receiver buffers up to `round_buffer` rounds. When `history` is
    /// given every published round is appended to it.
    pub fn spawn<P>(
        provider: P,
        pipeline: Pipeline,
        round_buffer: usize,
        history: Option<SharedHistory>,
    ) -> DriverChannels
    where
        P: Provider,
    {
        let (rounds_tx, rounds_rx) = broadcast::channel(round_buffer.max(1));
        let (latest_tx, latest_rx) = watch::channel(None);
        let (stats_tx, stats_rx) = watch::channel(IngestStats::default());
        let cancel = CancellationToken::new();
        let round_source = rounds_tx.downgrade();

        let publisher = Publisher { rounds: rounds_tx, latest: latest_tx, stats: stats_tx, history };
        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::ingest_task(provider, pipeline, publisher, cancel_task).await;
        });

        DriverChannels { rounds: rounds_rx, round_source, latest: latest_rx, stats: stats_rx, cancel }
    }

    async fn ingest_task<P>(
        mut provider: P,
        pipeline: Pipeline,
        publisher: Publisher,
        cancel: CancellationToken,
    ) where
        P: Provider,
    {
        info!(
            links = pipeline.network().num_links_subset(),
            order = %pipeline.network().order(),
            "Ingest task started"
        );
        // Round timestamps follow the runtime clock so paused-time tests stay consistent
        let mut pipeline = pipeline.starting_at(Instant::now().into_std());
        let mut error_count = 0u32;

        loop {
            if cancel.is_cancelled() {
                info!("Ingest cancelled");
                break;
            }

            let deadline = pipeline.deadline();
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Ingest cancelled during read");
                    break;
                }
                _ = wait_until(deadline) => {
                    if let Some(round) = pipeline.expire_at(Instant::now().into_std()) {
                        if !publisher.round(round, pipeline.stats()) {
                            break;
                        }
                    }
                    continue;
                }
                result = provider.next_packet() => result,
            };

            match result {
                Ok(Some(packet)) => {
                    error_count = 0;
                    trace!(len = packet.len(), "Packet framed");

                    let rounds = pipeline.ingest_at(&packet, Instant::now().into_std());
                    pipeline.set_framer_overflows(provider.framer_overflows());
                    publisher.stats(pipeline.stats());

                    if !rounds.into_iter().all(|round| publisher.round(round, pipeline.stats())) {
                        debug!("Round receivers dropped, shutting down");
                        break;
                    }
                }
                Ok(None) => {
                    if let Some(round) = pipeline.finish_at(Instant::now().into_std()) {
                        publisher.round(round, pipeline.stats());
                    }
                    let stats = pipeline.stats();
                    info!(
                        packets = stats.packets,
                        discarded = stats.discarded(),
                        rounds = stats.rounds(),
                        "Byte source ended"
                    );
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!(rounds = pipeline.stats().rounds(), "Ingest task ended");
    }
}

async fn wait_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

struct Publisher {
    rounds: broadcast::Sender<Arc<Round>>,
    latest: watch::Sender<Option<Arc<Round>>>,
    stats: watch::Sender<IngestStats>,
    history: Option<SharedHistory>,
}

impl Publisher {
    /// Returns false once nobody is listening any more.
    fn round(&self, round: Round, stats: IngestStats) -> bool {
        debug!(
            sequence = round.sequence,
            reason = ?round.reason,
            present = round.present_count(),
            "Publishing round"
        );

        if let Some(history) = &self.history {
            let mut history = history.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = history.add(&round.values) {
                warn!(error = %e, "Round not added to history");
            }
        }

        let round = Arc::new(round);
        // No subscribers is fine; the watch below detects a dropped connection
        let _ = self.rounds.send(Arc::clone(&round));
        self.stats(stats);
        self.latest.send(Some(round)).is_ok()
    }

    fn stats(&self, stats: IngestStats) {
        self.stats.send_replace(stats);
    }
}
