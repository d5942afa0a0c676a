use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::PushConfig;
use crate::connection_manager::{CloseReason, ConnectionHandle, ConnectionRegistry};
use crate::metrics::HeartbeatMetrics;
use crate::push::EncodedFrame;

/// Maximum concurrent heartbeat sends to avoid overwhelming the system
const MAX_CONCURRENT_HEARTBEATS: usize = 1000;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub stale_evicted: usize,
    pub heartbeats_sent: usize,
    pub heartbeat_failures: usize,
}

/// Background task that pings live connections and evicts dead ones.
///
/// Each pass first marks connections idle past the stale threshold without
/// touching the registry, then evicts them, then heartbeats the survivors.
/// A survivor whose heartbeat write fails is evicted on the spot.
pub struct HeartbeatSweeper {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    stale_threshold: Duration,
    send_timeout: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatSweeper {
    pub fn new(
        config: &PushConfig,
        registry: Arc<ConnectionRegistry>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            // `tokio::time::interval` panics on zero
            interval: config.heartbeat_interval().max(MIN_INTERVAL),
            stale_threshold: config.stale_threshold(),
            send_timeout: config.send_timeout(),
            shutdown,
        }
    }

    /// Run sweep passes on a fixed interval until shutdown is signalled
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            stale_threshold_secs = self.stale_threshold.as_secs(),
            "Heartbeat sweeper started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat sweeper received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.sweep().await;
                }
            }
        }

        tracing::info!("Heartbeat sweeper stopped");
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now()).await
    }

    /// Run one pass, judging staleness against `now`
    pub async fn sweep_at(&self, now: Instant) -> SweepReport {
        let start = std::time::Instant::now();
        let connections = self.registry.snapshot_all();
        let mut report = SweepReport {
            scanned: connections.len(),
            ..Default::default()
        };

        if connections.is_empty() {
            return report;
        }

        // Phase 1: mark, without mutating the registry
        let (stale, mut live): (Vec<_>, Vec<_>) = connections
            .into_iter()
            .partition(|handle| self.is_stale(handle, now));

        // Phase 2: evict everything marked that is still idle
        live.extend(self.evict_marked(stale, now, &mut report));

        // Phase 3: heartbeat the survivors
        let frame = EncodedFrame::heartbeat();
        for batch in live.chunks(MAX_CONCURRENT_HEARTBEATS) {
            let results = join_all(batch.iter().map(|handle| self.ping(handle, &frame))).await;
            for sent in results.into_iter().flatten() {
                if sent {
                    report.heartbeats_sent += 1;
                } else {
                    report.heartbeat_failures += 1;
                }
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        HeartbeatMetrics::record_duration_ms(elapsed_ms);
        if report.heartbeat_failures > 0 {
            HeartbeatMetrics::record_failures(report.heartbeat_failures as u64);
        }

        tracing::debug!(
            scanned = report.scanned,
            stale_evicted = report.stale_evicted,
            sent = report.heartbeats_sent,
            failed = report.heartbeat_failures,
            elapsed_ms = elapsed_ms,
            "Heartbeat sweep completed"
        );

        if elapsed_ms > self.interval.as_millis() as u64 / 2 {
            tracing::warn!(
                elapsed_ms = elapsed_ms,
                interval_ms = self.interval.as_millis() as u64,
                connections = report.scanned,
                "Heartbeat sweep took more than 50% of interval"
            );
        }

        report
    }

    fn is_stale(&self, handle: &ConnectionHandle, now: Instant) -> bool {
        handle.idle_for(now) > self.stale_threshold
    }

    /// Evict marked connections, returning those written to since they were marked
    fn evict_marked(
        &self,
        marked: Vec<Arc<ConnectionHandle>>,
        now: Instant,
        report: &mut SweepReport,
    ) -> Vec<Arc<ConnectionHandle>> {
        let mut active_again = Vec::new();

        for handle in marked {
            if !self.is_stale(&handle, now) {
                active_again.push(handle);
                continue;
            }

            if self.registry.remove_connection(&handle, CloseReason::Stale) {
                report.stale_evicted += 1;
                tracing::info!(
                    connection_id = %handle.id,
                    key = %handle.key,
                    idle_secs = handle.idle_for(now).as_secs(),
                    "Evicted stale push connection"
                );
            }
        }

        active_again
    }

    /// Heartbeat one connection. `None` if it was closed since the snapshot.
    async fn ping(&self, handle: &Arc<ConnectionHandle>, frame: &EncodedFrame) -> Option<bool> {
        if !handle.is_open() {
            return None;
        }

        match handle.send(frame, self.send_timeout).await {
            Ok(()) => Some(true),
            Err(e) => {
                tracing::warn!(
                    connection_id = %handle.id,
                    key = %handle.key,
                    error = %e,
                    "Heartbeat write failed, evicting connection"
                );
                self.registry.remove_connection(handle, CloseReason::SendFailed);
                Some(false)
            }
        }
    }
}
