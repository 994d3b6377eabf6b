//! Fusion orchestrator: the fixed-rate cycle that owns the track set.
//!
//! All mutation happens inside `cycle`, which runs on one task: drain the
//! per-sensor queues, correlate, apply, age. Producers only enqueue
//! (blocking when their queue is full) and the publisher only forwards
//! staged events, so neither side ever contends with the critical section.

use crate::config::{ConfigError, FusionConfig};
use crate::correlation::CorrelationEngine;
use crate::model::{Detection, SensorType, TrackId, UnifiedTrack};
use crate::track_manager::{DarkShipAlert, SensorCounts, TrackManager};
use pelorus_env::{DetectionQueue, EventSink, FusionContext, QueueSender};
use pelorus_env::EnvError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Top-level fusion process errors.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Everything the fusion process publishes downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FusionEvent {
    /// A track was created or extended this cycle
    TrackUpdate(UnifiedTrack),
    /// A track aged out of the live set
    TrackDropped { track_id: TrackId, at: f64 },
    /// A dark-ship flag was raised or cleared
    DarkShipAlert(DarkShipAlert),
    /// Periodic health record
    Status(StatusRecord),
}

/// Periodic health record, published every `status_interval_cycles` cycles
/// and once more on shutdown (with `running: false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub running: bool,
    pub active_tracks: usize,
    pub confirmed_tracks: usize,
    pub coasting_tracks: usize,
    pub dark_ships: usize,
    pub messages_processed: u64,
    pub correlations_made: u64,
    pub correlations_by_sensor: SensorCounts,
    pub tracks_created: u64,
    pub tracks_dropped: u64,
    pub tracks_merged: u64,
    pub dark_ships_flagged: u64,
    pub errors: u64,
    pub cycle_count: u64,
    pub rate_hz: f64,
    pub uptime_s: f64,
    pub last_cycle_ms: f64,
    pub last_error: Option<String>,
    pub timestamp: f64,
}

/// Per-cycle counts, mainly for tests and the sim runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    pub drained: usize,
    pub created: usize,
    pub updated: usize,
    pub dropped: usize,
    pub alerts: usize,
}

#[derive(Debug, Default)]
struct Counters {
    messages_processed: u64,
    errors: u64,
    cycle_count: u64,
    last_cycle_ms: f64,
    last_error: Option<String>,
}

/// Producer-side handle: per-sensor queue senders plus shutdown.
pub struct FusionHandle {
    senders: BTreeMap<SensorType, QueueSender<Detection>>,
    shutdown_tx: watch::Sender<bool>,
}

impl FusionHandle {
    /// The sender for one sensor stream. Clone freely; senders are cheap.
    pub fn sender(&self, sensor: SensorType) -> QueueSender<Detection> {
        self.senders[&sensor].clone()
    }

    /// Requests shutdown. The orchestrator finishes its in-flight cycle and
    /// flushes a final status record.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Runs the fusion loop against an environment context.
pub struct FusionOrchestrator<C: FusionContext> {
    ctx: Arc<C>,
    config: FusionConfig,
    engine: CorrelationEngine,
    manager: TrackManager,
    queues: Vec<(SensorType, DetectionQueue<Detection>)>,
    publish_tx: mpsc::Sender<FusionEvent>,
    shutdown_rx: watch::Receiver<bool>,
    started_at: Duration,
    counters: Counters,
}

impl<C: FusionContext> FusionOrchestrator<C> {
    /// Builds the orchestrator and spawns its publisher task.
    ///
    /// Fails fast on an invalid configuration; nothing is spawned in that
    /// case.
    pub fn new<S: EventSink<FusionEvent>>(
        ctx: Arc<C>,
        config: FusionConfig,
        sink: Arc<S>,
    ) -> Result<(Self, FusionHandle), FusionError> {
        config.validate()?;

        let mut senders = BTreeMap::new();
        let mut queues = Vec::new();
        for sensor in SensorType::ALL {
            let (tx, rx) = DetectionQueue::bounded(sensor.to_string(), config.queue_capacity);
            senders.insert(sensor, tx);
            queues.push((sensor, rx));
        }

        let (publish_tx, mut publish_rx) = mpsc::channel::<FusionEvent>(config.publish_buffer);
        ctx.spawn("publisher", async move {
            while let Some(event) = publish_rx.recv().await {
                if let Err(e) = sink.publish(event).await {
                    warn!(error = %e, "dropping fusion event");
                }
            }
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let started_at = ctx.now();
        let orchestrator = Self {
            engine: CorrelationEngine::new(config.gates.clone()),
            manager: TrackManager::new(
                config.gates.clone(),
                config.dark.clone(),
                config.sensors,
            ),
            ctx,
            config,
            queues,
            publish_tx,
            shutdown_rx,
            started_at,
            counters: Counters::default(),
        };
        Ok((orchestrator, FusionHandle {
            senders,
            shutdown_tx,
        }))
    }

    /// The live track set (read-only).
    pub fn tracks(&self) -> &BTreeMap<TrackId, UnifiedTrack> {
        self.manager.tracks()
    }

    /// Runs one fusion cycle at `now` (unix seconds): drain, correlate,
    /// apply, age, publish.
    pub fn cycle(&mut self, now: f64) -> CycleReport {
        let cycle_start = self.ctx.now();
        let mut report = CycleReport::default();

        let mut batch: Vec<Detection> = Vec::new();
        for (sensor, queue) in &mut self.queues {
            let drained = queue.drain(self.config.max_batch_per_sensor);
            if !drained.is_empty() {
                debug!(sensor = %sensor, count = drained.len(), "drained detections");
            }
            batch.extend(drained);
        }
        report.drained = batch.len();
        self.counters.messages_processed += batch.len() as u64;

        let assignment = self.engine.correlate(batch, self.manager.tracks());
        let apply = self.manager.apply_assignment(assignment, now);
        report.created = apply.created.len();
        report.updated = apply.updated.len();
        let tick = self.manager.tick(now);
        report.dropped = tick.dropped.len();
        report.alerts = tick.alerts.len();

        // One TrackUpdate per touched track, even when several sensors
        // extended it. A track dropped in the same cycle publishes only the
        // drop.
        let touched: BTreeSet<TrackId> = apply
            .created
            .iter()
            .chain(apply.updated.iter())
            .copied()
            .collect();
        for track_id in touched {
            if let Some(track) = self.manager.get(&track_id) {
                self.stage_event(FusionEvent::TrackUpdate(track.clone()));
            }
        }
        for alert in tick.alerts {
            self.stage_event(FusionEvent::DarkShipAlert(alert));
        }
        // Merged duplicates leave the live set the same way drops do.
        for track_id in tick.dropped.into_iter().chain(tick.merged) {
            self.stage_event(FusionEvent::TrackDropped { track_id, at: now });
        }

        self.counters.cycle_count += 1;
        self.counters.last_cycle_ms =
            (self.ctx.now().saturating_sub(cycle_start)).as_secs_f64() * 1000.0;
        if self.counters.cycle_count % self.config.status_interval_cycles == 0 {
            let record = self.status_record(now, true);
            self.stage_event(FusionEvent::Status(record));
        }
        report
    }

    /// Runs the fixed-rate loop until shutdown is requested, then flushes a
    /// final status record.
    pub async fn run(mut self) {
        let period = Duration::from_secs_f64(1.0 / self.config.cycle_hz);
        info!(
            rate_hz = self.config.cycle_hz,
            seed = self.ctx.seed(),
            "fusion orchestrator running"
        );
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            let start = self.ctx.now();
            let now = self.ctx.unix_secs();
            self.cycle(now);
            let elapsed = self.ctx.now().saturating_sub(start);
            match period.checked_sub(elapsed) {
                Some(remaining) => self.ctx.sleep(remaining).await,
                None => {
                    debug!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        "cycle overran its period"
                    );
                }
            }
        }
        let now = self.ctx.unix_secs();
        let record = self.status_record(now, false);
        self.stage_event(FusionEvent::Status(record));
        info!(cycles = self.counters.cycle_count, "fusion orchestrator stopped");
    }

    /// Stages an event for the publisher task. Never blocks the cycle; a
    /// full buffer counts an error and the event is lost.
    fn stage_event(&mut self, event: FusionEvent) {
        if let Err(e) = self.publish_tx.try_send(event) {
            self.counters.errors += 1;
            self.counters.last_error = Some("publish buffer full".to_string());
            warn!(error = %e, "publish buffer full, event lost");
        }
    }

    fn status_record(&self, now: f64, running: bool) -> StatusRecord {
        let counts = self.manager.status_counts();
        let stats = self.manager.stats();
        StatusRecord {
            running,
            active_tracks: counts.active,
            confirmed_tracks: counts.confirmed,
            coasting_tracks: counts.coasting,
            dark_ships: counts.dark,
            messages_processed: self.counters.messages_processed,
            correlations_made: stats.correlations.total(),
            correlations_by_sensor: stats.correlations,
            tracks_created: stats.tracks_created,
            tracks_dropped: stats.tracks_dropped,
            tracks_merged: stats.tracks_merged,
            dark_ships_flagged: stats.dark_ships_flagged,
            errors: self.counters.errors,
            cycle_count: self.counters.cycle_count,
            rate_hz: self.config.cycle_hz,
            uptime_s: self.ctx.now().saturating_sub(self.started_at).as_secs_f64(),
            last_cycle_ms: self.counters.last_cycle_ms,
            last_error: self.counters.last_error.clone(),
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPos, SensorData};
    use pelorus_env::{MemorySink, TokioContext};

    fn radar_detection(lon: f64, at: f64) -> Detection {
        Detection {
            position: GeoPos::new(0.0, lon),
            speed_knots: None,
            course_deg: None,
            position_uncertainty_m: 500.0,
            observed_at: at,
            data: SensorData::Radar {
                station_id: "RAD-1".into(),
                quality: 7,
            },
        }
    }

    fn ais_detection(lon: f64, at: f64) -> Detection {
        Detection {
            position: GeoPos::new(0.0, lon),
            speed_knots: Some(8.0),
            course_deg: Some(90.0),
            position_uncertainty_m: 10.0,
            observed_at: at,
            data: SensorData::Ais {
                mmsi: "419000555".into(),
                ship_name: None,
                vessel_type: None,
            },
        }
    }

    async fn settle() {
        // Let the publisher task drain its channel
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = FusionConfig::default();
        config.cycle_hz = 0.0;
        let result = FusionOrchestrator::new(
            Arc::new(TokioContext::new()),
            config,
            MemorySink::<FusionEvent>::shared(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_capacities_fail_at_startup() {
        // Zero-sized channels and a zero status interval must be caught by
        // validation, before any channel is constructed.
        for mutate in [
            (|c: &mut FusionConfig| c.queue_capacity = 0) as fn(&mut FusionConfig),
            |c| c.publish_buffer = 0,
            |c| c.status_interval_cycles = 0,
        ] {
            let mut config = FusionConfig::default();
            mutate(&mut config);
            let result = FusionOrchestrator::new(
                Arc::new(TokioContext::new()),
                config,
                MemorySink::<FusionEvent>::shared(),
            );
            assert!(matches!(result, Err(FusionError::Config(_))));
        }
    }

    #[tokio::test]
    async fn test_detection_flows_to_track_update() {
        let sink = MemorySink::<FusionEvent>::shared();
        let (mut orch, handle) = FusionOrchestrator::new(
            Arc::new(TokioContext::new()),
            FusionConfig::default(),
            sink.clone(),
        )
        .unwrap();

        handle
            .sender(SensorType::Radar)
            .send(radar_detection(0.0, 100.0))
            .await
            .unwrap();
        let report = orch.cycle(100.0);
        assert_eq!(report.drained, 1);
        assert_eq!(report.created, 1);

        settle().await;
        let events = sink.events();
        assert!(matches!(events.as_slice(), [FusionEvent::TrackUpdate(t)]
            if t.update_count == 1));
    }

    #[tokio::test]
    async fn test_two_sensors_one_update_event() {
        let sink = MemorySink::<FusionEvent>::shared();
        let (mut orch, handle) = FusionOrchestrator::new(
            Arc::new(TokioContext::new()),
            FusionConfig::default(),
            sink.clone(),
        )
        .unwrap();

        handle
            .sender(SensorType::Ais)
            .send(ais_detection(0.0, 100.0))
            .await
            .unwrap();
        orch.cycle(100.0);
        handle
            .sender(SensorType::Ais)
            .send(ais_detection(0.0005, 130.0))
            .await
            .unwrap();
        handle
            .sender(SensorType::Radar)
            .send(radar_detection(0.0005, 130.0))
            .await
            .unwrap();
        let report = orch.cycle(130.0);
        assert_eq!(report.drained, 2);
        assert_eq!(report.updated, 2, "both sensors extend the track");
        assert_eq!(orch.tracks().len(), 1);

        settle().await;
        let updates = sink
            .events()
            .iter()
            .filter(|e| matches!(e, FusionEvent::TrackUpdate(_)))
            .count();
        // One from the first cycle, one (deduplicated) from the second
        assert_eq!(updates, 2);
    }

    #[tokio::test]
    async fn test_drop_event_published() {
        let sink = MemorySink::<FusionEvent>::shared();
        let (mut orch, handle) = FusionOrchestrator::new(
            Arc::new(TokioContext::new()),
            FusionConfig::default(),
            sink.clone(),
        )
        .unwrap();

        handle
            .sender(SensorType::Radar)
            .send(radar_detection(0.0, 100.0))
            .await
            .unwrap();
        orch.cycle(100.0);
        let report = orch.cycle(800.0); // quiet 700 s
        assert_eq!(report.dropped, 1);
        assert!(orch.tracks().is_empty());

        settle().await;
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, FusionEvent::TrackDropped { .. })));
    }

    #[tokio::test]
    async fn test_status_record_on_interval() {
        let sink = MemorySink::<FusionEvent>::shared();
        let mut config = FusionConfig::default();
        config.status_interval_cycles = 2;
        let (mut orch, _handle) = FusionOrchestrator::new(
            Arc::new(TokioContext::new()),
            config,
            sink.clone(),
        )
        .unwrap();

        orch.cycle(100.0);
        orch.cycle(100.5);
        settle().await;

        let statuses: Vec<StatusRecord> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                FusionEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].cycle_count, 2);
        assert!(statuses[0].running);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_final_status() {
        let sink = MemorySink::<FusionEvent>::shared();
        let mut config = FusionConfig::default();
        config.cycle_hz = 100.0; // fast cycles so the test stays short
        let (orch, handle) = FusionOrchestrator::new(
            Arc::new(TokioContext::new()),
            config,
            sink.clone(),
        )
        .unwrap();

        let task = tokio::spawn(orch.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();
        task.await.unwrap();
        settle().await;

        let final_status = sink
            .events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                FusionEvent::Status(s) => Some(s),
                _ => None,
            })
            .expect("final status record");
        assert!(!final_status.running);
        assert!(final_status.cycle_count > 0);
    }
}
