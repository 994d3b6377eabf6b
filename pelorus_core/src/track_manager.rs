//! Track manager: the single mutator of the unified track set.
//!
//! Applies correlation results (inverse-variance position fusion, identity
//! propagation, confirmation), ages tracks through the life-cycle state
//! machine (tentative, confirmed, coasting, dropped) and runs dark-ship
//! detection once per cycle.
//!
//! `tick` is idempotent for a fixed `now`: coasting inflation and dark-ship
//! confidence are pure functions of the track state and the clock, never of
//! how many times the manager was polled.

use crate::config::{CorrelationGates, DarkShipConfig, SensorProfiles};
use crate::correlation::Assignment;
use crate::kinematics::{haversine_m, velocity_between, velocity_from_speed_course};
use crate::model::{
    AlertReason, Detection, GeoPos, IdentitySource, SensorContribution, SensorData, SensorType,
    TrackId, TrackStatus, UnifiedTrack, VesselIdentity,
};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// A dark-ship flag transition, published as an alert.
///
/// `flagged` is true when the flag was raised and false when it cleared;
/// steady state in either direction produces no alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DarkShipAlert {
    pub track_id: TrackId,
    pub position: GeoPos,
    pub confidence: f64,
    pub reason: AlertReason,
    pub flagged: bool,
    pub contributing_sensors: Vec<SensorType>,
    /// Unix seconds of the cycle that produced the transition
    pub timestamp: f64,
}

/// Outcome of applying one cycle's assignment.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub created: Vec<TrackId>,
    /// May name a track more than once when several sensors extended it
    pub updated: Vec<TrackId>,
}

/// Outcome of one aging/dark-ship pass.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub dropped: Vec<TrackId>,
    /// Duplicate tracks absorbed into a surviving track this tick
    pub merged: Vec<TrackId>,
    pub alerts: Vec<DarkShipAlert>,
}

/// Per-sensor-type correlation counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SensorCounts {
    pub ais: u64,
    pub radar: u64,
    pub satellite: u64,
    pub drone: u64,
}

impl SensorCounts {
    pub fn increment(&mut self, sensor: SensorType) {
        match sensor {
            SensorType::Ais => self.ais += 1,
            SensorType::Radar => self.radar += 1,
            SensorType::Satellite => self.satellite += 1,
            SensorType::Drone => self.drone += 1,
        }
    }

    pub fn get(&self, sensor: SensorType) -> u64 {
        match sensor {
            SensorType::Ais => self.ais,
            SensorType::Radar => self.radar,
            SensorType::Satellite => self.satellite,
            SensorType::Drone => self.drone,
        }
    }

    pub fn total(&self) -> u64 {
        self.ais + self.radar + self.satellite + self.drone
    }
}

/// Monotonic counters for status reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerStats {
    pub tracks_created: u64,
    pub tracks_dropped: u64,
    pub tracks_merged: u64,
    pub dark_ships_flagged: u64,
    /// Matched detections applied, per contributing sensor type
    pub correlations: SensorCounts,
}

/// Point-in-time breakdown of the live track set.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCounts {
    pub active: usize,
    pub confirmed: usize,
    pub coasting: usize,
    pub dark: usize,
}

/// Inverse-variance fusion of a track position with a detection position.
///
/// Returns the fused position and the fused 1-sigma error. The fused error
/// is always at most the smaller of the two inputs; callers apply the
/// publication floor separately.
pub fn fuse_position(
    track_pos: GeoPos,
    track_sigma_m: f64,
    det_pos: GeoPos,
    det_sigma_m: f64,
) -> (GeoPos, f64) {
    let w_track = 1.0 / track_sigma_m.powi(2);
    let w_det = 1.0 / det_sigma_m.powi(2);
    let total = w_track + w_det;
    let fused = GeoPos::new(
        (track_pos.lat_deg * w_track + det_pos.lat_deg * w_det) / total,
        (track_pos.lon_deg * w_track + det_pos.lon_deg * w_det) / total,
    );
    (fused, (1.0 / total).sqrt())
}

/// Owns and mutates the unified track set. Never called concurrently; the
/// orchestrator is the only caller.
pub struct TrackManager {
    gates: CorrelationGates,
    dark: DarkShipConfig,
    profiles: SensorProfiles,
    tracks: BTreeMap<TrackId, UnifiedTrack>,
    stats: ManagerStats,
}

impl TrackManager {
    pub fn new(gates: CorrelationGates, dark: DarkShipConfig, profiles: SensorProfiles) -> Self {
        Self {
            gates,
            dark,
            profiles,
            tracks: BTreeMap::new(),
            stats: ManagerStats::default(),
        }
    }

    /// The live track set, keyed by track ID.
    pub fn tracks(&self) -> &BTreeMap<TrackId, UnifiedTrack> {
        &self.tracks
    }

    pub fn get(&self, track_id: &TrackId) -> Option<&UnifiedTrack> {
        self.tracks.get(track_id)
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    /// Point-in-time clone of the live track set.
    pub fn snapshot(&self) -> Vec<UnifiedTrack> {
        self.tracks.values().cloned().collect()
    }

    /// Counts the live set by status for the periodic status record.
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            active: self.tracks.len(),
            ..StatusCounts::default()
        };
        for track in self.tracks.values() {
            match track.status {
                TrackStatus::Confirmed => counts.confirmed += 1,
                TrackStatus::Coasting => counts.coasting += 1,
                _ => {}
            }
            if track.is_dark_ship {
                counts.dark += 1;
            }
        }
        counts
    }

    /// Applies one cycle's correlation result: matched detections fuse into
    /// their tracks, unmatched detections open tentative tracks.
    pub fn apply_assignment(&mut self, assignment: Assignment, now: f64) -> ApplyReport {
        let mut report = ApplyReport::default();
        for m in assignment.matches {
            if self.update_track(m.track_id, m.detection) {
                report.updated.push(m.track_id);
            }
        }
        for detection in assignment.unmatched {
            report.created.push(self.create_track(detection, now));
        }
        report
    }

    /// Ages the track set and re-evaluates dark-ship flags. Duplicate
    /// tracks are merged first so they never confirm or raise alerts.
    pub fn tick(&mut self, now: f64) -> TickReport {
        let mut report = TickReport {
            merged: self.merge_duplicates(),
            ..TickReport::default()
        };
        let mut drop_ids: Vec<TrackId> = Vec::new();

        for (id, track) in self.tracks.iter_mut() {
            if track.contributions.is_empty() {
                error!(track_id = %id, "removing track with no sensor contributions");
                drop_ids.push(*id);
                continue;
            }

            let quiet_s = now - track.updated_at;
            if quiet_s > self.gates.drop_timeout_s {
                drop_ids.push(*id);
                continue;
            }

            if track.status == TrackStatus::Confirmed && quiet_s > self.gates.coasting_timeout_s {
                track.status = TrackStatus::Coasting;
                debug!(track_id = %id, quiet_s, "track coasting");
            }
            if track.status == TrackStatus::Coasting {
                // Pure function of the quiet time, so repeated ticks at the
                // same instant publish the same uncertainty.
                let over_s = (quiet_s - self.gates.coasting_timeout_s).max(0.0);
                track.position_uncertainty_m = (track.base_uncertainty_m
                    * (1.0 + self.gates.coast_inflation_per_s * over_s))
                    .min(self.gates.max_uncertainty_m);
            }

            match (evaluate_dark(&self.dark, track, now), track.is_dark_ship) {
                (Some((reason, confidence)), false) => {
                    track.is_dark_ship = true;
                    track.dark_ship_confidence = confidence;
                    track.alert_reason = Some(reason);
                    self.stats.dark_ships_flagged += 1;
                    warn!(
                        track_id = %id,
                        %reason,
                        confidence,
                        "dark ship flagged"
                    );
                    report.alerts.push(dark_alert(track, reason, confidence, true, now));
                }
                (Some((reason, confidence)), true) => {
                    // Steady dark: keep confidence current, no alert.
                    track.dark_ship_confidence = confidence;
                    track.alert_reason = Some(reason);
                }
                (None, true) => {
                    let reason = track.alert_reason.unwrap_or(AlertReason::AisGap);
                    track.is_dark_ship = false;
                    track.dark_ship_confidence = 0.0;
                    track.alert_reason = None;
                    info!(track_id = %id, "dark ship cleared");
                    report.alerts.push(dark_alert(track, reason, 0.0, false, now));
                }
                (None, false) => {}
            }
        }

        for id in drop_ids {
            if let Some(mut track) = self.tracks.remove(&id) {
                track.status = TrackStatus::Dropped;
                self.stats.tracks_dropped += 1;
                info!(
                    track_id = %id,
                    quiet_s = now - track.updated_at,
                    updates = track.update_count,
                    "track dropped"
                );
                report.dropped.push(id);
            }
        }
        report
    }

    /// Absorbs unidentified tracks that sit inside another track's
    /// association radius.
    ///
    /// A noise outlier past the gate opens a stray track; later outliers
    /// can keep it alive next to the real one. The stray's fused position
    /// converges on the vessel, so once it enters the radius it is folded
    /// into the surviving track instead of confirming as a duplicate.
    /// Two identified tracks are always distinct vessels and never merge.
    fn merge_duplicates(&mut self) -> Vec<TrackId> {
        let mut pairs: Vec<(TrackId, TrackId)> = Vec::new();
        let mut absorbed_ids: std::collections::BTreeSet<TrackId> =
            std::collections::BTreeSet::new();
        let tracks: Vec<&UnifiedTrack> = self.tracks.values().collect();
        for (i, a) in tracks.iter().enumerate() {
            for b in &tracks[i + 1..] {
                if absorbed_ids.contains(&a.track_id) || absorbed_ids.contains(&b.track_id) {
                    continue;
                }
                let Some((keeper, absorbed)) = merge_order(a, b) else {
                    continue;
                };
                let combined = (a.position_uncertainty_m.powi(2)
                    + b.position_uncertainty_m.powi(2))
                .sqrt();
                let radius = (combined * self.gates.sigma_multiplier)
                    .clamp(self.gates.min_gate_m, self.gates.max_gate_m);
                if haversine_m(a.position, b.position) <= radius {
                    absorbed_ids.insert(absorbed);
                    pairs.push((absorbed, keeper));
                }
            }
        }

        let mut merged = Vec::new();
        for (absorbed_id, keeper_id) in pairs {
            let Some(absorbed) = self.tracks.remove(&absorbed_id) else {
                continue;
            };
            if let Some(keeper) = self.tracks.get_mut(&keeper_id) {
                for (sensor, contribution) in absorbed.contributions {
                    keeper
                        .contributions
                        .entry(sensor)
                        .and_modify(|c| {
                            c.count += contribution.count;
                            c.last_detection_at =
                                c.last_detection_at.max(contribution.last_detection_at);
                        })
                        .or_insert(contribution);
                }
                keeper.updated_at = keeper.updated_at.max(absorbed.updated_at);
                keeper.satellite_dark_hint |= absorbed.satellite_dark_hint;
                keeper.quality = quality_score(keeper);
                self.stats.tracks_merged += 1;
                info!(absorbed = %absorbed_id, into = %keeper_id, "duplicate track merged");
                merged.push(absorbed_id);
            }
        }
        merged
    }

    /// Opens a tentative track from an unmatched detection. Tracks are
    /// always born tentative, whatever the confirmation threshold.
    fn create_track(&mut self, detection: Detection, now: f64) -> TrackId {
        let track_id = TrackId::new();
        let sensor = detection.sensor_type();
        let velocity = match (detection.speed_knots, detection.course_deg) {
            (Some(speed), Some(course)) => velocity_from_speed_course(speed, course),
            _ => Vector2::zeros(),
        };
        let uncertainty = detection
            .position_uncertainty_m
            .max(self.gates.min_uncertainty_m);

        let mut track = UnifiedTrack {
            track_id,
            status: TrackStatus::Tentative,
            position: detection.position,
            velocity_ms: velocity,
            position_uncertainty_m: uncertainty,
            base_uncertainty_m: uncertainty,
            speed_knots: detection.speed_knots,
            course_deg: detection.course_deg,
            identity: VesselIdentity::default(),
            identity_source: IdentitySource::Unknown,
            is_dark_ship: false,
            dark_ship_confidence: 0.0,
            alert_reason: None,
            ais_last_seen: None,
            satellite_dark_hint: false,
            contributions: BTreeMap::new(),
            quality: 0,
            created_at: now,
            updated_at: detection.observed_at,
            update_count: 1,
        };
        apply_detection_data(&mut track, &detection);
        track.contributions.insert(
            sensor,
            SensorContribution {
                sensor_type: sensor,
                sensor_id: detection.data.sensor_id().to_string(),
                last_detection_at: detection.observed_at,
                count: 1,
            },
        );
        track.quality = quality_score(&track);

        info!(track_id = %track_id, sensor = %sensor, "track created");
        self.stats.tracks_created += 1;
        self.tracks.insert(track_id, track);
        track_id
    }

    /// Fuses a matched detection into its track.
    fn update_track(&mut self, track_id: TrackId, detection: Detection) -> bool {
        let Some(track) = self.tracks.get_mut(&track_id) else {
            warn!(track_id = %track_id, "match referenced an unknown track");
            return false;
        };
        let sensor = detection.sensor_type();

        track
            .contributions
            .entry(sensor)
            .and_modify(|c| {
                c.sensor_id = detection.data.sensor_id().to_string();
                c.last_detection_at = c.last_detection_at.max(detection.observed_at);
                c.count += 1;
            })
            .or_insert_with(|| SensorContribution {
                sensor_type: sensor,
                sensor_id: detection.data.sensor_id().to_string(),
                last_detection_at: detection.observed_at,
                count: 1,
            });

        // Inverse-variance fusion, floored so the track never claims better
        // accuracy than its best contributing sensor.
        let old_position = track.position;
        let (fused, fused_sigma) = fuse_position(
            track.position,
            track.position_uncertainty_m,
            detection.position,
            detection.position_uncertainty_m,
        );
        let floor = self
            .profiles
            .best_position_error_m(track.contributing_sensors())
            .max(self.gates.min_uncertainty_m);
        track.position = fused;
        track.base_uncertainty_m = fused_sigma.max(floor);
        track.position_uncertainty_m = track.base_uncertainty_m;

        // Velocity from consecutive fused positions, EMA-smoothed. Two
        // sensors in the same cycle contribute position only.
        let dt = detection.observed_at - track.updated_at;
        if let Some(derived) = velocity_between(old_position, fused, dt) {
            let alpha = self.gates.velocity_smoothing;
            track.velocity_ms = derived * alpha + track.velocity_ms * (1.0 - alpha);
        }
        if detection.speed_knots.is_some() {
            track.speed_knots = detection.speed_knots;
        }
        if detection.course_deg.is_some() {
            track.course_deg = detection.course_deg;
        }

        apply_detection_data(track, &detection);
        track.updated_at = track.updated_at.max(detection.observed_at);
        track.update_count += 1;
        self.stats.correlations.increment(sensor);

        match track.status {
            TrackStatus::Coasting => {
                track.status = TrackStatus::Confirmed;
                debug!(track_id = %track_id, "coasting track recovered");
            }
            TrackStatus::Tentative if track.update_count >= self.gates.confirmation_updates => {
                track.status = TrackStatus::Confirmed;
                info!(
                    track_id = %track_id,
                    updates = track.update_count,
                    "track confirmed"
                );
            }
            _ => {}
        }
        track.quality = quality_score(track);
        true
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&mut self, track: UnifiedTrack) {
        self.tracks.insert(track.track_id, track);
    }
}

/// Merge precedence for a duplicate pair: `Some((keeper, absorbed))`, or
/// `None` when both tracks carry an MMSI (distinct vessels by definition).
/// An identified track always survives; between two unidentified tracks the
/// one with more history does.
fn merge_order(a: &UnifiedTrack, b: &UnifiedTrack) -> Option<(TrackId, TrackId)> {
    match (a.identity.mmsi.is_some(), b.identity.mmsi.is_some()) {
        (true, true) => None,
        (true, false) => Some((a.track_id, b.track_id)),
        (false, true) => Some((b.track_id, a.track_id)),
        (false, false) => {
            let a_wins = a.update_count > b.update_count
                || (a.update_count == b.update_count && a.created_at <= b.created_at);
            if a_wins {
                Some((a.track_id, b.track_id))
            } else {
                Some((b.track_id, a.track_id))
            }
        }
    }
}

/// Propagates sensor payload fields onto the track. AIS identity is
/// authoritative; drone visual identity never overwrites it.
fn apply_detection_data(track: &mut UnifiedTrack, detection: &Detection) {
    match &detection.data {
        SensorData::Ais {
            mmsi,
            ship_name,
            vessel_type,
        } => {
            track.identity.mmsi = Some(mmsi.clone());
            if ship_name.is_some() {
                track.identity.name = ship_name.clone();
            }
            if vessel_type.is_some() {
                track.identity.vessel_type = vessel_type.clone();
            }
            track.identity_source = IdentitySource::Ais;
            track.ais_last_seen = Some(match track.ais_last_seen {
                Some(t) => t.max(detection.observed_at),
                None => detection.observed_at,
            });
        }
        SensorData::Drone {
            object_class,
            estimated_length_m,
            visual_id,
            ..
        } => {
            if track.identity_source != IdentitySource::Ais {
                if let Some(id) = visual_id {
                    track.identity.name.get_or_insert_with(|| id.clone());
                    track.identity_source = IdentitySource::Visual;
                }
            }
            if track.identity.vessel_type.is_none() {
                track.identity.vessel_type = object_class.clone();
            }
            if track.identity.length_m.is_none() {
                track.identity.length_m = *estimated_length_m;
            }
        }
        SensorData::Satellite {
            vessel_length_m,
            dark_flag,
            ..
        } => {
            if *dark_flag {
                track.satellite_dark_hint = true;
            }
            if track.identity.length_m.is_none() {
                track.identity.length_m = *vessel_length_m;
            }
        }
        SensorData::Radar { .. } => {}
    }
}

/// Decides whether a track should carry a dark-ship flag right now.
///
/// Two independent rules:
/// * AIS gap: an AIS-identified vessel has gone silent past the gap
///   threshold while a non-cooperative sensor still holds contact.
/// * Never cooperative: an unidentified vessel corroborated by multiple
///   non-cooperative sensor types, a drone visual, or a satellite dark hint.
fn evaluate_dark(
    cfg: &DarkShipConfig,
    track: &UnifiedTrack,
    now: f64,
) -> Option<(AlertReason, f64)> {
    if track.identity_source == IdentitySource::Ais {
        let gap_s = track.ais_gap_s(now)?;
        if gap_s > cfg.ais_gap_threshold_s
            && track.has_recent_noncooperative(now, cfg.recent_noncoop_window_s)
        {
            let gap_component = (gap_s / cfg.gap_saturation_s).min(1.0);
            let confidence = (gap_component + sensor_boosts(cfg, track)).min(1.0);
            return Some((AlertReason::AisGap, confidence));
        }
        return None;
    }

    let noncoop: Vec<SensorType> = track.noncooperative_sensors().collect();
    let corroborated = noncoop.len() >= cfg.min_noncoop_sensors
        || noncoop.contains(&SensorType::Drone)
        || (track.satellite_dark_hint && !noncoop.is_empty());
    if !corroborated {
        return None;
    }
    let confidence = (0.5 + sensor_boosts(cfg, track)).min(1.0);
    if confidence >= cfg.alert_threshold {
        Some((AlertReason::MultiSensorNonCooperative, confidence))
    } else {
        None
    }
}

/// Confidence contribution of each corroborating sensor type.
fn sensor_boosts(cfg: &DarkShipConfig, track: &UnifiedTrack) -> f64 {
    track
        .noncooperative_sensors()
        .map(|s| match s {
            SensorType::Radar => cfg.radar_boost,
            SensorType::Satellite => cfg.satellite_boost,
            SensorType::Drone => cfg.drone_boost,
            SensorType::Ais => 0.0,
        })
        .sum()
}

fn dark_alert(
    track: &UnifiedTrack,
    reason: AlertReason,
    confidence: f64,
    flagged: bool,
    now: f64,
) -> DarkShipAlert {
    DarkShipAlert {
        track_id: track.track_id,
        position: track.position,
        confidence,
        reason,
        flagged,
        contributing_sensors: track.contributing_sensors().collect(),
        timestamp: now,
    }
}

/// 0-100 composite of sensor diversity, update cadence and accuracy.
fn quality_score(track: &UnifiedTrack) -> u8 {
    let diversity = (track.contributions.len() as u32 * 10).min(40);
    let cadence = track.update_count.min(6) * 5;
    let accuracy = if track.position_uncertainty_m < 100.0 {
        30
    } else if track.position_uncertainty_m < 500.0 {
        20
    } else if track.position_uncertainty_m < 1000.0 {
        10
    } else {
        0
    };
    (diversity + cadence + accuracy).min(100) as u8
}
