//! Correlation engine: gated global-nearest-neighbor association.
//!
//! Given a batch of detections and the live track set, decides which
//! detections extend which tracks and which open new tracks:
//!
//! 1. Identity pre-pass: MMSI matches bind deterministically.
//! 2. Prediction: each track is extrapolated to the detection's timestamp.
//! 3. Gating: pairs beyond the N-sigma combined-uncertainty radius are
//!    masked out entirely.
//! 4. Assignment: one minimum-cost Hungarian solve per sensor type, so the
//!    matching is one-to-one within a sensor batch while different sensors
//!    may extend the same track in one cycle.
//!
//! The engine only reads tracks; all mutation happens in the track manager.

use crate::assignment::{self, CostMatrix};
use crate::config::CorrelationGates;
use crate::kinematics::{course_delta_deg, haversine_m, predict_position, speed_knots_from_velocity};
use crate::model::{Detection, SensorType, TrackId, UnifiedTrack};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One detection bound to an existing track.
#[derive(Debug, Clone)]
pub struct DetectionMatch {
    pub track_id: TrackId,
    pub detection: Detection,
    /// 0-1, higher is better; 1.0 for deterministic identity matches
    pub confidence: f64,
}

/// Result of correlating one batch: a one-to-one-or-none mapping from each
/// detection to a track, plus the detections that must open new tracks.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub matches: Vec<DetectionMatch>,
    pub unmatched: Vec<Detection>,
}

impl Assignment {
    /// Total number of detections the assignment accounts for.
    pub fn len(&self) -> usize {
        self.matches.len() + self.unmatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Correlates sensor detections to unified tracks.
pub struct CorrelationEngine {
    gates: CorrelationGates,
}

impl CorrelationEngine {
    pub fn new(gates: CorrelationGates) -> Self {
        Self { gates }
    }

    /// Correlates a batch against the live track set.
    ///
    /// An empty batch is a no-op; an empty track set degenerates to "every
    /// detection is new". A detection that gates to no track is never
    /// dropped; it always lands in `unmatched`.
    pub fn correlate(
        &self,
        detections: Vec<Detection>,
        tracks: &BTreeMap<TrackId, UnifiedTrack>,
    ) -> Assignment {
        let mut result = Assignment::default();
        if detections.is_empty() {
            return result;
        }

        // Phase 1: deterministic identity correlation by MMSI.
        let mmsi_index: HashMap<&str, TrackId> = tracks
            .values()
            .filter_map(|t| t.identity.mmsi.as_deref().map(|m| (m, t.track_id)))
            .collect();

        let mut remaining: Vec<Detection> = Vec::with_capacity(detections.len());
        for detection in detections {
            let identity_match = detection
                .reported_mmsi()
                .and_then(|m| mmsi_index.get(m).copied());
            match identity_match {
                Some(track_id) => result.matches.push(DetectionMatch {
                    track_id,
                    detection,
                    confidence: 1.0,
                }),
                None => remaining.push(detection),
            }
        }

        if tracks.is_empty() {
            result.unmatched = remaining;
            return result;
        }

        // Phase 2: spatial GNN, one optimal assignment per sensor type.
        let track_list: Vec<&UnifiedTrack> = tracks.values().collect();
        for sensor in SensorType::ALL {
            let (group, rest): (Vec<Detection>, Vec<Detection>) = remaining
                .into_iter()
                .partition(|d| d.sensor_type() == sensor);
            remaining = rest;
            if group.is_empty() {
                continue;
            }
            self.assign_group(sensor, group, &track_list, &mut result);
        }
        debug_assert!(remaining.is_empty());

        result
    }

    /// Solves the gated cost matrix for one sensor's detections.
    fn assign_group(
        &self,
        sensor: SensorType,
        group: Vec<Detection>,
        tracks: &[&UnifiedTrack],
        result: &mut Assignment,
    ) {
        let n_det = group.len();
        let n_tracks = tracks.len();

        // Columns: all tracks, then one dummy "new track" column per
        // detection. The dummy block makes every row feasible, which is
        // what keeps the forbidden mask unselectable.
        let mut matrix = CostMatrix::forbidden(n_det, n_tracks + n_det);
        let mut gated_pairs = 0usize;
        for (i, detection) in group.iter().enumerate() {
            for (j, track) in tracks.iter().enumerate() {
                if let Some(cost) = self.pair_cost(detection, track) {
                    matrix.set(i, j, cost);
                    gated_pairs += 1;
                }
            }
            for k in 0..n_det {
                matrix.set(i, n_tracks + k, self.gates.new_track_cost);
            }
        }
        debug!(
            sensor = %sensor,
            detections = n_det,
            tracks = n_tracks,
            gated_pairs,
            "solving assignment"
        );

        let columns = assignment::solve(&matrix);
        for (i, (detection, col)) in group.into_iter().zip(columns).enumerate() {
            if col < n_tracks {
                debug_assert!(!matrix.is_forbidden(i, col));
                let cost = matrix.get(i, col);
                result.matches.push(DetectionMatch {
                    track_id: tracks[col].track_id,
                    detection,
                    confidence: (1.0 - cost).clamp(0.0, 1.0),
                });
            } else {
                result.unmatched.push(detection);
            }
        }
    }

    /// Cost of pairing a detection with a track, or `None` when the pair is
    /// outside the gate.
    ///
    /// The track is predicted forward to the detection's timestamp before
    /// gating; the gate is an N-sigma radius on the combined uncertainty.
    pub fn pair_cost(&self, detection: &Detection, track: &UnifiedTrack) -> Option<f64> {
        let dt = (detection.observed_at - track.updated_at)
            .clamp(-self.gates.max_time_delta_s, self.gates.max_time_delta_s);
        let predicted = predict_position(track.position, track.velocity_ms, dt);
        let distance_m = haversine_m(detection.position, predicted);

        let combined_sigma = (track.position_uncertainty_m.powi(2)
            + detection.position_uncertainty_m.powi(2))
        .sqrt();
        if distance_m > self.gate_radius_m(combined_sigma) {
            return None;
        }

        let normalized_distance = distance_m / combined_sigma;
        let kinematic = self.kinematic_penalty(detection, track);
        let score = normalized_distance + self.gates.kinematic_weight * kinematic;
        let confidence = (1.0 - score / 10.0).clamp(0.0, 1.0);
        Some(1.0 - confidence)
    }

    /// Gate radius for a combined 1-sigma uncertainty, in meters.
    pub fn gate_radius_m(&self, combined_sigma: f64) -> f64 {
        (combined_sigma * self.gates.sigma_multiplier)
            .clamp(self.gates.min_gate_m, self.gates.max_gate_m)
    }

    /// Kinematic-consistency penalty: 0 for a perfect match, growing with
    /// speed and course discrepancy. Missing kinematics contribute nothing.
    fn kinematic_penalty(&self, detection: &Detection, track: &UnifiedTrack) -> f64 {
        let mut penalty = 0.0;

        let track_speed = if track.speed_ms() > 0.1 {
            Some(speed_knots_from_velocity(track.velocity_ms))
        } else {
            track.speed_knots
        };
        if let (Some(track_speed), Some(det_speed)) = (track_speed, detection.speed_knots) {
            penalty += (track_speed - det_speed).abs() / self.gates.max_speed_change_knots;
        }

        let track_course = if track.speed_ms() > 0.1 {
            Some(crate::kinematics::bearing_from_velocity(track.velocity_ms))
        } else {
            track.course_deg
        };
        if let (Some(track_course), Some(det_course)) = (track_course, detection.course_deg) {
            penalty += course_delta_deg(track_course, det_course) / self.gates.max_course_change_deg;
        }

        penalty
    }
}
