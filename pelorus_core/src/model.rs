//! Shared data model: detections, sensor contributions and unified tracks.
//!
//! Detections are immutable, ephemeral inputs that live for one
//! correlation cycle. A [`UnifiedTrack`] is the fused, persistent belief
//! about one vessel and is mutated exclusively by the track manager.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The four sensor streams feeding the fusion engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Cooperative AIS transponder reports
    Ais,
    /// Coastal radar contacts
    Radar,
    /// Wide-area satellite detections
    Satellite,
    /// Visual drone detections
    Drone,
}

impl SensorType {
    /// All sensor types, in stream order.
    pub const ALL: [SensorType; 4] = [
        SensorType::Ais,
        SensorType::Radar,
        SensorType::Satellite,
        SensorType::Drone,
    ];

    /// True for the cooperative channel (the vessel reports itself).
    pub fn is_cooperative(&self) -> bool {
        matches!(self, SensorType::Ais)
    }

    /// True for sensors that can establish vessel identity.
    pub fn can_identify(&self) -> bool {
        matches!(self, SensorType::Ais | SensorType::Drone)
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SensorType::Ais => "ais",
            SensorType::Radar => "radar",
            SensorType::Satellite => "satellite",
            SensorType::Drone => "drone",
        };
        write!(f, "{name}")
    }
}

/// A WGS84 surface position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPos {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    /// Converts to a `geo` point (x = longitude, y = latitude).
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lon_deg, self.lat_deg)
    }

    pub fn from_point(p: geo::Point<f64>) -> Self {
        Self {
            lat_deg: p.y(),
            lon_deg: p.x(),
        }
    }
}

/// Sensor-specific payload of a detection.
///
/// Modeled as a tagged variant: only the fields valid for the reporting
/// sensor exist on each arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorData {
    Ais {
        mmsi: String,
        ship_name: Option<String>,
        vessel_type: Option<String>,
    },
    Radar {
        station_id: String,
        /// Contact quality 0-9 as reported by the radar head
        quality: u8,
    },
    Satellite {
        detection_id: String,
        source_satellite: String,
        vessel_length_m: Option<f64>,
        /// The imagery pipeline flags detections with no AIS correlate
        dark_flag: bool,
    },
    Drone {
        drone_id: String,
        object_class: Option<String>,
        estimated_length_m: Option<f64>,
        /// Visual identification (hull markings / registration), when legible
        visual_id: Option<String>,
        confidence: f64,
    },
}

impl SensorData {
    /// The sensor type discriminant of this payload.
    pub fn sensor_type(&self) -> SensorType {
        match self {
            SensorData::Ais { .. } => SensorType::Ais,
            SensorData::Radar { .. } => SensorType::Radar,
            SensorData::Satellite { .. } => SensorType::Satellite,
            SensorData::Drone { .. } => SensorType::Drone,
        }
    }

    /// The reporting sensor's identifier (station, drone, satellite, ...).
    pub fn sensor_id(&self) -> &str {
        match self {
            SensorData::Ais { .. } => "AIS",
            SensorData::Radar { station_id, .. } => station_id,
            SensorData::Satellite { source_satellite, .. } => source_satellite,
            SensorData::Drone { drone_id, .. } => drone_id,
        }
    }
}

/// One observation of one vessel from one sensor at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub position: GeoPos,
    pub speed_knots: Option<f64>,
    pub course_deg: Option<f64>,

    /// 1-sigma position error in meters, from the sensor's accuracy profile
    pub position_uncertainty_m: f64,

    /// Observation timestamp, unix seconds
    pub observed_at: f64,

    pub data: SensorData,
}

impl Detection {
    pub fn sensor_type(&self) -> SensorType {
        self.data.sensor_type()
    }

    /// The MMSI reported by a cooperative detection, if any.
    pub fn reported_mmsi(&self) -> Option<&str> {
        match &self.data {
            SensorData::Ais { mmsi, .. } => Some(mmsi),
            _ => None,
        }
    }

    /// Visual identification from a drone detection, if legible.
    pub fn visual_id(&self) -> Option<&str> {
        match &self.data {
            SensorData::Drone { visual_id, .. } => visual_id.as_deref(),
            _ => None,
        }
    }
}

/// Stable identifier of a unified track.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Creates a fresh track ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // TRK- prefix plus the first 8 hex chars for readability
        let hex = self.0.simple().to_string();
        write!(f, "TRK-{}", &hex[..8].to_uppercase())
    }
}

/// Track life-cycle status.
///
/// Transitions only move forward (tentative -> confirmed -> coasting ->
/// dropped), except the coasting -> confirmed recovery on a new match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// New track, needs confirmation
    Tentative,
    /// Confirmed by accumulated detections
    Confirmed,
    /// No recent updates; position doubt is growing
    Coasting,
    /// Terminal; removed from the live set
    Dropped,
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackStatus::Tentative => "tentative",
            TrackStatus::Confirmed => "confirmed",
            TrackStatus::Coasting => "coasting",
            TrackStatus::Dropped => "dropped",
        };
        write!(f, "{name}")
    }
}

/// Where the track's identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// MMSI from the AIS transponder
    Ais,
    /// Visual identification from drone vision
    Visual,
    /// No identity available
    Unknown,
}

/// Why a dark-ship flag was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    /// Identified vessel went AIS-silent while other sensors still see it
    AisGap,
    /// Never-identified vessel corroborated by non-cooperative sensors
    MultiSensorNonCooperative,
}

impl std::fmt::Display for AlertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertReason::AisGap => "ais_gap",
            AlertReason::MultiSensorNonCooperative => "multi_sensor_noncooperative",
        };
        write!(f, "{name}")
    }
}

/// Vessel identity fields, possibly partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VesselIdentity {
    pub mmsi: Option<String>,
    pub name: Option<String>,
    pub vessel_type: Option<String>,
    pub length_m: Option<f64>,
}

/// Record of one sensor type's contribution to a track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorContribution {
    pub sensor_type: SensorType,
    /// Reporting sensor identifier (e.g. "RAD-COAST-3", "DRN-001")
    pub sensor_id: String,
    /// Unix seconds of the most recent matched detection
    pub last_detection_at: f64,
    pub count: u32,
}

/// The fused, persistent belief about one vessel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedTrack {
    pub track_id: TrackId,
    pub status: TrackStatus,

    // === Fused state ===
    pub position: GeoPos,

    /// Velocity [north, east] in m/s, derived from consecutive fused
    /// positions with EMA smoothing
    pub velocity_ms: Vector2<f64>,

    /// Published 1-sigma position error; inflates while coasting
    pub position_uncertainty_m: f64,

    /// Fused 1-sigma error before coasting inflation; restored on recovery
    pub base_uncertainty_m: f64,

    /// Last reported over-ground kinematics, for display and gating
    pub speed_knots: Option<f64>,
    pub course_deg: Option<f64>,

    // === Identity ===
    pub identity: VesselIdentity,
    pub identity_source: IdentitySource,

    // === Dark-ship state ===
    pub is_dark_ship: bool,
    pub dark_ship_confidence: f64,
    pub alert_reason: Option<AlertReason>,
    /// Unix seconds of the most recent cooperative contribution
    pub ais_last_seen: Option<f64>,
    /// The satellite pipeline flagged this vessel as AIS-dark
    pub satellite_dark_hint: bool,

    // === Bookkeeping ===
    pub contributions: BTreeMap<SensorType, SensorContribution>,
    /// 0-100 composite of sensor diversity, recency and accuracy
    pub quality: u8,
    pub created_at: f64,
    pub updated_at: f64,
    pub update_count: u32,
}

impl UnifiedTrack {
    /// Sensor types currently contributing to this track.
    pub fn contributing_sensors(&self) -> impl Iterator<Item = SensorType> + '_ {
        self.contributions.keys().copied()
    }

    /// Non-cooperative sensor types contributing to this track.
    pub fn noncooperative_sensors(&self) -> impl Iterator<Item = SensorType> + '_ {
        self.contributing_sensors().filter(|s| !s.is_cooperative())
    }

    /// True when any non-cooperative sensor contributed within `window_s`
    /// of `now`.
    pub fn has_recent_noncooperative(&self, now: f64, window_s: f64) -> bool {
        self.contributions
            .values()
            .filter(|c| !c.sensor_type.is_cooperative())
            .any(|c| now - c.last_detection_at < window_s)
    }

    /// Seconds since the last cooperative contribution, if any was seen.
    pub fn ais_gap_s(&self, now: f64) -> Option<f64> {
        self.ais_last_seen.map(|t| now - t)
    }

    /// Current over-ground speed in m/s from the fused velocity vector.
    pub fn speed_ms(&self) -> f64 {
        self.velocity_ms.norm()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_sensor_type_capabilities() {
        assert!(SensorType::Ais.is_cooperative());
        assert!(!SensorType::Radar.is_cooperative());
        assert!(SensorType::Drone.can_identify());
        assert!(!SensorType::Satellite.can_identify());
    }

    #[test]
    fn test_track_id_display() {
        let id = TrackId(Uuid::nil());
        assert_eq!(id.to_string(), "TRK-00000000");
    }

    #[test]
    fn test_detection_reported_mmsi() {
        let det = Detection {
            position: GeoPos::new(19.0, 72.8),
            speed_knots: Some(12.0),
            course_deg: Some(180.0),
            position_uncertainty_m: 10.0,
            observed_at: 0.0,
            data: SensorData::Ais {
                mmsi: "419001234".into(),
                ship_name: Some("MV Chennai".into()),
                vessel_type: None,
            },
        };
        assert_eq!(det.reported_mmsi(), Some("419001234"));
        assert_eq!(det.sensor_type(), SensorType::Ais);
    }

    #[test]
    fn test_recent_noncooperative_window() {
        let mut track = test_track();
        track.contributions.insert(
            SensorType::Radar,
            SensorContribution {
                sensor_type: SensorType::Radar,
                sensor_id: "RAD-1".into(),
                last_detection_at: 1000.0,
                count: 2,
            },
        );
        assert!(track.has_recent_noncooperative(1100.0, 120.0));
        assert!(!track.has_recent_noncooperative(1200.0, 120.0));
    }

    pub(crate) fn test_track() -> UnifiedTrack {
        UnifiedTrack {
            track_id: TrackId::new(),
            status: TrackStatus::Tentative,
            position: GeoPos::new(18.9, 72.8),
            velocity_ms: Vector2::zeros(),
            position_uncertainty_m: 500.0,
            base_uncertainty_m: 500.0,
            speed_knots: None,
            course_deg: None,
            identity: VesselIdentity::default(),
            identity_source: IdentitySource::Unknown,
            is_dark_ship: false,
            dark_ship_confidence: 0.0,
            alert_reason: None,
            ais_last_seen: None,
            satellite_dark_hint: false,
            contributions: BTreeMap::new(),
            quality: 0,
            created_at: 0.0,
            updated_at: 0.0,
            update_count: 0,
        }
    }
}
