//! Fusion configuration: sensor accuracy profiles, correlation gates,
//! life-cycle timeouts and dark-ship thresholds.
//!
//! Configuration is read once at startup and validated before the process
//! runs; invalid thresholds are fatal (`ConfigError`), never silently
//! corrected.

use crate::model::SensorType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by [`FusionConfig::validate`]. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cycle rate must be positive, got {0}")]
    InvalidCycleRate(f64),

    #[error("drop timeout ({drop_s}s) must exceed coasting timeout ({coast_s}s)")]
    TimeoutOrder { coast_s: f64, drop_s: f64 },

    #[error("gate sigma multiplier must be positive, got {0}")]
    InvalidSigmaMultiplier(f64),

    #[error("gate bounds invalid: min {min_m}m > max {max_m}m")]
    GateBounds { min_m: f64, max_m: f64 },

    #[error("uncertainty bounds invalid: min {min_m}m > max {max_m}m")]
    UncertaintyBounds { min_m: f64, max_m: f64 },

    #[error("velocity smoothing factor must be in (0, 1], got {0}")]
    InvalidSmoothing(f64),

    #[error("sensor {sensor} position error must be positive, got {value}")]
    InvalidSensorError { sensor: SensorType, value: f64 },

    #[error("non-cooperative corroboration threshold must be at least 1, got {0}")]
    InvalidCorroboration(usize),

    #[error("status interval must be at least 1 cycle")]
    InvalidStatusInterval,

    #[error("{name} capacity must be positive")]
    ZeroCapacity { name: &'static str },
}

/// Accuracy and capability profile for one sensor type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorProfile {
    /// 1-sigma position error in meters
    pub position_error_m: f64,

    /// 1-sigma speed error in knots
    pub speed_error_knots: f64,

    /// Can identify the vessel (MMSI / visual ID)
    pub has_identity: bool,

    /// Can detect vessels with their transponder off
    pub sees_dark_ships: bool,
}

/// Per-sensor accuracy profiles.
///
/// Defaults match the deployed sensor suite: AIS is precise and
/// identifying, radar is medium-accuracy and anonymous, satellite is
/// wide-area and coarse, drone vision is close-in and identifying.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorProfiles {
    pub ais: SensorProfile,
    pub radar: SensorProfile,
    pub satellite: SensorProfile,
    pub drone: SensorProfile,
}

impl SensorProfiles {
    /// Returns the profile for a sensor type.
    pub fn get(&self, sensor: SensorType) -> &SensorProfile {
        match sensor {
            SensorType::Ais => &self.ais,
            SensorType::Radar => &self.radar,
            SensorType::Satellite => &self.satellite,
            SensorType::Drone => &self.drone,
        }
    }

    /// Smallest position error among the given sensor types.
    ///
    /// Used as the fusion floor: a track can never claim better accuracy
    /// than its most accurate contributing sensor.
    pub fn best_position_error_m(&self, sensors: impl Iterator<Item = SensorType>) -> f64 {
        sensors
            .map(|s| self.get(s).position_error_m)
            .fold(f64::INFINITY, f64::min)
    }
}

impl Default for SensorProfiles {
    fn default() -> Self {
        Self {
            ais: SensorProfile {
                position_error_m: 10.0,
                speed_error_knots: 0.5,
                has_identity: true,
                sees_dark_ships: false,
            },
            radar: SensorProfile {
                position_error_m: 500.0,
                speed_error_knots: 1.0,
                has_identity: false,
                sees_dark_ships: true,
            },
            satellite: SensorProfile {
                position_error_m: 2000.0,
                speed_error_knots: 2.0,
                has_identity: false,
                sees_dark_ships: true,
            },
            drone: SensorProfile {
                position_error_m: 50.0,
                speed_error_knots: 1.0,
                has_identity: true,
                sees_dark_ships: true,
            },
        }
    }
}

/// Gating thresholds for detection-to-track correlation and the track
/// life-cycle schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationGates {
    /// N-sigma gate on combined uncertainty
    pub sigma_multiplier: f64,

    /// Lower bound on the gate radius (prevents too-tight gates)
    pub min_gate_m: f64,

    /// Upper bound on the gate radius
    pub max_gate_m: f64,

    /// Maximum extrapolation window when predicting a track forward
    pub max_time_delta_s: f64,

    /// Weight of the kinematic-consistency penalty in the pair cost
    pub kinematic_weight: f64,

    /// Speed discrepancy that contributes a full penalty unit
    pub max_speed_change_knots: f64,

    /// Course discrepancy that contributes a full penalty unit
    pub max_course_change_deg: f64,

    /// Cost of opening a new track (higher = prefer existing tracks)
    pub new_track_cost: f64,

    /// Total detections needed for tentative -> confirmed
    pub confirmation_updates: u32,

    /// Quiet period before a confirmed track starts coasting
    pub coasting_timeout_s: f64,

    /// Quiet period before any track is dropped
    pub drop_timeout_s: f64,

    /// Fused uncertainty is never published below this
    pub min_uncertainty_m: f64,

    /// Coasting inflation cap
    pub max_uncertainty_m: f64,

    /// Relative uncertainty growth per second while coasting
    pub coast_inflation_per_s: f64,

    /// EMA factor for velocity re-derivation (1.0 = no smoothing)
    pub velocity_smoothing: f64,
}

impl Default for CorrelationGates {
    fn default() -> Self {
        Self {
            sigma_multiplier: 3.0,
            min_gate_m: 500.0,
            max_gate_m: 10_000.0,
            max_time_delta_s: 120.0,
            kinematic_weight: 1.0,
            max_speed_change_knots: 15.0,
            max_course_change_deg: 120.0,
            new_track_cost: 0.85,
            confirmation_updates: 3,
            coasting_timeout_s: 300.0,
            drop_timeout_s: 600.0,
            min_uncertainty_m: 100.0,
            max_uncertainty_m: 5000.0,
            coast_inflation_per_s: 0.005,
            velocity_smoothing: 0.3,
        }
    }
}

/// Dark-ship detection thresholds and confidence tuning.
///
/// The confidence curve is deliberately tunable: the gap component
/// saturates at `gap_saturation_s`, and each corroborating sensor type adds
/// its boost, capped at 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DarkShipConfig {
    /// AIS silence beyond this flags an identified track (with corroboration)
    pub ais_gap_threshold_s: f64,

    /// Window in which a non-cooperative contribution counts as "live"
    pub recent_noncoop_window_s: f64,

    /// Distinct non-cooperative sensor types needed to flag an
    /// unidentified track
    pub min_noncoop_sensors: usize,

    /// Minimum confidence before a flag is raised
    pub alert_threshold: f64,

    /// Gap duration at which the gap component of confidence saturates
    pub gap_saturation_s: f64,

    /// Confidence contributions per corroborating sensor type
    pub radar_boost: f64,
    pub satellite_boost: f64,
    /// Drone visual is the strongest corroboration
    pub drone_boost: f64,
}

impl Default for DarkShipConfig {
    fn default() -> Self {
        Self {
            ais_gap_threshold_s: 900.0,
            recent_noncoop_window_s: 120.0,
            min_noncoop_sensors: 2,
            alert_threshold: 0.6,
            gap_saturation_s: 3600.0,
            radar_boost: 0.2,
            satellite_boost: 0.1,
            drone_boost: 0.3,
        }
    }
}

/// Top-level configuration for the fusion process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Fusion cycle rate in Hz
    pub cycle_hz: f64,

    /// Publish a status record every N cycles
    pub status_interval_cycles: u64,

    /// Bounded capacity of each per-sensor queue
    pub queue_capacity: usize,

    /// Per-cycle drain cap per sensor queue
    pub max_batch_per_sensor: usize,

    /// Capacity of the buffered publication channel
    pub publish_buffer: usize,

    pub sensors: SensorProfiles,
    pub gates: CorrelationGates,
    pub dark: DarkShipConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            cycle_hz: 2.0,
            status_interval_cycles: 10,
            queue_capacity: 1024,
            max_batch_per_sensor: 256,
            publish_buffer: 4096,
            sensors: SensorProfiles::default(),
            gates: CorrelationGates::default(),
            dark: DarkShipConfig::default(),
        }
    }
}

impl FusionConfig {
    /// Validates the configuration. Any error here must prevent startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cycle_hz > 0.0) {
            return Err(ConfigError::InvalidCycleRate(self.cycle_hz));
        }
        if self.status_interval_cycles == 0 {
            return Err(ConfigError::InvalidStatusInterval);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "detection queue",
            });
        }
        if self.max_batch_per_sensor == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "per-sensor batch",
            });
        }
        if self.publish_buffer == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "publish buffer",
            });
        }
        let g = &self.gates;
        if g.drop_timeout_s <= g.coasting_timeout_s {
            return Err(ConfigError::TimeoutOrder {
                coast_s: g.coasting_timeout_s,
                drop_s: g.drop_timeout_s,
            });
        }
        if !(g.sigma_multiplier > 0.0) {
            return Err(ConfigError::InvalidSigmaMultiplier(g.sigma_multiplier));
        }
        if g.min_gate_m > g.max_gate_m {
            return Err(ConfigError::GateBounds {
                min_m: g.min_gate_m,
                max_m: g.max_gate_m,
            });
        }
        if g.min_uncertainty_m > g.max_uncertainty_m {
            return Err(ConfigError::UncertaintyBounds {
                min_m: g.min_uncertainty_m,
                max_m: g.max_uncertainty_m,
            });
        }
        if !(g.velocity_smoothing > 0.0 && g.velocity_smoothing <= 1.0) {
            return Err(ConfigError::InvalidSmoothing(g.velocity_smoothing));
        }
        for sensor in SensorType::ALL {
            let p = self.sensors.get(sensor);
            if !(p.position_error_m > 0.0) {
                return Err(ConfigError::InvalidSensorError {
                    sensor,
                    value: p.position_error_m,
                });
            }
        }
        if self.dark.min_noncoop_sensors == 0 {
            return Err(ConfigError::InvalidCorroboration(self.dark.min_noncoop_sensors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(FusionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_timeout_order_rejected() {
        let mut config = FusionConfig::default();
        config.gates.drop_timeout_s = 100.0;
        config.gates.coasting_timeout_s = 300.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TimeoutOrder { .. })
        ));
    }

    #[test]
    fn test_zero_cycle_rate_rejected() {
        let mut config = FusionConfig::default();
        config.cycle_hz = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCycleRate(_))
        ));
    }

    #[test]
    fn test_negative_sensor_error_rejected() {
        let mut config = FusionConfig::default();
        config.sensors.radar.position_error_m = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSensorError { .. })
        ));
    }

    #[test]
    fn test_zero_status_interval_rejected() {
        let mut config = FusionConfig::default();
        config.status_interval_cycles = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStatusInterval)
        ));
    }

    #[test]
    fn test_zero_capacities_rejected() {
        for mutate in [
            (|c: &mut FusionConfig| c.queue_capacity = 0) as fn(&mut FusionConfig),
            |c| c.max_batch_per_sensor = 0,
            |c| c.publish_buffer = 0,
        ] {
            let mut config = FusionConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(ConfigError::ZeroCapacity { .. })
            ));
        }
    }

    #[test]
    fn test_best_position_error() {
        let profiles = SensorProfiles::default();
        let best = profiles.best_position_error_m(
            [SensorType::Radar, SensorType::Ais].into_iter(),
        );
        assert_eq!(best, 10.0);
    }
}
