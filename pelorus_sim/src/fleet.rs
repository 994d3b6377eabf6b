//! Ground-truth fleet simulator.
//!
//! Vessels move with linear over-ground motion plus a small seeded course
//! wander. The fleet is the oracle the sensor generators sample from and the
//! reference scenarios assert against.

use pelorus_core::kinematics::{predict_position, velocity_from_speed_course};
use pelorus_core::model::GeoPos;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One simulated vessel with its true state.
#[derive(Debug, Clone)]
pub struct Vessel {
    pub mmsi: String,
    pub name: String,
    pub vessel_type: String,
    pub length_m: f64,
    pub position: GeoPos,
    pub speed_knots: f64,
    pub course_deg: f64,
    /// Transponder off from the start of the run
    pub dark_from_start: bool,
    /// Transponder switches off at this unix time
    pub goes_silent_at: Option<f64>,
}

impl Vessel {
    /// A generic cargo vessel, customized per scenario.
    pub fn cargo(mmsi: &str, name: &str, position: GeoPos, speed_knots: f64, course_deg: f64) -> Self {
        Self {
            mmsi: mmsi.to_string(),
            name: name.to_string(),
            vessel_type: "cargo".to_string(),
            length_m: 180.0,
            position,
            speed_knots,
            course_deg,
            dark_from_start: false,
            goes_silent_at: None,
        }
    }

    /// True when the transponder is off at `now`.
    pub fn is_silent(&self, now: f64) -> bool {
        self.dark_from_start || self.goes_silent_at.map_or(false, |t| now >= t)
    }
}

/// The ground-truth vessel set.
pub struct Fleet {
    vessels: Vec<Vessel>,
    rng: ChaCha8Rng,
}

impl Fleet {
    pub fn new(seed: u64) -> Self {
        Self {
            vessels: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn spawn(&mut self, vessel: Vessel) {
        self.vessels.push(vessel);
    }

    pub fn vessels(&self) -> &[Vessel] {
        &self.vessels
    }

    pub fn vessel(&self, index: usize) -> &Vessel {
        &self.vessels[index]
    }

    /// Moves every vessel forward by `dt_s` seconds of true motion, with up
    /// to half a degree of seeded course wander per step.
    pub fn step(&mut self, dt_s: f64) {
        for vessel in &mut self.vessels {
            vessel.course_deg = (vessel.course_deg
                + self.rng.gen_range(-0.5..0.5))
            .rem_euclid(360.0);
            let velocity = velocity_from_speed_course(vessel.speed_knots, vessel.course_deg);
            vessel.position = predict_position(vessel.position, velocity, dt_s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pelorus_core::kinematics::haversine_m;

    #[test]
    fn test_vessel_moves_at_speed() {
        let mut fleet = Fleet::new(7);
        fleet.spawn(Vessel::cargo(
            "419000001",
            "MV Test",
            GeoPos::new(18.9, 72.8),
            10.0, // ~5.14 m/s
            90.0,
        ));
        let start = fleet.vessel(0).position;
        fleet.step(100.0);
        let travelled = haversine_m(start, fleet.vessel(0).position);
        assert!((travelled - 514.4).abs() < 10.0, "got {travelled}");
    }

    #[test]
    fn test_silence_schedule() {
        let mut vessel = Vessel::cargo("419000002", "MV Quiet", GeoPos::new(0.0, 0.0), 8.0, 0.0);
        vessel.goes_silent_at = Some(1000.0);
        assert!(!vessel.is_silent(999.0));
        assert!(vessel.is_silent(1000.0));
    }

    #[test]
    fn test_same_seed_same_motion() {
        let build = || {
            let mut fleet = Fleet::new(99);
            fleet.spawn(Vessel::cargo(
                "419000003",
                "MV Repeat",
                GeoPos::new(10.0, 65.0),
                12.0,
                45.0,
            ));
            for _ in 0..50 {
                fleet.step(5.0);
            }
            fleet.vessel(0).position
        };
        assert_eq!(build(), build());
    }
}
