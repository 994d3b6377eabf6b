//! Seeded synthetic detection generators, one per sensor type.
//!
//! Each generator samples the ground-truth fleet and adds Gaussian noise per
//! the sensor's accuracy profile. Scenarios decide cadence and coverage; the
//! generators only answer "what would this sensor report right now".

use crate::fleet::{Fleet, Vessel};
use geo::HaversineDestination;
use pelorus_core::config::SensorProfiles;
use pelorus_core::model::{Detection, GeoPos, SensorData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct SensorSuite {
    profiles: SensorProfiles,
    rng: ChaCha8Rng,
}

impl SensorSuite {
    pub fn new(seed: u64, profiles: SensorProfiles) -> Self {
        Self {
            profiles,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// AIS reports from every vessel whose transponder is on.
    pub fn ais(&mut self, fleet: &Fleet, now: f64) -> Vec<Detection> {
        let profile = *self.profiles.get(pelorus_core::SensorType::Ais);
        fleet
            .vessels()
            .iter()
            .filter(|v| !v.is_silent(now))
            .map(|v| Detection {
                position: self.noisy_position(v.position, profile.position_error_m),
                speed_knots: Some(
                    (v.speed_knots + self.gaussian(profile.speed_error_knots)).max(0.0),
                ),
                course_deg: Some((v.course_deg + self.gaussian(1.0)).rem_euclid(360.0)),
                position_uncertainty_m: profile.position_error_m,
                observed_at: now,
                data: SensorData::Ais {
                    mmsi: v.mmsi.clone(),
                    ship_name: Some(v.name.clone()),
                    vessel_type: Some(v.vessel_type.clone()),
                },
            })
            .collect()
    }

    /// Radar contacts for every vessel in the coverage area (anonymous).
    pub fn radar(&mut self, fleet: &Fleet, now: f64) -> Vec<Detection> {
        let profile = *self.profiles.get(pelorus_core::SensorType::Radar);
        fleet
            .vessels()
            .iter()
            .map(|v| Detection {
                position: self.noisy_position(v.position, profile.position_error_m),
                speed_knots: Some(
                    (v.speed_knots + self.gaussian(profile.speed_error_knots)).max(0.0),
                ),
                course_deg: Some((v.course_deg + self.gaussian(3.0)).rem_euclid(360.0)),
                position_uncertainty_m: profile.position_error_m,
                observed_at: now,
                data: SensorData::Radar {
                    station_id: "RAD-SIM-1".to_string(),
                    quality: self.rng.gen_range(6..=9),
                },
            })
            .collect()
    }

    /// One satellite pass over the whole fleet. Vessels with no transponder
    /// signal get the imagery pipeline's dark flag.
    pub fn satellite(&mut self, fleet: &Fleet, now: f64) -> Vec<Detection> {
        let profile = *self.profiles.get(pelorus_core::SensorType::Satellite);
        fleet
            .vessels()
            .iter()
            .enumerate()
            .map(|(i, v)| Detection {
                position: self.noisy_position(v.position, profile.position_error_m),
                speed_knots: None,
                course_deg: None,
                position_uncertainty_m: profile.position_error_m,
                observed_at: now,
                data: SensorData::Satellite {
                    detection_id: format!("SD-{now:.0}-{i}"),
                    source_satellite: "SAT-SIM-A".to_string(),
                    vessel_length_m: Some(v.length_m + self.gaussian(15.0)),
                    dark_flag: v.is_silent(now),
                },
            })
            .collect()
    }

    /// A close-in drone look at one vessel, with a visual ID.
    pub fn drone(&mut self, vessel: &Vessel, now: f64) -> Detection {
        let profile = *self.profiles.get(pelorus_core::SensorType::Drone);
        Detection {
            position: self.noisy_position(vessel.position, profile.position_error_m),
            speed_knots: Some(
                (vessel.speed_knots + self.gaussian(profile.speed_error_knots)).max(0.0),
            ),
            course_deg: Some((vessel.course_deg + self.gaussian(2.0)).rem_euclid(360.0)),
            position_uncertainty_m: profile.position_error_m,
            observed_at: now,
            data: SensorData::Drone {
                drone_id: "DRN-SIM-1".to_string(),
                object_class: Some(vessel.vessel_type.clone()),
                estimated_length_m: Some(vessel.length_m + self.gaussian(5.0)),
                visual_id: Some(vessel.name.clone()),
                confidence: 0.85 + self.rng.gen_range(0.0..0.1),
            },
        }
    }

    fn noisy_position(&mut self, position: GeoPos, sigma_m: f64) -> GeoPos {
        let north_m = self.gaussian(sigma_m);
        let east_m = self.gaussian(sigma_m);
        let point = position
            .to_point()
            .haversine_destination(0.0, north_m)
            .haversine_destination(90.0, east_m);
        GeoPos::from_point(point)
    }

    /// Box-Muller Gaussian sample with the given sigma.
    fn gaussian(&mut self, sigma: f64) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(1e-12);
        let u2: f64 = self.rng.gen();
        sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::Vessel;
    use pelorus_core::kinematics::haversine_m;

    fn one_vessel_fleet(silent: bool) -> Fleet {
        let mut fleet = Fleet::new(1);
        let mut vessel = Vessel::cargo("419000010", "MV Noise", GeoPos::new(18.9, 72.8), 10.0, 90.0);
        vessel.dark_from_start = silent;
        fleet.spawn(vessel);
        fleet
    }

    #[test]
    fn test_ais_skips_silent_vessels() {
        let mut suite = SensorSuite::new(5, SensorProfiles::default());
        assert_eq!(suite.ais(&one_vessel_fleet(false), 0.0).len(), 1);
        assert_eq!(suite.ais(&one_vessel_fleet(true), 0.0).len(), 0);
    }

    #[test]
    fn test_satellite_dark_flag_tracks_silence() {
        let mut suite = SensorSuite::new(5, SensorProfiles::default());
        let detections = suite.satellite(&one_vessel_fleet(true), 0.0);
        assert!(matches!(
            &detections[0].data,
            SensorData::Satellite { dark_flag: true, .. }
        ));
    }

    #[test]
    fn test_noise_is_profile_scaled() {
        let mut suite = SensorSuite::new(5, SensorProfiles::default());
        let fleet = one_vessel_fleet(false);
        let truth = fleet.vessel(0).position;
        // AIS noise (10 m sigma) stays well inside 100 m over many samples
        for _ in 0..50 {
            let det = &suite.ais(&fleet, 0.0)[0];
            assert!(haversine_m(truth, det.position) < 100.0);
        }
    }

    #[test]
    fn test_same_seed_same_detections() {
        let fleet = one_vessel_fleet(false);
        let sample = |seed| {
            let mut suite = SensorSuite::new(seed, SensorProfiles::default());
            suite.radar(&fleet, 10.0)[0].position
        };
        assert_eq!(sample(9), sample(9));
    }
}
