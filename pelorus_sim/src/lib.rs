//! Deterministic simulation harness for the fusion engine.
//!
//! Everything runs off one master seed: the virtual clock, the fleet's
//! course wander and the sensor noise, so a failing scenario reproduces
//! exactly from its seed.

pub mod context;
pub mod fleet;
pub mod runner;
pub mod scenarios;
pub mod sensors;

pub use context::SimClock;
pub use fleet::{Fleet, Vessel};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use sensors::SensorSuite;
