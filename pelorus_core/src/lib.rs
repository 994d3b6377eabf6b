//! Pelorus Core - Multi-Sensor Maritime Track Fusion
//!
//! This library resolves which detections across independent sensor streams
//! (AIS transponders, coastal radar, satellite passes, drone vision) refer to
//! the same physical vessel, and maintains one fused track per vessel:
//! 1. **Correlation Engine**: gated nearest-neighbor association solved with
//!    an optimal minimum-cost assignment per sensor batch
//! 2. **Track Manager**: inverse-variance fusion, life-cycle state machine,
//!    dark-ship detection
//! 3. **Fusion Orchestrator**: fixed-rate single-mutator cycle over bounded
//!    per-sensor queues

pub mod assignment;
pub mod config;
pub mod correlation;
pub mod kinematics;
pub mod model;
pub mod orchestrator;
pub mod track_manager;

// Re-export key types for convenience
pub use config::{ConfigError, CorrelationGates, DarkShipConfig, FusionConfig, SensorProfiles};
pub use correlation::{Assignment, CorrelationEngine};
pub use model::{Detection, SensorData, SensorType, TrackId, TrackStatus, UnifiedTrack};
pub use orchestrator::{FusionError, FusionEvent, FusionHandle, FusionOrchestrator, StatusRecord};
pub use track_manager::{DarkShipAlert, SensorCounts, TrackManager};
