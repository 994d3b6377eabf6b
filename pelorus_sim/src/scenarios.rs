//! Named deterministic scenarios.

/// Scenario identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: steady fleet under AIS + radar, one track per vessel
    Baseline,

    /// SIM-002: two lanes crossing, tracks must not swap or duplicate
    CrossingLanes,

    /// SIM-003: a vessel goes AIS-silent mid-run while radar holds contact
    AisGap,

    /// SIM-004: a never-cooperative vessel corroborated by satellite + radar
    DarkRendezvous,

    /// SIM-005: radar drops out, AIS-covered tracks must survive
    SensorDropout,
}

impl ScenarioId {
    /// Returns all scenarios in run order.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::CrossingLanes,
            ScenarioId::AisGap,
            ScenarioId::DarkRendezvous,
            ScenarioId::SensorDropout,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::CrossingLanes => "crossing_lanes",
            ScenarioId::AisGap => "ais_gap",
            ScenarioId::DarkRendezvous => "dark_rendezvous",
            ScenarioId::SensorDropout => "sensor_dropout",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Steady fleet, AIS + radar, expect one confirmed track each",
            ScenarioId::CrossingLanes => "Two crossing lanes, expect no track swap or duplication",
            ScenarioId::AisGap => "Transponder off mid-run with radar contact, expect ais_gap alert",
            ScenarioId::DarkRendezvous => "Dark vessel seen by satellite + radar, expect dark flag",
            ScenarioId::SensorDropout => "Radar dies mid-run, AIS tracks must stay confirmed",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "sim-001" => Ok(ScenarioId::Baseline),
            "crossing_lanes" | "crossing" | "sim-002" => Ok(ScenarioId::CrossingLanes),
            "ais_gap" | "gap" | "sim-003" => Ok(ScenarioId::AisGap),
            "dark_rendezvous" | "dark" | "sim-004" => Ok(ScenarioId::DarkRendezvous),
            "sensor_dropout" | "dropout" | "sim-005" => Ok(ScenarioId::SensorDropout),
            _ => Err(format!("unknown scenario: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
    }
}
