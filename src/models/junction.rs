use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A unique identifier for a junction, e.g. `anna-salai-mount`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JunctionId(pub String);

impl JunctionId {
    pub fn new(id: impl Into<String>) -> Self {
        JunctionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JunctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The colour a phase shows to the approach it controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

/// One of the six signal phases, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "NS-Green")]
    NsGreen,
    #[serde(rename = "NS-Yellow")]
    NsYellow,
    #[serde(rename = "NS-Red")]
    NsRed,
    #[serde(rename = "EW-Green")]
    EwGreen,
    #[serde(rename = "EW-Yellow")]
    EwYellow,
    #[serde(rename = "EW-Red")]
    EwRed,
}

impl Phase {
    /// The fixed cycle every junction starts with.
    pub const CYCLE: [Phase; 6] = [
        Phase::NsGreen,
        Phase::NsYellow,
        Phase::NsRed,
        Phase::EwGreen,
        Phase::EwYellow,
        Phase::EwRed,
    ];

    pub fn light(self) -> LightState {
        match self {
            Phase::NsGreen | Phase::EwGreen => LightState::Green,
            Phase::NsYellow | Phase::EwYellow => LightState::Yellow,
            Phase::NsRed | Phase::EwRed => LightState::Red,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::NsGreen => "NS-Green",
            Phase::NsYellow => "NS-Yellow",
            Phase::NsRed => "NS-Red",
            Phase::EwGreen => "EW-Green",
            Phase::EwYellow => "EW-Yellow",
            Phase::EwRed => "EW-Red",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse error for phase names coming in over the command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    /// Accepts `NS-Green` as well as the dashboard spelling `NS Green`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(' ', "-");
        Phase::CYCLE
            .iter()
            .copied()
            .find(|phase| phase.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// Congestion band derived from density, used by the map legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityLevel {
    High,
    Medium,
    Low,
}

impl DensityLevel {
    pub fn from_density(density: f64) -> Self {
        if density > 70.0 {
            DensityLevel::High
        } else if density > 40.0 {
            DensityLevel::Medium
        } else {
            DensityLevel::Low
        }
    }
}

pub const MIN_DENSITY: f64 = 10.0;
pub const MAX_DENSITY: f64 = 100.0;
pub const MIN_WAIT_TIME: f64 = 5.0;

/// Represents a signalised junction and its live metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JunctionState {
    pub id: JunctionId,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Percentage of road capacity in use, always within [10, 100].
    pub density: f64,
    pub queue_length: u32,
    /// Average wait in seconds, never below 5.
    pub wait_time: f64,
    pub phase: Phase,
    pub time_left: u32,
    /// Nominal full-cycle duration; informational only.
    pub cycle_length: u32,
    pub phases: Vec<Phase>,
    /// Set by the detection feed.
    pub emergency_vehicle_present: bool,
    /// Set by the detection feed.
    pub accident_present: bool,
}

impl JunctionState {
    /// Create a junction on the standard six-phase cycle.
    /// Metrics are clamped into range on construction.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        name: &str,
        lat: f64,
        lng: f64,
        density: f64,
        queue_length: u32,
        wait_time: f64,
        phase: Phase,
        time_left: u32,
        cycle_length: u32,
    ) -> Self {
        Self {
            id: JunctionId::new(id),
            name: name.to_string(),
            lat,
            lng,
            density: clamp_density(density),
            queue_length,
            wait_time: clamp_wait_time(wait_time),
            phase,
            time_left,
            cycle_length,
            phases: Phase::CYCLE.to_vec(),
            emergency_vehicle_present: false,
            accident_present: false,
        }
    }

    pub fn with_detection(mut self, emergency_vehicle_present: bool, accident_present: bool) -> Self {
        self.emergency_vehicle_present = emergency_vehicle_present;
        self.accident_present = accident_present;
        self
    }

    pub fn density_level(&self) -> DensityLevel {
        DensityLevel::from_density(self.density)
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    /// The phase after the current one. Falls back to the head of the
    /// sequence if the current phase is somehow not a member.
    pub fn next_phase(&self) -> Phase {
        match self.phases.iter().position(|p| *p == self.phase) {
            Some(index) => self.phases[(index + 1) % self.phases.len()],
            None => self.phases.first().copied().unwrap_or(Phase::NsGreen),
        }
    }

    pub(crate) fn nudge_density(&mut self, delta: f64) {
        self.density = clamp_density(self.density + delta);
    }

    pub(crate) fn nudge_wait_time(&mut self, delta: f64) {
        self.wait_time = clamp_wait_time(self.wait_time + delta);
    }
}

pub fn clamp_density(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_DENSITY;
    }
    value.clamp(MIN_DENSITY, MAX_DENSITY)
}

pub fn clamp_wait_time(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_WAIT_TIME;
    }
    value.max(MIN_WAIT_TIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_parse_in_both_spellings() {
        assert_eq!("NS-Green".parse::<Phase>(), Ok(Phase::NsGreen));
        assert_eq!("EW Yellow".parse::<Phase>(), Ok(Phase::EwYellow));
        assert_eq!("ew-red".parse::<Phase>(), Ok(Phase::EwRed));
        assert!("NS-Blue".parse::<Phase>().is_err());
    }

    #[test]
    fn next_phase_wraps_around() {
        let mut junction = JunctionState::new("j", "J", 0.0, 0.0, 50.0, 0, 10.0, Phase::EwRed, 3, 120);
        assert_eq!(junction.next_phase(), Phase::NsGreen);
        junction.phase = Phase::NsYellow;
        assert_eq!(junction.next_phase(), Phase::NsRed);
    }

    #[test]
    fn metrics_are_clamped_on_every_write() {
        let mut junction = JunctionState::new("j", "J", 0.0, 0.0, 150.0, 0, 1.0, Phase::NsGreen, 3, 120);
        assert_eq!(junction.density, MAX_DENSITY);
        assert_eq!(junction.wait_time, MIN_WAIT_TIME);

        junction.nudge_density(-500.0);
        assert_eq!(junction.density, MIN_DENSITY);
        junction.nudge_wait_time(f64::NAN);
        assert_eq!(junction.wait_time, MIN_WAIT_TIME);
    }

    #[test]
    fn density_levels_follow_legend_thresholds() {
        assert_eq!(DensityLevel::from_density(85.0), DensityLevel::High);
        assert_eq!(DensityLevel::from_density(70.0), DensityLevel::Medium);
        assert_eq!(DensityLevel::from_density(40.0), DensityLevel::Low);
    }
}
