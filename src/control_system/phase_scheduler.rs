use serde::{Deserialize, Serialize};

use crate::config::PhaseTiming;
use crate::control_system::registry::JunctionRegistry;
use crate::models::junction::{JunctionId, JunctionState, LightState, Phase};

/// A junction moved to a new phase on this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub junction: JunctionId,
    pub from: Phase,
    pub to: Phase,
    pub time_left: u32,
}

/// Drives the automatic six-phase cycle of every junction.
#[derive(Debug, Clone, Default)]
pub struct PhaseScheduler {
    timing: PhaseTiming,
}

impl PhaseScheduler {
    pub fn new(timing: PhaseTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> &PhaseTiming {
        &self.timing
    }

    /// Duration assigned to a phase when a junction enters it automatically.
    pub fn duration_for(&self, phase: Phase, emergency_mode: bool) -> u32 {
        match (phase.light(), emergency_mode) {
            (LightState::Yellow, _) => self.timing.yellow_secs,
            (LightState::Green, true) => self.timing.green_emergency_secs,
            (LightState::Green, false) => self.timing.green_secs,
            (LightState::Red, true) => self.timing.red_emergency_secs,
            (LightState::Red, false) => self.timing.red_secs,
        }
    }

    /// Ticks needed to run through the whole sequence once under the given mode.
    pub fn full_cycle_secs(&self, phases: &[Phase], emergency_mode: bool) -> u32 {
        phases
            .iter()
            .map(|phase| self.duration_for(*phase, emergency_mode))
            .sum()
    }

    /// One phase tick across all junctions. Does nothing while manual override
    /// is on. Returns the junctions that changed phase.
    pub fn on_phase_tick(&self, registry: &mut JunctionRegistry) -> Vec<PhaseTransition> {
        if registry.manual_override() {
            return Vec::new();
        }
        let emergency_mode = registry.emergency_mode();

        let mut transitions = Vec::new();
        for junction in registry.junctions_mut() {
            if let Some(transition) = self.advance(junction, emergency_mode) {
                log::debug!(
                    "Junction {} switching {} -> {} ({}s)",
                    transition.junction,
                    transition.from,
                    transition.to,
                    transition.time_left
                );
                transitions.push(transition);
            }
        }
        transitions
    }

    // Counts down; the tick on which the counter reaches zero also moves the
    // junction on, so a phase assigned N seconds lasts exactly N ticks.
    fn advance(&self, junction: &mut JunctionState, emergency_mode: bool) -> Option<PhaseTransition> {
        if junction.time_left > 0 {
            junction.time_left -= 1;
        }
        if junction.time_left > 0 {
            return None;
        }

        let from = junction.phase;
        let to = junction.next_phase();
        junction.phase = to;
        junction.time_left = self.duration_for(to, emergency_mode);

        Some(PhaseTransition {
            junction: junction.id.clone(),
            from,
            to,
            time_left: junction.time_left,
        })
    }
}
