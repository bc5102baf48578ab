use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ControlError;
use crate::models::junction::{clamp_density, clamp_wait_time, JunctionId, JunctionState, Phase};

/// Process-wide control flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    pub emergency_mode: bool,
    pub manual_override: bool,
    /// Receives manual commands, recommendation effects and the metric tick.
    pub selected_junction: JunctionId,
}

/// Owns every junction and the mode flags. All junction writes go through here.
#[derive(Debug, Clone)]
pub struct JunctionRegistry {
    junctions: BTreeMap<JunctionId, JunctionState>,
    mode: ModeState,
}

impl JunctionRegistry {
    /// Builds the registry. If `selected` is not among `junctions` the first
    /// junction (by id) is selected instead. Junctions that break the state
    /// invariants are repaired on the way in.
    pub fn new(junctions: Vec<JunctionState>, selected: JunctionId) -> Self {
        let junctions: BTreeMap<JunctionId, JunctionState> = junctions
            .into_iter()
            .map(repair)
            .map(|junction| (junction.id.clone(), junction))
            .collect();

        let selected_junction = if junctions.contains_key(&selected) {
            selected
        } else {
            let fallback = junctions
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| selected.clone());
            log::warn!(
                "Initial junction {} is not registered, selecting {} instead",
                selected,
                fallback
            );
            fallback
        };

        Self {
            junctions,
            mode: ModeState {
                emergency_mode: false,
                manual_override: false,
                selected_junction,
            },
        }
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    pub fn emergency_mode(&self) -> bool {
        self.mode.emergency_mode
    }

    pub fn manual_override(&self) -> bool {
        self.mode.manual_override
    }

    pub fn selected(&self) -> &JunctionId {
        &self.mode.selected_junction
    }

    pub fn get(&self, id: &JunctionId) -> Result<&JunctionState, ControlError> {
        self.junctions
            .get(id)
            .ok_or_else(|| ControlError::InvalidJunctionReference(id.clone()))
    }

    pub fn selected_junction(&self) -> Result<&JunctionState, ControlError> {
        self.get(&self.mode.selected_junction)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JunctionState> {
        self.junctions.values()
    }

    pub fn len(&self) -> usize {
        self.junctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }

    pub fn select(&mut self, id: &JunctionId) -> Result<(), ControlError> {
        self.get(id)?;
        self.mode.selected_junction = id.clone();
        Ok(())
    }

    pub fn set_manual_override(&mut self, enabled: bool) {
        self.mode.manual_override = enabled;
    }

    pub fn set_emergency_mode(&mut self, enabled: bool) {
        self.mode.emergency_mode = enabled;
    }

    /// Puts a junction into `phase` with `time_left` seconds remaining.
    /// The phase must belong to the junction's sequence.
    pub fn assign_phase(
        &mut self,
        id: &JunctionId,
        phase: Phase,
        time_left: u32,
    ) -> Result<(), ControlError> {
        let junction = self.get_mut(id)?;
        if !junction.has_phase(phase) {
            return Err(ControlError::InvalidPhaseCommand {
                junction: id.clone(),
                phase: phase.to_string(),
            });
        }
        junction.phase = phase;
        junction.time_left = time_left;
        Ok(())
    }

    /// Adds `secs` to the junction's remaining phase time. Returns the new value.
    pub fn extend_time_left(&mut self, id: &JunctionId, secs: u32) -> Result<u32, ControlError> {
        let junction = self.get_mut(id)?;
        junction.time_left = junction.time_left.saturating_add(secs);
        Ok(junction.time_left)
    }

    /// Applies metric drift; both values are clamped into range.
    pub fn drift_metrics(
        &mut self,
        id: &JunctionId,
        density_delta: f64,
        wait_time_delta: f64,
    ) -> Result<(), ControlError> {
        let junction = self.get_mut(id)?;
        junction.nudge_density(density_delta);
        junction.nudge_wait_time(wait_time_delta);
        Ok(())
    }

    /// Detection-feed entry point for the two presence flags.
    pub fn update_detection(
        &mut self,
        id: &JunctionId,
        emergency_vehicle_present: bool,
        accident_present: bool,
    ) -> Result<(), ControlError> {
        let junction = self.get_mut(id)?;
        junction.emergency_vehicle_present = emergency_vehicle_present;
        junction.accident_present = accident_present;
        Ok(())
    }

    // Phase scheduler only.
    pub(crate) fn junctions_mut(&mut self) -> impl Iterator<Item = &mut JunctionState> {
        self.junctions.values_mut()
    }

    fn get_mut(&mut self, id: &JunctionId) -> Result<&mut JunctionState, ControlError> {
        self.junctions
            .get_mut(id)
            .ok_or_else(|| ControlError::InvalidJunctionReference(id.clone()))
    }
}

// An empty sequence becomes the standard cycle, a phase outside the sequence
// becomes its first phase, and metrics are clamped.
fn repair(mut junction: JunctionState) -> JunctionState {
    if junction.phases.is_empty() {
        log::warn!("Junction {} has no phase sequence, using the standard cycle", junction.id);
        junction.phases = Phase::CYCLE.to_vec();
    }
    if !junction.has_phase(junction.phase) {
        let first = junction.phases.first().copied().unwrap_or(Phase::NsGreen);
        log::warn!(
            "Junction {} starts in {} which is not in its sequence, using {}",
            junction.id,
            junction.phase,
            first
        );
        junction.phase = first;
    }
    junction.density = clamp_density(junction.density);
    junction.wait_time = clamp_wait_time(junction.wait_time);
    junction
}
