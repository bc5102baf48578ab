use crate::config::PhaseTiming;
use crate::control_system::registry::JunctionRegistry;
use crate::error::ControlError;
use crate::models::junction::{JunctionId, Phase};

/// Arbitrates operator intervention against the automatic cycle.
///
/// Precedence, highest first: emergency preemption (never blocked), manual
/// phase commands (only with manual override on, only for the selected
/// junction), then automatic scheduling.
#[derive(Debug, Clone, Default)]
pub struct OverrideArbiter {
    timing: PhaseTiming,
}

impl OverrideArbiter {
    pub fn new(timing: PhaseTiming) -> Self {
        Self { timing }
    }

    /// Forces `junction` to NS-Green for the preemption window and turns
    /// emergency mode on.
    pub fn trigger_emergency_preemption(
        &self,
        registry: &mut JunctionRegistry,
        junction: &JunctionId,
    ) -> Result<(), ControlError> {
        registry.get(junction)?;
        registry.assign_phase(junction, Phase::NsGreen, self.timing.preemption_secs)?;
        registry.set_emergency_mode(true);
        log::info!(
            "Emergency preemption at {}: NS-Green for {}s",
            junction,
            self.timing.preemption_secs
        );
        Ok(())
    }

    /// Operator-chosen phase for the selected junction.
    pub fn issue_phase_command(
        &self,
        registry: &mut JunctionRegistry,
        junction: &JunctionId,
        phase: Phase,
    ) -> Result<(), ControlError> {
        self.admit_phase_command(registry, junction)?;
        if !registry.get(junction)?.has_phase(phase) {
            return Err(ControlError::InvalidPhaseCommand {
                junction: junction.clone(),
                phase: phase.to_string(),
            });
        }

        registry.assign_phase(junction, phase, self.timing.manual_command_secs)?;
        log::info!(
            "Manual phase command at {}: {} for {}s",
            junction,
            phase,
            self.timing.manual_command_secs
        );
        Ok(())
    }

    /// Gate for manual phase commands, checked before the phase itself is
    /// looked at: the junction must exist, manual override must be on and
    /// the junction must be the selected one.
    pub fn admit_phase_command(
        &self,
        registry: &JunctionRegistry,
        junction: &JunctionId,
    ) -> Result<(), ControlError> {
        registry.get(junction)?;
        if !registry.manual_override() {
            log::warn!("Phase command for {} ignored: manual override is off", junction);
            return Err(ControlError::CommandRejected {
                junction: junction.clone(),
                reason: "manual override is off".to_string(),
            });
        }
        if registry.selected() != junction {
            log::warn!(
                "Phase command for {} ignored: {} is the selected junction",
                junction,
                registry.selected()
            );
            return Err(ControlError::CommandRejected {
                junction: junction.clone(),
                reason: format!("junction is not selected (selected: {})", registry.selected()),
            });
        }
        Ok(())
    }

    /// Toggles the global suspension of automatic cycling. Touches no junction.
    pub fn set_manual_override(&self, registry: &mut JunctionRegistry, enabled: bool) {
        if registry.manual_override() != enabled {
            log::info!("Manual override {}", if enabled { "ON" } else { "OFF" });
        }
        registry.set_manual_override(enabled);
    }

    /// Changes the duration policy only; no junction changes phase.
    pub fn set_emergency_mode(&self, registry: &mut JunctionRegistry, enabled: bool) {
        if registry.emergency_mode() != enabled {
            log::info!("Emergency mode {}", if enabled { "ON" } else { "OFF" });
        }
        registry.set_emergency_mode(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seed::create_junctions;

    fn registry() -> JunctionRegistry {
        JunctionRegistry::new(create_junctions(), JunctionId::new("anna-salai-mount"))
    }

    fn anna() -> JunctionId {
        JunctionId::new("anna-salai-mount")
    }

    #[test]
    fn phase_command_without_override_leaves_state_untouched() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        let before = registry.get(&anna()).unwrap().clone();

        let err = arbiter
            .issue_phase_command(&mut registry, &anna(), Phase::EwGreen)
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandRejected { .. }));
        assert_eq!(registry.get(&anna()).unwrap(), &before);
    }

    #[test]
    fn phase_command_with_override_sets_thirty_seconds() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        arbiter.set_manual_override(&mut registry, true);

        arbiter
            .issue_phase_command(&mut registry, &anna(), Phase::EwRed)
            .unwrap();
        let junction = registry.get(&anna()).unwrap();
        assert_eq!(junction.phase, Phase::EwRed);
        assert_eq!(junction.time_left, 30);
    }

    #[test]
    fn phase_command_for_unselected_junction_is_rejected() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        arbiter.set_manual_override(&mut registry, true);
        let other = JunctionId::new("ecr-mahabalipuram");

        let err = arbiter
            .issue_phase_command(&mut registry, &other, Phase::NsGreen)
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandRejected { .. }));
        assert_eq!(registry.get(&other).unwrap().phase, Phase::NsRed);
    }

    #[test]
    fn override_is_checked_before_phase_membership() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        registry.junctions_mut().for_each(|j| j.phases = vec![Phase::NsGreen, Phase::NsRed]);
        let before = registry.get(&anna()).unwrap().clone();

        let err = arbiter
            .issue_phase_command(&mut registry, &anna(), Phase::EwGreen)
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandRejected { .. }));
        assert_eq!(registry.get(&anna()).unwrap(), &before);

        arbiter.set_manual_override(&mut registry, true);
        let err = arbiter
            .issue_phase_command(&mut registry, &anna(), Phase::EwGreen)
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidPhaseCommand { .. }));
    }

    #[test]
    fn phase_command_for_unknown_junction() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        arbiter.set_manual_override(&mut registry, true);
        let err = arbiter
            .issue_phase_command(&mut registry, &JunctionId::new("x"), Phase::NsGreen)
            .unwrap_err();
        assert_eq!(err, ControlError::InvalidJunctionReference(JunctionId::new("x")));
    }

    #[test]
    fn preemption_ignores_manual_override() {
        let arbiter = OverrideArbiter::default();
        for manual in [false, true] {
            let mut registry = registry();
            arbiter.set_manual_override(&mut registry, manual);
            let target = JunctionId::new("ecr-mahabalipuram");

            arbiter
                .trigger_emergency_preemption(&mut registry, &target)
                .unwrap();
            let junction = registry.get(&target).unwrap();
            assert_eq!(junction.phase, Phase::NsGreen);
            assert_eq!(junction.time_left, 60);
            assert!(registry.emergency_mode());
            assert_eq!(registry.manual_override(), manual);
        }
    }

    #[test]
    fn preemption_of_unknown_junction_changes_nothing() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        assert!(arbiter
            .trigger_emergency_preemption(&mut registry, &JunctionId::new("x"))
            .is_err());
        assert!(!registry.emergency_mode());
    }

    #[test]
    fn mode_toggles_do_not_touch_junctions() {
        let arbiter = OverrideArbiter::default();
        let mut registry = registry();
        let before: Vec<_> = registry.iter().cloned().collect();
        arbiter.set_emergency_mode(&mut registry, true);
        arbiter.set_manual_override(&mut registry, true);
        let after: Vec<_> = registry.iter().cloned().collect();
        assert_eq!(before, after);
        assert!(registry.emergency_mode() && registry.manual_override());
    }
}
