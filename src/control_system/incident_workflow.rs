use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::control_system::override_arbiter::OverrideArbiter;
use crate::control_system::registry::JunctionRegistry;
use crate::error::ControlError;
use crate::models::incident::{Incident, IncidentId, Resolution};

/// External notifications raised by resolution actions. The core only
/// reports them; delivering them is up to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    SignalPreemptionActivated,
    TrafficPoliceDispatched,
    HospitalContacted,
    NearbyJunctionsAlerted,
}

enum SideEffect {
    PreemptSelected,
    Notify(Notice),
}

fn side_effect_for(action: &str) -> Option<SideEffect> {
    match action {
        "Clear traffic signal" => Some(SideEffect::PreemptSelected),
        "Dispatch traffic police" => Some(SideEffect::Notify(Notice::TrafficPoliceDispatched)),
        "Contact nearest hospital" => Some(SideEffect::Notify(Notice::HospitalContacted)),
        "Alert nearby junctions" => Some(SideEffect::Notify(Notice::NearbyJunctionsAlerted)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub incident: IncidentId,
    pub action: String,
    pub notice: Option<Notice>,
}

/// Incident records in arrival order. Records are never removed and a
/// resolution is never overwritten.
#[derive(Debug, Clone, Default)]
pub struct IncidentWorkflow {
    incidents: Vec<Incident>,
}

impl IncidentWorkflow {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self { incidents }
    }

    pub fn all(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn get(&self, id: IncidentId) -> Option<&Incident> {
        self.incidents.iter().find(|incident| incident.id == id)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &Incident> {
        self.incidents.iter().filter(|incident| !incident.is_resolved())
    }

    pub fn resolved(&self) -> impl Iterator<Item = &Incident> {
        self.incidents.iter().filter(|incident| incident.is_resolved())
    }

    pub fn active_count(&self) -> usize {
        self.unresolved().count()
    }

    /// The last `n` resolved incidents in record order.
    pub fn recently_resolved(&self, n: usize) -> Vec<&Incident> {
        let resolved: Vec<&Incident> = self.resolved().collect();
        let skip = resolved.len().saturating_sub(n);
        resolved.into_iter().skip(skip).collect()
    }

    /// Adds an incident from the detection feed.
    pub fn report(&mut self, mut incident: Incident) -> Result<(), ControlError> {
        if self.get(incident.id).is_some() {
            return Err(ControlError::DuplicateIncident(incident.id));
        }
        incident.resolution = None;
        log::info!(
            "Incident {} reported at {}: {}",
            incident.id,
            incident.location,
            incident.message
        );
        self.incidents.push(incident);
        Ok(())
    }

    /// Marks the incident resolved with `action` and runs the action's side
    /// effect. A preemption side effect that fails leaves the incident open.
    pub fn resolve(
        &mut self,
        arbiter: &OverrideArbiter,
        registry: &mut JunctionRegistry,
        id: IncidentId,
        action: &str,
        now: DateTime<Local>,
    ) -> Result<ResolutionOutcome, ControlError> {
        let incident = self
            .incidents
            .iter_mut()
            .find(|incident| incident.id == id)
            .ok_or(ControlError::UnknownIncident(id))?;
        if incident.is_resolved() {
            return Err(ControlError::DuplicateResolution(id));
        }
        if !incident.actions.iter().any(|a| a == action) {
            log::warn!("Incident {} resolved with unlisted action {:?}", id, action);
        }

        let notice = match side_effect_for(action) {
            Some(SideEffect::PreemptSelected) => {
                let selected = registry.selected().clone();
                arbiter.trigger_emergency_preemption(registry, &selected)?;
                Some(Notice::SignalPreemptionActivated)
            }
            Some(SideEffect::Notify(notice)) => Some(notice),
            None => None,
        };

        incident.resolution = Some(Resolution {
            action: action.to_string(),
            resolved_time: now,
        });
        log::info!("Incident {} resolved: {}", id, action);

        Ok(ResolutionOutcome {
            incident: id,
            action: action.to_string(),
            notice,
        })
    }

    /// Resolves with the first listed action.
    pub fn resolve_default(
        &mut self,
        arbiter: &OverrideArbiter,
        registry: &mut JunctionRegistry,
        id: IncidentId,
        now: DateTime<Local>,
    ) -> Result<ResolutionOutcome, ControlError> {
        let action = self
            .get(id)
            .ok_or(ControlError::UnknownIncident(id))?
            .actions
            .first()
            .cloned()
            .ok_or(ControlError::NoAvailableAction(id))?;
        self.resolve(arbiter, registry, id, &action, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::incident::{IncidentDetails, Priority};
    use crate::models::junction::{JunctionId, Phase};
    use crate::models::seed::{create_incidents, create_junctions};

    struct Fixture {
        workflow: IncidentWorkflow,
        arbiter: OverrideArbiter,
        registry: JunctionRegistry,
    }

    fn fixture() -> Fixture {
        Fixture {
            workflow: IncidentWorkflow::new(create_incidents()),
            arbiter: OverrideArbiter::default(),
            registry: JunctionRegistry::new(create_junctions(), JunctionId::new("ecr-mahabalipuram")),
        }
    }

    #[test]
    fn resolve_moves_exactly_one_record() {
        let mut f = fixture();
        let outcome = f
            .workflow
            .resolve(&f.arbiter, &mut f.registry, IncidentId(2), "Redirect traffic", Local::now())
            .unwrap();

        assert_eq!(outcome.notice, None);
        assert_eq!(f.workflow.unresolved().count(), 2);
        assert_eq!(f.workflow.resolved().count(), 1);
        assert_eq!(
            f.workflow.get(IncidentId(2)).unwrap().resolved_action(),
            Some("Redirect traffic")
        );
    }

    #[test]
    fn second_resolution_is_rejected_and_keeps_first() {
        let mut f = fixture();
        f.workflow
            .resolve(&f.arbiter, &mut f.registry, IncidentId(2), "Dispatch traffic police", Local::now())
            .unwrap();
        let err = f
            .workflow
            .resolve(&f.arbiter, &mut f.registry, IncidentId(2), "Clear debris", Local::now())
            .unwrap_err();

        assert_eq!(err, ControlError::DuplicateResolution(IncidentId(2)));
        assert_eq!(
            f.workflow.get(IncidentId(2)).unwrap().resolved_action(),
            Some("Dispatch traffic police")
        );
        assert_eq!(f.workflow.resolved().count(), 1);
    }

    #[test]
    fn clear_traffic_signal_preempts_selected_junction() {
        let mut f = fixture();
        let outcome = f
            .workflow
            .resolve(&f.arbiter, &mut f.registry, IncidentId(1), "Clear traffic signal", Local::now())
            .unwrap();

        assert_eq!(outcome.notice, Some(Notice::SignalPreemptionActivated));
        let selected = f.registry.get(&JunctionId::new("ecr-mahabalipuram")).unwrap();
        assert_eq!(selected.phase, Phase::NsGreen);
        assert_eq!(selected.time_left, 60);
        assert!(f.registry.emergency_mode());
    }

    #[test]
    fn notification_actions_do_not_mutate_junctions() {
        let mut f = fixture();
        let before: Vec<_> = f.registry.iter().cloned().collect();
        let outcome = f
            .workflow
            .resolve(&f.arbiter, &mut f.registry, IncidentId(2), "Contact nearest hospital", Local::now())
            .unwrap();
        assert_eq!(outcome.notice, Some(Notice::HospitalContacted));
        let after: Vec<_> = f.registry.iter().cloned().collect();
        assert_eq!(before, after);
        assert!(!f.registry.emergency_mode());
    }

    #[test]
    fn unknown_incident() {
        let mut f = fixture();
        let err = f
            .workflow
            .resolve(&f.arbiter, &mut f.registry, IncidentId(99), "Clear debris", Local::now())
            .unwrap_err();
        assert_eq!(err, ControlError::UnknownIncident(IncidentId(99)));
    }

    #[test]
    fn default_resolution_uses_first_action() {
        let mut f = fixture();
        let outcome = f
            .workflow
            .resolve_default(&f.arbiter, &mut f.registry, IncidentId(3), Local::now())
            .unwrap();
        assert_eq!(outcome.action, "Extend green phase");
    }

    #[test]
    fn report_rejects_duplicate_ids_and_tracks_recent_resolutions() {
        let mut f = fixture();
        let duplicate = create_incidents().remove(0);
        assert_eq!(
            f.workflow.report(duplicate).unwrap_err(),
            ControlError::DuplicateIncident(IncidentId(1))
        );

        let fresh = Incident::new(
            4,
            "Anna Salai",
            "Stalled bus",
            Local::now(),
            Priority::Medium,
            IncidentDetails::Congestion {
                queue_length: 9,
                suggestion: "Hold EW red".to_string(),
            },
            &[],
        );
        f.workflow.report(fresh).unwrap();
        assert_eq!(f.workflow.active_count(), 4);
        assert_eq!(
            f.workflow
                .resolve_default(&f.arbiter, &mut f.registry, IncidentId(4), Local::now())
                .unwrap_err(),
            ControlError::NoAvailableAction(IncidentId(4))
        );

        for id in [1, 2, 3] {
            f.workflow
                .resolve_default(&f.arbiter, &mut f.registry, IncidentId(id), Local::now())
                .unwrap();
        }
        let recent: Vec<IncidentId> = f.workflow.recently_resolved(2).iter().map(|i| i.id).collect();
        assert_eq!(recent, vec![IncidentId(2), IncidentId(3)]);
    }
}
