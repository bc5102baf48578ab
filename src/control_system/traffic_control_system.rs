use chrono::{DateTime, Local};

use crate::communication::messages::{Command, CommandOutcome, ControlEvent};
use crate::config::EngineConfig;
use crate::control_system::incident_workflow::{IncidentWorkflow, Notice, ResolutionOutcome};
use crate::control_system::metrics::{apply_metric_tick, NoiseSource, SeededNoise};
use crate::control_system::override_arbiter::OverrideArbiter;
use crate::control_system::phase_scheduler::{PhaseScheduler, PhaseTransition};
use crate::control_system::recommendation_engine::{RecommendationEngine, ScheduledReplacement};
use crate::control_system::registry::JunctionRegistry;
use crate::error::ControlError;
use crate::models::incident::{Incident, IncidentId};
use crate::models::junction::{JunctionId, JunctionState, Phase};
use crate::models::recommendation::{ScriptedSuggestions, SuggestionSource, Verdict};
use crate::models::seed::{create_incidents, create_junctions};
use crate::shared_data::{current_timestamp, ControlSnapshot, JunctionView};

const RECENT_RESOLUTIONS: usize = 2;

/// Result of applying one command: what to reply, what to broadcast, and
/// an optional recommendation timer to arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub outcome: CommandOutcome,
    pub events: Vec<ControlEvent>,
    pub schedule: Option<ScheduledReplacement>,
}

impl Applied {
    fn done(events: Vec<ControlEvent>) -> Self {
        Self {
            outcome: CommandOutcome::Done,
            events,
            schedule: None,
        }
    }
}

/// The whole control core behind one `&mut` receiver. Not thread-safe by
/// itself; the engine gives it a single owner task.
pub struct TrafficControlSystem {
    registry: JunctionRegistry,
    scheduler: PhaseScheduler,
    arbiter: OverrideArbiter,
    incidents: IncidentWorkflow,
    recommendations: RecommendationEngine,
    noise: Box<dyn NoiseSource>,
    ticks: u64,
}

impl TrafficControlSystem {
    pub fn new(
        config: &EngineConfig,
        junctions: Vec<JunctionState>,
        incidents: Vec<Incident>,
        suggestions: Box<dyn SuggestionSource>,
        noise: Box<dyn NoiseSource>,
    ) -> Self {
        Self {
            registry: JunctionRegistry::new(junctions, config.initial_junction.clone()),
            scheduler: PhaseScheduler::new(config.timing.clone()),
            arbiter: OverrideArbiter::new(config.timing.clone()),
            incidents: IncidentWorkflow::new(incidents),
            recommendations: RecommendationEngine::new(config.recommendation.clone(), suggestions),
            noise,
            ticks: 0,
        }
    }

    /// Seed junctions and incidents, scripted suggestions, seeded noise.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config,
            create_junctions(),
            create_incidents(),
            Box::new(ScriptedSuggestions),
            Box::new(SeededNoise::new(config.noise_seed)),
        )
    }

    pub fn registry(&self) -> &JunctionRegistry {
        &self.registry
    }

    pub fn incidents(&self) -> &IncidentWorkflow {
        &self.incidents
    }

    pub fn recommendations(&self) -> &RecommendationEngine {
        &self.recommendations
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ---- clock --------------------------------------------------------

    pub fn on_phase_tick(&mut self) -> Vec<PhaseTransition> {
        self.ticks += 1;
        self.scheduler.on_phase_tick(&mut self.registry)
    }

    pub fn on_metric_tick(&mut self) {
        if let Err(e) = apply_metric_tick(&mut self.registry, self.noise.as_mut()) {
            log::warn!("Metric tick skipped: {}", e);
        }
    }

    // ---- commands -----------------------------------------------------

    pub fn select_junction(&mut self, id: &JunctionId) -> Result<(), ControlError> {
        self.registry.select(id)?;
        log::info!("Selected junction {}", id);
        Ok(())
    }

    pub fn set_manual_override(&mut self, enabled: bool) {
        self.arbiter.set_manual_override(&mut self.registry, enabled);
    }

    pub fn set_emergency_mode(&mut self, enabled: bool) {
        self.arbiter.set_emergency_mode(&mut self.registry, enabled);
    }

    pub fn issue_phase_command(&mut self, id: &JunctionId, phase: Phase) -> Result<(), ControlError> {
        self.arbiter.issue_phase_command(&mut self.registry, id, phase)
    }

    pub fn trigger_emergency_preemption(&mut self, id: &JunctionId) -> Result<(), ControlError> {
        self.arbiter.trigger_emergency_preemption(&mut self.registry, id)
    }

    pub fn accept_recommendation(&mut self) -> Result<ScheduledReplacement, ControlError> {
        self.recommendations.accept(&mut self.registry)
    }

    pub fn decline_recommendation(&mut self) -> Result<ScheduledReplacement, ControlError> {
        self.recommendations.decline()
    }

    /// Called by the owner when a recommendation timer fires.
    pub fn install_recommendation(&mut self, generation: u64) -> Option<ControlEvent> {
        self.recommendations
            .install(generation)
            .map(|installed| ControlEvent::RecommendationReplaced(installed.clone()))
    }

    pub fn cancel_pending_recommendation(&mut self) -> Option<u64> {
        self.recommendations.cancel_pending()
    }

    pub fn resolve_incident(
        &mut self,
        id: IncidentId,
        action: &str,
        now: DateTime<Local>,
    ) -> Result<ResolutionOutcome, ControlError> {
        self.incidents
            .resolve(&self.arbiter, &mut self.registry, id, action, now)
    }

    pub fn resolve_incident_default(
        &mut self,
        id: IncidentId,
        now: DateTime<Local>,
    ) -> Result<ResolutionOutcome, ControlError> {
        self.incidents
            .resolve_default(&self.arbiter, &mut self.registry, id, now)
    }

    pub fn report_incident(&mut self, incident: Incident) -> Result<(), ControlError> {
        self.incidents.report(incident)
    }

    pub fn update_detection(
        &mut self,
        id: &JunctionId,
        emergency_vehicle_present: bool,
        accident_present: bool,
    ) -> Result<(), ControlError> {
        self.registry
            .update_detection(id, emergency_vehicle_present, accident_present)
    }

    /// Dispatches a wire command to the matching operation.
    pub fn apply(&mut self, command: Command, now: DateTime<Local>) -> Result<Applied, ControlError> {
        match command {
            Command::SelectJunction { junction } => {
                self.select_junction(&junction)?;
                Ok(Applied::done(vec![self.mode_changed()]))
            }
            Command::SetManualOverride { enabled } => {
                self.set_manual_override(enabled);
                Ok(Applied::done(vec![self.mode_changed()]))
            }
            Command::SetEmergencyMode { enabled } => {
                self.set_emergency_mode(enabled);
                Ok(Applied::done(vec![self.mode_changed()]))
            }
            Command::IssuePhaseCommand { junction, phase } => {
                self.arbiter.admit_phase_command(&self.registry, &junction)?;
                let phase = phase.parse::<Phase>().map_err(|e| ControlError::InvalidPhaseCommand {
                    junction: junction.clone(),
                    phase: e.0,
                })?;
                self.issue_phase_command(&junction, phase)?;
                Ok(Applied::done(vec![ControlEvent::PhaseCommanded { junction, phase }]))
            }
            Command::TriggerEmergencyPreemption { junction } => {
                self.trigger_emergency_preemption(&junction)?;
                Ok(Applied::done(vec![
                    ControlEvent::Preempted { junction },
                    self.mode_changed(),
                ]))
            }
            Command::AcceptRecommendation => {
                let scheduled = self.accept_recommendation()?;
                Ok(self.scheduled(Verdict::Accepted, scheduled))
            }
            Command::DeclineRecommendation => {
                let scheduled = self.decline_recommendation()?;
                Ok(self.scheduled(Verdict::Declined, scheduled))
            }
            Command::ResolveIncident { incident, action } => {
                let outcome = self.resolve_incident(incident, &action, now)?;
                Ok(self.resolved(outcome))
            }
            Command::ResolveIncidentDefault { incident } => {
                let outcome = self.resolve_incident_default(incident, now)?;
                Ok(self.resolved(outcome))
            }
            Command::ReportIncident { incident } => {
                let id = incident.id;
                self.report_incident(*incident)?;
                Ok(Applied::done(vec![ControlEvent::IncidentReported { incident: id }]))
            }
            Command::UpdateDetection {
                junction,
                emergency_vehicle_present,
                accident_present,
            } => {
                self.update_detection(&junction, emergency_vehicle_present, accident_present)?;
                Ok(Applied::done(vec![ControlEvent::DetectionUpdated { junction }]))
            }
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            tick: self.ticks,
            timestamp: current_timestamp(),
            junctions: self.registry.iter().map(JunctionView::from).collect(),
            unresolved_incidents: self.incidents.unresolved().cloned().collect(),
            resolved_incidents: self.incidents.resolved().cloned().collect(),
            active_incident_count: self.incidents.active_count(),
            recent_resolutions: self
                .incidents
                .recently_resolved(RECENT_RESOLUTIONS)
                .iter()
                .map(|incident| incident.id)
                .collect(),
            recommendation: self.recommendations.current().clone(),
            mode: self.registry.mode().clone(),
        }
    }

    fn mode_changed(&self) -> ControlEvent {
        ControlEvent::ModeChanged(self.registry.mode().clone())
    }

    fn scheduled(&self, verdict: Verdict, scheduled: ScheduledReplacement) -> Applied {
        Applied {
            outcome: CommandOutcome::ReplacementScheduled {
                delay_ms: u64::try_from(scheduled.delay.as_millis()).unwrap_or(u64::MAX),
            },
            events: vec![ControlEvent::RecommendationDecided { verdict }],
            schedule: Some(scheduled),
        }
    }

    fn resolved(&self, outcome: ResolutionOutcome) -> Applied {
        let mut events = vec![ControlEvent::IncidentResolved(outcome.clone())];
        if let Some(notice) = outcome.notice {
            events.push(ControlEvent::Notification { notice });
            if notice == Notice::SignalPreemptionActivated {
                events.push(ControlEvent::Preempted {
                    junction: self.registry.selected().clone(),
                });
                events.push(self.mode_changed());
            }
        }
        Applied {
            outcome: CommandOutcome::Resolved(outcome),
            events,
            schedule: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_system::metrics::ConstantNoise;

    fn system() -> TrafficControlSystem {
        let config = EngineConfig::default();
        TrafficControlSystem::new(
            &config,
            create_junctions(),
            create_incidents(),
            Box::new(ScriptedSuggestions),
            Box::new(ConstantNoise(0.2)),
        )
    }

    fn anna() -> JunctionId {
        JunctionId::new("anna-salai-mount")
    }

    #[test]
    fn phase_command_parses_dashboard_names() {
        let mut system = system();
        system
            .apply(Command::SetManualOverride { enabled: true }, Local::now())
            .unwrap();
        let applied = system
            .apply(
                Command::IssuePhaseCommand {
                    junction: anna(),
                    phase: "EW Green".to_string(),
                },
                Local::now(),
            )
            .unwrap();
        assert_eq!(
            applied.events,
            vec![ControlEvent::PhaseCommanded {
                junction: anna(),
                phase: Phase::EwGreen
            }]
        );
        let snapshot = system.snapshot();
        let junction = snapshot.junction("anna-salai-mount").unwrap();
        assert_eq!((junction.phase, junction.time_left), (Phase::EwGreen, 30));
    }

    #[test]
    fn unparseable_phase_without_override_is_rejected() {
        let mut system = system();
        let before = system.snapshot();
        let err = system
            .apply(
                Command::IssuePhaseCommand {
                    junction: anna(),
                    phase: "NS-Purple".to_string(),
                },
                Local::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandRejected { .. }));
        assert_eq!(system.snapshot().junctions, before.junctions);
    }

    #[test]
    fn unknown_phase_name_is_invalid_phase_command() {
        let mut system = system();
        system.set_manual_override(true);
        let err = system
            .apply(
                Command::IssuePhaseCommand {
                    junction: anna(),
                    phase: "NS-Purple".to_string(),
                },
                Local::now(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::InvalidPhaseCommand {
                junction: anna(),
                phase: "NS-Purple".to_string()
            }
        );
    }

    #[test]
    fn failed_command_leaves_snapshot_unchanged() {
        let mut system = system();
        let before = system.snapshot();
        assert!(system
            .apply(
                Command::IssuePhaseCommand {
                    junction: anna(),
                    phase: "EW-Red".to_string(),
                },
                Local::now(),
            )
            .is_err());
        let after = system.snapshot();
        assert_eq!(before.junctions, after.junctions);
        assert_eq!(before.mode, after.mode);
    }

    #[test]
    fn clear_traffic_signal_emits_resolution_notice_and_preemption() {
        let mut system = system();
        let applied = system
            .apply(
                Command::ResolveIncident {
                    incident: IncidentId(1),
                    action: "Clear traffic signal".to_string(),
                },
                Local::now(),
            )
            .unwrap();
        assert!(matches!(applied.events[0], ControlEvent::IncidentResolved(_)));
        assert!(applied.events.contains(&ControlEvent::Notification {
            notice: Notice::SignalPreemptionActivated
        }));
        assert!(applied.events.contains(&ControlEvent::Preempted { junction: anna() }));

        let snapshot = system.snapshot();
        assert_eq!(snapshot.active_incident_count, 2);
        assert_eq!(snapshot.recent_resolutions, vec![IncidentId(1)]);
        assert!(snapshot.mode.emergency_mode);
    }

    #[test]
    fn metric_tick_follows_selection() {
        let mut system = system();
        system.select_junction(&JunctionId::new("ecr-mahabalipuram")).unwrap();
        system.on_metric_tick();
        let snapshot = system.snapshot();
        assert_eq!(snapshot.junction("anna-salai-mount").unwrap().density, 85.0);
        assert!((snapshot.junction("ecr-mahabalipuram").unwrap().density - 35.0).abs() < 1e-9);
    }

    #[test]
    fn accept_reports_scheduled_delay() {
        let mut system = system();
        let applied = system.apply(Command::AcceptRecommendation, Local::now()).unwrap();
        assert_eq!(applied.outcome, CommandOutcome::ReplacementScheduled { delay_ms: 5000 });
        let scheduled = applied.schedule.unwrap();
        let event = system.install_recommendation(scheduled.generation).unwrap();
        assert!(matches!(event, ControlEvent::RecommendationReplaced(_)));
        assert_eq!(system.snapshot().recommendation.accepted, Verdict::Pending);
    }
}
