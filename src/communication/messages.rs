use serde::{Deserialize, Serialize};

use crate::control_system::incident_workflow::{Notice, ResolutionOutcome};
use crate::control_system::phase_scheduler::PhaseTransition;
use crate::control_system::registry::ModeState;
use crate::models::incident::{Incident, IncidentId};
use crate::models::junction::{JunctionId, Phase};
use crate::models::recommendation::{Recommendation, Verdict};

/// Operator and detection-feed commands accepted by the control engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SelectJunction {
        junction: JunctionId,
    },
    SetManualOverride {
        enabled: bool,
    },
    SetEmergencyMode {
        enabled: bool,
    },
    IssuePhaseCommand {
        junction: JunctionId,
        /// Phase name, e.g. `NS-Green`.
        phase: String,
    },
    TriggerEmergencyPreemption {
        junction: JunctionId,
    },
    AcceptRecommendation,
    DeclineRecommendation,
    ResolveIncident {
        incident: IncidentId,
        action: String,
    },
    /// Resolve with the incident's first listed action.
    ResolveIncidentDefault {
        incident: IncidentId,
    },
    ReportIncident {
        incident: Box<Incident>,
    },
    UpdateDetection {
        junction: JunctionId,
        emergency_vehicle_present: bool,
        accident_present: bool,
    },
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Done,
    Resolved(ResolutionOutcome),
    ReplacementScheduled { delay_ms: u64 },
}

/// Wire envelope for commands arriving over the message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub request_id: u64,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub request_id: u64,
    pub result: Result<CommandOutcome, String>,
}

/// Everything observable that the core did, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    PhaseChanged(PhaseTransition),
    PhaseCommanded { junction: JunctionId, phase: Phase },
    Preempted { junction: JunctionId },
    ModeChanged(ModeState),
    DetectionUpdated { junction: JunctionId },
    IncidentReported { incident: IncidentId },
    IncidentResolved(ResolutionOutcome),
    Notification { notice: Notice },
    RecommendationDecided { verdict: Verdict },
    RecommendationReplaced(Recommendation),
}

impl ControlEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlEvent::PhaseChanged(_) => "phase_changed",
            ControlEvent::PhaseCommanded { .. } => "phase_commanded",
            ControlEvent::Preempted { .. } => "preempted",
            ControlEvent::ModeChanged(_) => "mode_changed",
            ControlEvent::DetectionUpdated { .. } => "detection_updated",
            ControlEvent::IncidentReported { .. } => "incident_reported",
            ControlEvent::IncidentResolved(_) => "incident_resolved",
            ControlEvent::Notification { .. } => "notification",
            ControlEvent::RecommendationDecided { .. } => "recommendation_decided",
            ControlEvent::RecommendationReplaced(_) => "recommendation_replaced",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_request_reads_flat_json() {
        let raw = r#"{ "request_id": 7, "command": "issue_phase_command", "junction": "anna-salai-mount", "phase": "EW Green" }"#;
        let request: CommandRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.request_id, 7);
        assert_eq!(
            request.command,
            Command::IssuePhaseCommand {
                junction: JunctionId::new("anna-salai-mount"),
                phase: "EW Green".to_string(),
            }
        );
    }

    #[test]
    fn unit_commands_parse() {
        let request: CommandRequest =
            serde_json::from_str(r#"{ "request_id": 1, "command": "accept_recommendation" }"#).unwrap();
        assert_eq!(request.command, Command::AcceptRecommendation);
    }
}
