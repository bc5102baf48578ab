//! Errors returned by control commands.
//!
//! Every failure is local to the command that caused it: the tick loop and the
//! other junctions are never affected by a rejected command.

use crate::models::incident::IncidentId;
use crate::models::junction::JunctionId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// No junction is registered under this id.
    #[error("unknown junction: {0}")]
    InvalidJunctionReference(JunctionId),

    /// The requested phase is not part of the junction's phase sequence.
    #[error("phase {phase:?} is not valid for junction {junction}")]
    InvalidPhaseCommand { junction: JunctionId, phase: String },

    /// Manual phase commands need manual override on and the junction selected.
    #[error("phase command for {junction} rejected: {reason}")]
    CommandRejected { junction: JunctionId, reason: String },

    /// The incident already carries a resolution.
    #[error("incident {0} is already resolved")]
    DuplicateResolution(IncidentId),

    #[error("unknown incident: {0}")]
    UnknownIncident(IncidentId),

    #[error("incident {0} is already registered")]
    DuplicateIncident(IncidentId),

    #[error("incident {0} has no available actions")]
    NoAvailableAction(IncidentId),

    /// Accept/decline only applies while the current recommendation is undecided.
    #[error("current recommendation was already {0}")]
    RecommendationAlreadyDecided(&'static str),

    /// The owner task is gone (shutdown or panic).
    #[error("control engine is not running")]
    EngineUnavailable,
}
