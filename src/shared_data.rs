// src/shared_data.rs

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::control_system::registry::ModeState;
use crate::models::incident::{Incident, IncidentId};
use crate::models::junction::{DensityLevel, JunctionState};
use crate::models::recommendation::Recommendation;

/// A junction as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JunctionView {
    #[serde(flatten)]
    pub state: JunctionState,
    pub density_level: DensityLevel,
}

impl From<&JunctionState> for JunctionView {
    fn from(state: &JunctionState) -> Self {
        Self {
            state: state.clone(),
            density_level: state.density_level(),
        }
    }
}

/// Immutable read model of the whole control core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSnapshot {
    /// Phase ticks processed so far.
    pub tick: u64,
    pub timestamp: u64,
    pub junctions: Vec<JunctionView>,
    pub unresolved_incidents: Vec<Incident>,
    pub resolved_incidents: Vec<Incident>,
    pub active_incident_count: usize,
    /// The two most recent resolutions, oldest first.
    pub recent_resolutions: Vec<IncidentId>,
    pub recommendation: Recommendation,
    pub mode: ModeState,
}

impl ControlSnapshot {
    pub fn junction(&self, id: &str) -> Option<&JunctionState> {
        self.junctions
            .iter()
            .map(|view| &view.state)
            .find(|state| state.id.as_str() == id)
    }
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
