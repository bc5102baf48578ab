use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidentId(pub u32);

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Type-specific payload, one variant per incident type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IncidentDetails {
    Emergency {
        vehicle_type: String,
        direction: String,
        eta: String,
    },
    Accident {
        severity: String,
        vehicles_involved: u32,
        injuries: String,
    },
    Congestion {
        queue_length: u32,
        suggestion: String,
    },
}

impl IncidentDetails {
    pub fn kind(&self) -> &'static str {
        match self {
            IncidentDetails::Emergency { .. } => "emergency",
            IncidentDetails::Accident { .. } => "accident",
            IncidentDetails::Congestion { .. } => "congestion",
        }
    }
}

/// Filled in once, when the incident is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub action: String,
    pub resolved_time: DateTime<Local>,
}

/// A detected event awaiting an operator decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: IncidentId,
    pub location: String,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub priority: Priority,
    pub details: IncidentDetails,
    /// Free-text narrative from the detection feed.
    #[serde(default)]
    pub description: String,
    /// Resolution actions offered to the operator, in display order.
    pub actions: Vec<String>,
    pub resolution: Option<Resolution>,
}

impl Incident {
    pub fn new(
        id: u32,
        location: &str,
        message: &str,
        timestamp: DateTime<Local>,
        priority: Priority,
        details: IncidentDetails,
        actions: &[&str],
    ) -> Self {
        Self {
            id: IncidentId(id),
            location: location.to_string(),
            message: message.to_string(),
            timestamp,
            priority,
            details,
            description: String::new(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resolution: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolved_action(&self) -> Option<&str> {
        self.resolution.as_ref().map(|r| r.action.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seed::create_incidents;

    #[test]
    fn seeded_incidents_carry_detection_narrative() {
        let incidents = create_incidents();
        assert_eq!(
            incidents[0].description,
            "Emergency vehicle detected via OpenCV. Estimated arrival: 2 minutes."
        );
        assert!(incidents.iter().all(|incident| !incident.description.is_empty()));
    }

    #[test]
    fn description_survives_the_wire_and_defaults_when_absent() {
        let incident = create_incidents().remove(1);
        let json = serde_json::to_value(&incident).unwrap();
        assert_eq!(
            json["description"],
            "OpenCV detected sudden stop pattern. 2 vehicles involved, minor damage."
        );

        let mut without = json.clone();
        without.as_object_mut().unwrap().remove("description");
        let decoded: Incident = serde_json::from_value(without).unwrap();
        assert_eq!(decoded.description, "");
        assert_eq!(decoded.details, incident.details);
    }
}
