use serde::{Deserialize, Serialize};

/// Operator verdict on the live recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pending,
    Accepted,
    Declined,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pending => "pending",
            Verdict::Accepted => "accepted",
            Verdict::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub suggestion: String,
    /// 0 to 100.
    pub confidence: u8,
    pub reason: String,
    pub accepted: Verdict,
}

impl Recommendation {
    pub fn new(suggestion: &str, confidence: u8, reason: &str) -> Self {
        Self {
            suggestion: suggestion.to_string(),
            confidence: confidence.min(100),
            reason: reason.to_string(),
            accepted: Verdict::Pending,
        }
    }
}

/// Where recommendations come from. Implementations return fresh,
/// undecided recommendations.
pub trait SuggestionSource: Send {
    fn initial(&mut self) -> Recommendation;
    fn after_accept(&mut self) -> Recommendation;
    fn after_decline(&mut self) -> Recommendation;
}

/// The fixed three-suggestion script used by the control room.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptedSuggestions;

impl SuggestionSource for ScriptedSuggestions {
    fn initial(&mut self) -> Recommendation {
        Recommendation::new(
            "Extend NS green phase by 15s to clear queue",
            93,
            "High density detected, queue length increasing",
        )
    }

    fn after_accept(&mut self) -> Recommendation {
        Recommendation::new(
            "Optimize EW phase timing based on queue analysis",
            87,
            "Traffic pattern analysis suggests timing adjustment",
        )
    }

    fn after_decline(&mut self) -> Recommendation {
        Recommendation::new(
            "Consider emergency vehicle priority routing",
            91,
            "Emergency vehicle detected in nearby junction",
        )
    }
}
