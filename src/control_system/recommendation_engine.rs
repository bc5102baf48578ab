use std::time::Duration;

use crate::config::RecommendationPolicy;
use crate::control_system::registry::JunctionRegistry;
use crate::error::ControlError;
use crate::models::recommendation::{Recommendation, ScriptedSuggestions, SuggestionSource, Verdict};

/// A replacement waiting for its delay to elapse. The owner arms a timer for
/// `delay` and calls [`RecommendationEngine::install`] with `generation` when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReplacement {
    pub generation: u64,
    pub delay: Duration,
}

/// Holds the single live recommendation.
pub struct RecommendationEngine {
    current: Recommendation,
    source: Box<dyn SuggestionSource>,
    policy: RecommendationPolicy,
    generation: u64,
    pending: Option<(u64, Recommendation)>,
}

impl RecommendationEngine {
    pub fn new(policy: RecommendationPolicy, mut source: Box<dyn SuggestionSource>) -> Self {
        let current = source.initial();
        Self {
            current,
            source,
            policy,
            generation: 0,
            pending: None,
        }
    }

    pub fn scripted(policy: RecommendationPolicy) -> Self {
        Self::new(policy, Box::new(ScriptedSuggestions))
    }

    pub fn current(&self) -> &Recommendation {
        &self.current
    }

    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|(generation, _)| *generation)
    }

    /// Applies the extension to the selected junction and queues the
    /// follow-up suggestion.
    pub fn accept(&mut self, registry: &mut JunctionRegistry) -> Result<ScheduledReplacement, ControlError> {
        self.ensure_undecided()?;
        let selected = registry.selected().clone();
        let time_left = registry.extend_time_left(&selected, self.policy.accept_extension_secs)?;
        log::info!(
            "Recommendation accepted: {} now has {}s left",
            selected,
            time_left
        );

        self.current.accepted = Verdict::Accepted;
        let replacement = self.source.after_accept();
        Ok(self.schedule(
            replacement,
            Duration::from_millis(self.policy.accept_replacement_delay_ms),
        ))
    }

    pub fn decline(&mut self) -> Result<ScheduledReplacement, ControlError> {
        self.ensure_undecided()?;
        log::info!("Recommendation declined");

        self.current.accepted = Verdict::Declined;
        let replacement = self.source.after_decline();
        Ok(self.schedule(
            replacement,
            Duration::from_millis(self.policy.decline_replacement_delay_ms),
        ))
    }

    /// Installs the replacement queued under `generation`. Stale or
    /// cancelled generations are ignored and return `None`.
    pub fn install(&mut self, generation: u64) -> Option<&Recommendation> {
        match self.pending.take() {
            Some((pending, mut replacement)) if pending == generation => {
                replacement.accepted = Verdict::Pending;
                self.current = replacement;
                log::info!("New recommendation: {}", self.current.suggestion);
                Some(&self.current)
            }
            other => {
                log::debug!("Dropping stale recommendation timer {}", generation);
                self.pending = other;
                None
            }
        }
    }

    /// Drops the queued replacement, if any. Returns its generation.
    pub fn cancel_pending(&mut self) -> Option<u64> {
        self.pending.take().map(|(generation, _)| generation)
    }

    fn schedule(&mut self, replacement: Recommendation, delay: Duration) -> ScheduledReplacement {
        self.generation += 1;
        if let Some((stale, _)) = self.pending.replace((self.generation, replacement)) {
            log::debug!("Replacing pending recommendation {}", stale);
        }
        ScheduledReplacement {
            generation: self.generation,
            delay,
        }
    }

    fn ensure_undecided(&self) -> Result<(), ControlError> {
        match self.current.accepted {
            Verdict::Pending => Ok(()),
            decided => Err(ControlError::RecommendationAlreadyDecided(decided.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::junction::JunctionId;
    use crate::models::seed::create_junctions;

    fn setup() -> (RecommendationEngine, JunctionRegistry) {
        (
            RecommendationEngine::scripted(RecommendationPolicy::default()),
            JunctionRegistry::new(create_junctions(), JunctionId::new("anna-salai-mount")),
        )
    }

    fn anna_time_left(registry: &JunctionRegistry) -> u32 {
        registry.get(&JunctionId::new("anna-salai-mount")).unwrap().time_left
    }

    #[test]
    fn accept_extends_once_and_schedules_follow_up() {
        let (mut engine, mut registry) = setup();
        assert_eq!(engine.current().confidence, 93);

        let scheduled = engine.accept(&mut registry).unwrap();
        assert_eq!(scheduled.delay, Duration::from_secs(5));
        assert_eq!(anna_time_left(&registry), 28 + 15);
        assert_eq!(engine.current().accepted, Verdict::Accepted);

        let err = engine.accept(&mut registry).unwrap_err();
        assert_eq!(err, ControlError::RecommendationAlreadyDecided("accepted"));
        assert_eq!(anna_time_left(&registry), 28 + 15);

        let installed = engine.install(scheduled.generation).unwrap();
        assert_eq!(installed.suggestion, "Optimize EW phase timing based on queue analysis");
        assert_eq!(installed.confidence, 87);
        assert_eq!(installed.accepted, Verdict::Pending);
    }

    #[test]
    fn decline_schedules_different_follow_up_without_touching_junctions() {
        let (mut engine, registry) = setup();
        let before: Vec<_> = registry.iter().cloned().collect();

        let scheduled = engine.decline().unwrap();
        assert_eq!(scheduled.delay, Duration::from_secs(3));
        assert_eq!(engine.current().accepted, Verdict::Declined);
        assert!(engine.decline().is_err());

        engine.install(scheduled.generation).unwrap();
        assert_eq!(engine.current().suggestion, "Consider emergency vehicle priority routing");
        assert_eq!(engine.current().confidence, 91);
        assert_eq!(registry.iter().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let (mut engine, mut registry) = setup();
        let first = engine.accept(&mut registry).unwrap();
        engine.install(first.generation).unwrap();

        let second = engine.decline().unwrap();
        assert!(engine.install(first.generation).is_none());
        assert_eq!(engine.pending_generation(), Some(second.generation));
        assert_eq!(engine.current().accepted, Verdict::Declined);

        assert!(engine.install(second.generation).is_some());
        assert!(engine.install(second.generation).is_none());
    }

    #[test]
    fn cancelled_replacement_never_installs() {
        let (mut engine, _registry) = setup();
        let scheduled = engine.decline().unwrap();
        assert_eq!(engine.cancel_pending(), Some(scheduled.generation));
        assert!(engine.install(scheduled.generation).is_none());
    }

    struct Countdown(u8);

    impl SuggestionSource for Countdown {
        fn initial(&mut self) -> Recommendation {
            Recommendation::new("start", self.0, "test")
        }
        fn after_accept(&mut self) -> Recommendation {
            self.0 -= 1;
            Recommendation::new("accepted", self.0, "test")
        }
        fn after_decline(&mut self) -> Recommendation {
            self.0 -= 2;
            Recommendation::new("declined", self.0, "test")
        }
    }

    #[test]
    fn custom_source_is_pluggable() {
        let mut registry = JunctionRegistry::new(create_junctions(), JunctionId::new("anna-salai-mount"));
        let mut engine = RecommendationEngine::new(RecommendationPolicy::default(), Box::new(Countdown(50)));
        let scheduled = engine.accept(&mut registry).unwrap();
        engine.install(scheduled.generation);
        assert_eq!(engine.current().suggestion, "accepted");
        assert_eq!(engine.current().confidence, 49);
    }
}
