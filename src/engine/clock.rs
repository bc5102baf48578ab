use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Which stream fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Advance every junction's phase timer.
    Phase,
    /// Perturb the selected junction's metrics.
    Metric,
}

/// Two independent periodic tick streams. Late ticks are skipped rather
/// than replayed in a burst.
pub struct Clock {
    phase: Interval,
    metric: Interval,
}

impl Clock {
    /// The first tick of each stream fires one full period after creation.
    pub fn new(phase_period: Duration, metric_period: Duration) -> Self {
        let now = Instant::now();
        let mut phase = interval_at(now + phase_period, phase_period);
        let mut metric = interval_at(now + metric_period, metric_period);
        phase.set_missed_tick_behavior(MissedTickBehavior::Skip);
        metric.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { phase, metric }
    }

    pub fn from_millis(phase_ms: u64, metric_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(phase_ms.max(1)),
            Duration::from_millis(metric_ms.max(1)),
        )
    }

    /// Waits for the next tick from either stream. Cancel-safe.
    pub async fn next(&mut self) -> Tick {
        tokio::select! {
            biased;
            _ = self.phase.tick() => Tick::Phase,
            _ = self.metric.tick() => Tick::Metric,
        }
    }
}
