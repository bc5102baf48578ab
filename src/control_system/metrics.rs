use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::control_system::registry::JunctionRegistry;
use crate::error::ControlError;

const DENSITY_SWING: f64 = 5.0;
const WAIT_TIME_SWING: f64 = 10.0;

/// Source of metric perturbation. Samples are centred on zero, in [-0.5, 0.5).
pub trait NoiseSource: Send {
    fn sample(&mut self) -> f64;
}

pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl NoiseSource for SeededNoise {
    fn sample(&mut self) -> f64 {
        self.rng.random::<f64>() - 0.5
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct ConstantNoise(pub f64);

impl NoiseSource for ConstantNoise {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// Metric tick: drifts density and wait time of the selected junction only.
pub fn apply_metric_tick(
    registry: &mut JunctionRegistry,
    noise: &mut dyn NoiseSource,
) -> Result<(), ControlError> {
    let selected = registry.selected().clone();
    let density_delta = noise.sample() * DENSITY_SWING;
    let wait_time_delta = noise.sample() * WAIT_TIME_SWING;
    registry.drift_metrics(&selected, density_delta, wait_time_delta)
}
