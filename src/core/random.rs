//! Uniform distribution: every outgoing edge equally likely.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::distribution::{DistributionError, RowDistribution};

/// Ignores the graph and step entirely; no table, no cached state.
pub struct RandomDistribution {
    rng: StdRng,
}

impl Default for RandomDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomDistribution {
    pub const CODE: &'static str = "Random";
    pub const NAME: &'static str = "Random";
    pub const DESCRIPTION: &'static str = "Distributes to each row with equal probability";

    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RowDistribution for RandomDistribution {
    fn code(&self) -> &'static str {
        Self::CODE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn select_edge(
        &mut self,
        _graph: &str,
        _step: &str,
        available: usize,
    ) -> Result<usize, DistributionError> {
        if available == 0 {
            return Err(DistributionError::NoEdges);
        }
        let draw: f64 = self.rng.gen();
        // Truncation of a draw in [0, n); clamp guards the rounding edge at n.
        let index = (draw * available as f64) as usize;
        Ok(index.min(available - 1))
    }
}
