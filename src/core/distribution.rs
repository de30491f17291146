//! The selection contract shared by every strategy, and its errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::bounds::ProbabilityError;
use crate::core::grammar::StructuralError;
use crate::core::markov::MarkovDistribution;
use crate::core::random::RandomDistribution;
use crate::core::table::TableError;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("cannot load hop file {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot build hop table from {}: {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },
    #[error("parser invariant violated: {0}")]
    Structural(#[from] StructuralError),
    #[error("no hops found for graph '{0}'")]
    UnknownGraph(String),
    #[error("no hops found for step '{step}' in graph '{graph}'")]
    UnknownNode { graph: String, step: String },
    #[error("invalid probabilities for step '{step}' in graph '{graph}': {source}")]
    Probability {
        graph: String,
        step: String,
        #[source]
        source: ProbabilityError,
    },
    #[error("could not select a hop for step '{step}' in graph '{graph}'")]
    SelectionExhausted { graph: String, step: String },
    #[error("selected hop {index} but only {available} outgoing edges exist")]
    EdgeOutOfRange { index: usize, available: usize },
    #[error("no outgoing edges to choose from")]
    NoEdges,
    #[error("unknown distribution strategy '{0}'")]
    UnknownStrategy(String),
    #[error("output channel {0} is closed")]
    ChannelClosed(usize),
    #[error("output channel {index} still full after {attempts} attempts")]
    DeliveryExhausted { index: usize, attempts: u32 },
}

/// A pluggable edge-selection policy.
///
/// One call per arriving row: given where the row is (graph and source
/// step) and how many outgoing edges the caller has, return the index of
/// the edge to send it down. Handing the row off is the caller's job.
///
/// Implementations may memoize per-instance state across calls, so an
/// instance serves one execution context at a time. Run one instance per
/// parallel copy of a step.
pub trait RowDistribution {
    /// Machine-readable code the host registers the strategy under.
    fn code(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn select_edge(
        &mut self,
        graph: &str,
        step: &str,
        available: usize,
    ) -> Result<usize, DistributionError>;
}

/// Build a strategy by its code. The weighted strategy reads its hop
/// file from the default location.
pub fn distribution_for_code(code: &str) -> Result<Box<dyn RowDistribution>, DistributionError> {
    match code {
        MarkovDistribution::CODE => Ok(Box::new(MarkovDistribution::builder().build()?)),
        RandomDistribution::CODE => Ok(Box::new(RandomDistribution::new())),
        other => Err(DistributionError::UnknownStrategy(other.to_string())),
    }
}
