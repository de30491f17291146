//! Hop Router: weighted-edge routing for row pipelines.
//!
//! A hop file names, per graph and per source step, the outgoing hops and
//! their probabilities. A distribution strategy turns "a row arrived at
//! this step" into "send it down edge N", either weighted by the hop file
//! (`Markov`) or uniformly at random (`Random`).

pub mod core;
pub mod schema;

pub use crate::core::distribution::{distribution_for_code, DistributionError, RowDistribution};
pub use crate::core::markov::MarkovDistribution;
pub use crate::core::random::RandomDistribution;
pub use crate::core::table::RoutingTable;
pub use crate::schema::hop::Hop;
