//! Weighted ("Markov chain") distribution: per-hop probabilities from the hop file.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::bounds::compile_bounds;
use crate::core::config;
use crate::core::distribution::{DistributionError, RowDistribution};
use crate::core::selector::select;
use crate::core::table::{RoutingTable, TableError};

/// The graph/step the previous call routed from, and its compiled bounds.
///
/// Repeated calls for the same step reuse the bounds; a different graph
/// or step recompiles them.
#[derive(Debug, Clone, Default)]
struct ActiveContext {
    graph: Option<String>,
    step: Option<String>,
    bounds: Option<Vec<f32>>,
}

/// Picks an outgoing edge with the probability declared for it.
///
/// Holds per-call context, so one instance serves one step copy at a
/// time. The table itself is shared read-only and may back any number of
/// instances on any threads.
pub struct MarkovDistribution {
    table: Arc<RoutingTable>,
    source: Option<PathBuf>,
    active: ActiveContext,
    rng: StdRng,
}

/// Builder for [`MarkovDistribution`].
pub struct MarkovDistributionBuilder {
    hop_dir: Option<PathBuf>,
    hop_file: Option<PathBuf>,
    seed: Option<u64>,
    /// Directly provided table (for tests and for sharing between instances).
    table: Option<Arc<RoutingTable>>,
}

impl MarkovDistribution {
    pub const CODE: &'static str = "Markov";
    pub const NAME: &'static str = "Markov chain";
    pub const DESCRIPTION: &'static str = "Distributes to each row with per-hop probability";

    pub fn builder() -> MarkovDistributionBuilder {
        MarkovDistributionBuilder {
            hop_dir: None,
            hop_file: None,
            seed: None,
            table: None,
        }
    }

    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Re-read the hop file this instance was built from and swap the new
    /// table in. On failure the current table stays in place.
    pub fn reload(&mut self) -> Result<(), DistributionError> {
        let Some(path) = self.source.clone() else {
            return Ok(());
        };
        let table = load_hop_file(&path)?;
        self.table = Arc::new(table);
        self.active = ActiveContext::default();
        Ok(())
    }

    /// Point the active context at `graph`/`step`, compiling bounds on a change.
    fn activate(&mut self, graph: &str, step: &str) -> Result<(), DistributionError> {
        if self.active.graph.as_deref() != Some(graph) {
            if self.table.graph(graph).is_none() {
                return Err(DistributionError::UnknownGraph(graph.to_string()));
            }
            debug!(graph, "switching graph");
            self.active = ActiveContext {
                graph: Some(graph.to_string()),
                ..ActiveContext::default()
            };
        }

        if self.active.step.as_deref() != Some(step) || self.active.bounds.is_none() {
            let hops = self
                .table
                .hops(graph, step)
                .ok_or_else(|| DistributionError::UnknownNode {
                    graph: graph.to_string(),
                    step: step.to_string(),
                })?;
            let bounds =
                compile_bounds(hops).map_err(|source| DistributionError::Probability {
                    graph: graph.to_string(),
                    step: step.to_string(),
                    source,
                })?;
            debug!(graph, step, hops = hops.len(), "compiled hop bounds");
            self.active.step = Some(step.to_string());
            self.active.bounds = bounds;
        }

        Ok(())
    }
}

impl RowDistribution for MarkovDistribution {
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
        graph: &str,
        step: &str,
        available: usize,
    ) -> Result<usize, DistributionError> {
        self.activate(graph, step)?;
        let bounds = self.active.bounds.as_deref().unwrap_or(&[]);
        let index = select(bounds, &mut self.rng).ok_or_else(|| {
            DistributionError::SelectionExhausted {
                graph: graph.to_string(),
                step: step.to_string(),
            }
        })?;
        if index >= available {
            return Err(DistributionError::EdgeOutOfRange { index, available });
        }
        Ok(index)
    }
}

impl MarkovDistributionBuilder {
    /// Directory to look for the hop file in.
    pub fn hop_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.hop_dir = Some(dir.into());
        self
    }

    /// Exact hop file path, bypassing directory resolution.
    pub fn hop_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.hop_file = Some(path.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Provide a table directly (for testing without files, or to share one
    /// table between parallel instances).
    pub fn with_table(mut self, table: Arc<RoutingTable>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn build(self) -> Result<MarkovDistribution, DistributionError> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (table, source) = match self.table {
            Some(table) => (table, None),
            None => {
                let path = self
                    .hop_file
                    .unwrap_or_else(|| config::resolve_hop_file(self.hop_dir.as_deref()));
                info!(path = %path.display(), "loading Markov hop map");
                let table = load_hop_file(&path)?;
                (Arc::new(table), Some(path))
            }
        };

        Ok(MarkovDistribution {
            table,
            source,
            active: ActiveContext::default(),
            rng,
        })
    }
}

fn load_hop_file(path: &Path) -> Result<RoutingTable, DistributionError> {
    RoutingTable::load(path)
        .map(|parsed| parsed.table)
        .map_err(|e| load_error(path, e))
}

fn load_error(path: &Path, err: TableError) -> DistributionError {
    match err {
        TableError::Io(source) => {
            error!(path = %path.display(), %source, "cannot read hop file");
            DistributionError::Load {
                path: path.to_path_buf(),
                source,
            }
        }
        TableError::Structural(e) => {
            error!(path = %path.display(), error = %e, "hop file parse aborted");
            DistributionError::Structural(e)
        }
        other => {
            error!(path = %path.display(), error = %other, "hop table rejected");
            DistributionError::Table {
                path: path.to_path_buf(),
                source: other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> Arc<RoutingTable> {
        Arc::new(RoutingTable::parse(text).unwrap().table)
    }

    fn markov(text: &str) -> MarkovDistribution {
        MarkovDistribution::builder()
            .seed(42)
            .with_table(table(text))
            .build()
            .unwrap()
    }

    #[test]
    fn identification_strings() {
        let m = markov("");
        assert_eq!(m.code(), "Markov");
        assert_eq!(m.name(), "Markov chain");
        assert_eq!(
            m.description(),
            "Distributes to each row with per-hop probability"
        );
    }

    #[test]
    fn single_hop_always_selected() {
        let mut m = markov(r#""t" { "a" -> "b" [1.0] }"#);
        for _ in 0..50 {
            assert_eq!(m.select_edge("t", "a", 1).unwrap(), 0);
        }
    }

    #[test]
    fn unknown_graph_and_step() {
        let mut m = markov(r#""t" { "a" -> "b" [1.0] }"#);
        assert!(matches!(
            m.select_edge("nope", "a", 1),
            Err(DistributionError::UnknownGraph(g)) if g == "nope"
        ));
        assert!(matches!(
            m.select_edge("t", "zzz", 1),
            Err(DistributionError::UnknownNode { step, .. }) if step == "zzz"
        ));
        // A failed lookup does not poison the next call.
        assert_eq!(m.select_edge("t", "a", 1).unwrap(), 0);
    }

    #[test]
    fn bad_probabilities_are_reported_per_step() {
        let mut m = markov(r#""t" { "a" -> "b" [0.5] "a" -> "c" [0.25] }"#);
        assert!(matches!(
            m.select_edge("t", "a", 2),
            Err(DistributionError::Probability { .. })
        ));
    }

    #[test]
    fn index_beyond_available_edges_is_rejected() {
        let mut m = markov(r#""t" { "a" -> "b" [0.0] "a" -> "c" [1.0] }"#);
        assert!(matches!(
            m.select_edge("t", "a", 1),
            Err(DistributionError::EdgeOutOfRange {
                index: 1,
                available: 1
            })
        ));
    }

    #[test]
    fn table_errors_keep_their_source() {
        let err = load_error(
            Path::new("hops.ron"),
            TableError::RonWrite(ron::Error::Message("bad".to_string())),
        );
        assert!(matches!(
            err,
            DistributionError::Table {
                source: TableError::RonWrite(_),
                ..
            }
        ));

        let err = load_error(
            Path::new("hops.txt"),
            TableError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)),
        );
        assert!(matches!(err, DistributionError::Load { .. }));
    }

    #[test]
    fn bounds_are_reused_for_same_step() {
        let mut m = markov(r#""t" { "a" -> "b" [0.5] "a" -> "c" [0.5] }"#);
        m.select_edge("t", "a", 2).unwrap();
        assert_eq!(m.active.bounds, Some(vec![0.5, 1.0]));
        m.select_edge("t", "a", 2).unwrap();
        assert_eq!(m.active.step.as_deref(), Some("a"));
    }

    #[test]
    fn context_switch_recompiles_bounds() {
        let mut m = markov(
            r#""t" {
                 "A" -> "x" [1.0]
                 "B" -> "x" [0.0]
                 "B" -> "y" [1.0]
               }"#,
        );
        assert_eq!(m.select_edge("t", "A", 2).unwrap(), 0);
        assert_eq!(m.select_edge("t", "B", 2).unwrap(), 1);
        assert_eq!(m.select_edge("t", "A", 2).unwrap(), 0);
        assert_eq!(m.active.bounds, Some(vec![1.0]));
    }

    #[test]
    fn graph_switch_resets_step() {
        let mut m = markov(
            r#""one" { "s" -> "x" [1.0] }
               "two" { "s" -> "x" [0.0] "s" -> "y" [1.0] }"#,
        );
        assert_eq!(m.select_edge("one", "s", 2).unwrap(), 0);
        // Same step name, different graph: must not reuse graph one's bounds.
        assert_eq!(m.select_edge("two", "s", 2).unwrap(), 1);
    }

    #[test]
    fn missing_hop_file_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let result = MarkovDistribution::builder().hop_dir(dir.path()).build();
        match result {
            Err(DistributionError::Load { path, .. }) => {
                assert_eq!(path, dir.path().join(config::HOP_FILENAME));
            }
            Err(other) => panic!("expected load error, got {}", other),
            Ok(_) => panic!("expected load error"),
        }
    }

    #[test]
    fn reload_swaps_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(config::HOP_FILENAME);
        std::fs::write(&path, r#""t" { "a" -> "b" [1.0] }"#).unwrap();

        let mut m = MarkovDistribution::builder()
            .hop_dir(dir.path())
            .seed(1)
            .build()
            .unwrap();
        assert_eq!(m.select_edge("t", "a", 2).unwrap(), 0);

        std::fs::write(&path, r#""t" { "a" -> "b" [0.0] "a" -> "c" [1.0] }"#).unwrap();
        m.reload().unwrap();
        assert_eq!(m.select_edge("t", "a", 2).unwrap(), 1);

        std::fs::remove_file(&path).unwrap();
        assert!(m.reload().is_err());
        assert_eq!(m.select_edge("t", "a", 2).unwrap(), 1);
    }
}
