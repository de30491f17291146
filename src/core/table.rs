//! The loaded routing table: graph → source step → hops.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::grammar::{self, GrammarError, StructuralError};
use crate::schema::hop::{GraphMap, HopList, HopMap};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),
    #[error("parser invariant violated: {0}")]
    Structural(#[from] StructuralError),
}

/// Immutable once built. Reloading builds a new table rather than
/// editing this one, so it can be shared behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    graphs: GraphMap,
}

/// A table together with the syntax problems skipped while parsing it.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub table: RoutingTable,
    pub diagnostics: Vec<GrammarError>,
}

impl From<GraphMap> for RoutingTable {
    fn from(graphs: GraphMap) -> Self {
        Self { graphs }
    }
}

impl RoutingTable {
    /// Parse hop-grammar text. Syntax errors are logged and returned
    /// alongside the partial table.
    pub fn parse(input: &str) -> Result<ParsedTable, TableError> {
        let (graphs, diagnostics) = grammar::parse(input)?;
        for diagnostic in &diagnostics {
            warn!(%diagnostic, "skipped malformed hop grammar");
        }
        Ok(ParsedTable {
            table: RoutingTable { graphs },
            diagnostics,
        })
    }

    /// Load a hop file. A missing or unreadable file is an error; bad
    /// grammar inside a readable file is not.
    pub fn load(path: &Path) -> Result<ParsedTable, TableError> {
        debug!(path = %path.display(), "loading hop file");
        let contents = std::fs::read_to_string(path)?;
        let parsed = Self::parse(&contents)?;
        info!(
            path = %path.display(),
            graphs = parsed.table.graph_count(),
            skipped = parsed.diagnostics.len(),
            "loaded hop file"
        );
        Ok(parsed)
    }

    pub fn graph(&self, name: &str) -> Option<&HopMap> {
        self.graphs.get(name)
    }

    pub fn hops(&self, graph: &str, step: &str) -> Option<&HopList> {
        self.graphs.get(graph)?.get(step)
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Graph names in sorted order.
    pub fn graph_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graphs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `(graph, step, hops)` for every source step, sorted by graph then step.
    pub fn entries(&self) -> Vec<(&str, &str, &HopList)> {
        let mut entries: Vec<(&str, &str, &HopList)> = self
            .graphs
            .iter()
            .flat_map(|(graph, map)| {
                map.iter()
                    .map(move |(step, hops)| (graph.as_str(), step.as_str(), hops))
            })
            .collect();
        entries.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }
}

/// Save a parsed table as a RON snapshot.
pub fn save_table(table: &RoutingTable, path: &Path) -> Result<(), TableError> {
    let serialized = ron::ser::to_string_pretty(table, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Load a RON snapshot written by [`save_table`].
pub fn load_table(path: &Path) -> Result<RoutingTable, TableError> {
    let contents = std::fs::read_to_string(path)?;
    let table: RoutingTable = ron::from_str(&contents)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::hop::Hop;

    const TEXT: &str = r#"
        "Trans" {
          "Generate Rows" -> "Add 0" [0.5]
          "Generate Rows" -> "Add 1" [0.5]
          "Add 0" -> "Output" [1.0]
        }
        "Other" { "x" -> "y" [1.0] }
    "#;

    #[test]
    fn parse_builds_lookup() {
        let parsed = RoutingTable::parse(TEXT).unwrap();
        assert!(parsed.diagnostics.is_empty());
        let table = parsed.table;
        assert_eq!(table.graph_count(), 2);
        assert_eq!(table.graph_names(), vec!["Other", "Trans"]);
        assert_eq!(
            table.hops("Trans", "Add 0"),
            Some(&vec![Hop::new("Output", 1.0)])
        );
        assert!(table.hops("Trans", "Missing").is_none());
        assert!(table.hops("Missing", "Add 0").is_none());
    }

    #[test]
    fn entries_are_sorted() {
        let table = RoutingTable::parse(TEXT).unwrap().table;
        let keys: Vec<(&str, &str)> = table.entries().iter().map(|e| (e.0, e.1)).collect();
        assert_eq!(
            keys,
            vec![("Other", "x"), ("Trans", "Add 0"), ("Trans", "Generate Rows")]
        );
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = RoutingTable::load(Path::new("target/definitely-not-here.txt")).unwrap_err();
        assert!(matches!(err, TableError::Io(_)));
    }

    #[test]
    fn snapshot_round_trip() {
        let table = RoutingTable::parse(TEXT).unwrap().table;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hops.ron");

        save_table(&table, &path).unwrap();
        let loaded = load_table(&path).unwrap();
        assert_eq!(loaded, table);
    }
}
