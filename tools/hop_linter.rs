/// Hop Linter: validates a hop file's syntax and per-step probabilities.
///
/// Usage: hop_linter <hop_file> [--snapshot <table.ron>]
use hop_router::core::bounds::{compile_bounds, ProbabilityError};
use hop_router::core::table::{save_table, RoutingTable};
use std::path::Path;
use std::process;

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: hop_linter <hop_file> [--snapshot <table.ron>]");
        process::exit(0);
    }

    let hop_file = &args[1];
    let mut snapshot = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--snapshot" && i + 1 < args.len() {
            i += 1;
            snapshot = Some(args[i].clone());
        } else {
            eprintln!("Unknown argument: {}", args[i]);
            process::exit(1);
        }
        i += 1;
    }

    let parsed = match RoutingTable::load(Path::new(hop_file)) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("ERROR: Failed to load hop file '{}': {}", hop_file, e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} graphs from {}",
        parsed.table.graph_count(),
        hop_file
    );

    let (errors, warnings) = lint_table(&parsed.table);

    println!("\n=== Hop Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() && parsed.diagnostics.is_empty() {
        println!("All checks passed!");
    }

    for diagnostic in &parsed.diagnostics {
        println!("SYNTAX: {}", diagnostic);
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} syntax errors, {} errors, {} warnings",
        parsed.diagnostics.len(),
        errors.len(),
        warnings.len()
    );

    if let Some(ref out) = snapshot {
        match save_table(&parsed.table, Path::new(out)) {
            Ok(()) => println!("Snapshot written to '{}'", out),
            Err(e) => {
                eprintln!("ERROR: Failed to write snapshot '{}': {}", out, e);
                process::exit(1);
            }
        }
    }

    if errors.is_empty() && parsed.diagnostics.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "hop_router=info";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn lint_table(table: &RoutingTable) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for graph in table.graph_names() {
        if table.graph(graph).is_some_and(|map| map.is_empty()) {
            warnings.push(format!("Graph '{}' declares no hops", graph));
        }
    }

    for (graph, step, hops) in table.entries() {
        match compile_bounds(hops) {
            Ok(Some(_)) => {}
            Ok(None) => errors.push(format!(
                "Step '{}' in graph '{}' has no hops",
                step, graph
            )),
            Err(ProbabilityError::Overflow { sum }) => errors.push(format!(
                "Step '{}' in graph '{}': probabilities exceed 1.0 (running sum {})",
                step, graph, sum
            )),
            Err(ProbabilityError::Underflow { sum }) => errors.push(format!(
                "Step '{}' in graph '{}': probabilities sum to {}, not 1.0",
                step, graph, sum
            )),
        }

        for hop in hops {
            if hop.probability == 0.0 {
                warnings.push(format!(
                    "Hop '{}' -> '{}' in graph '{}' can never be selected (probability 0)",
                    step, hop.target, graph
                ));
            }
        }

        let mut targets: Vec<&str> = hops.iter().map(|h| h.target.as_str()).collect();
        targets.sort_unstable();
        if targets.windows(2).any(|w| w[0] == w[1]) {
            warnings.push(format!(
                "Step '{}' in graph '{}' lists the same target more than once",
                step, graph
            ));
        }
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_logs_table_loads() {
        let filter: tracing_subscriber::EnvFilter = DEFAULT_LOG_FILTER.parse().unwrap();
        assert_eq!(filter.to_string(), "hop_router=info");
    }
}
