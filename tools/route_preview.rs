/// Route Preview: samples edge selections and prints how often each hop won.
///
/// Usage: route_preview --graph <name> --step <name> [--hops <file>] [--rows <n>]
///                      [--edges <n>] [--strategy <Markov|Random>] [--seed <n>]
use hop_router::core::distribution::RowDistribution;
use hop_router::core::markov::MarkovDistribution;
use hop_router::core::random::RandomDistribution;
use hop_router::schema::hop::Hop;
use std::process;

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut graph = None;
    let mut step = None;
    let mut hops_path = None;
    let mut rows: usize = 10_000;
    let mut edges: Option<usize> = None;
    let mut strategy = MarkovDistribution::CODE.to_string();
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--graph" if i + 1 < args.len() => {
                i += 1;
                graph = Some(args[i].clone());
            }
            "--step" if i + 1 < args.len() => {
                i += 1;
                step = Some(args[i].clone());
            }
            "--hops" if i + 1 < args.len() => {
                i += 1;
                hops_path = Some(args[i].clone());
            }
            "--rows" if i + 1 < args.len() => {
                i += 1;
                rows = args[i].parse().unwrap_or(10_000);
            }
            "--edges" if i + 1 < args.len() => {
                i += 1;
                edges = args[i].parse().ok();
            }
            "--strategy" if i + 1 < args.len() => {
                i += 1;
                strategy = args[i].clone();
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(graph), Some(step)) = (graph, step) else {
        eprintln!("Error: --graph and --step are required");
        print_usage();
        process::exit(1);
    };

    let (mut distribution, hops): (Box<dyn RowDistribution>, Vec<Hop>) = match strategy.as_str() {
        MarkovDistribution::CODE => {
            let mut builder = MarkovDistribution::builder().seed(seed);
            if let Some(ref path) = hops_path {
                builder = builder.hop_file(path);
            }
            let markov = builder.build().unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                process::exit(1);
            });
            let hops = markov
                .table()
                .hops(&graph, &step)
                .cloned()
                .unwrap_or_default();
            (Box::new(markov) as Box<dyn RowDistribution>, hops)
        }
        RandomDistribution::CODE => (
            Box::new(RandomDistribution::with_seed(seed)) as Box<dyn RowDistribution>,
            Vec::new(),
        ),
        other => {
            eprintln!("Unknown strategy: {}", other);
            process::exit(1);
        }
    };

    let edges = edges.unwrap_or(hops.len().max(1));

    println!(
        "{} ({}): {} rows from '{}' in '{}' over {} edges",
        distribution.name(),
        distribution.description(),
        rows,
        step,
        graph,
        edges
    );

    let mut counts = vec![0usize; edges];
    for _ in 0..rows {
        match distribution.select_edge(&graph, &step, edges) {
            Ok(index) => counts[index] += 1,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }

    println!();
    for (index, count) in counts.iter().enumerate() {
        let share = *count as f64 / rows.max(1) as f64;
        let (target, expected) = match hops.get(index) {
            Some(hop) => (hop.target.as_str(), format!("{:.3}", hop.probability)),
            None => ("-", format!("{:.3}", 1.0 / edges as f64)),
        };
        let bar = "#".repeat((share * 50.0).round() as usize);
        println!(
            "  [{}] {:<20} observed {:.3}  expected {}  {}",
            index, target, share, expected, bar
        );
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

fn print_usage() {
    println!("Usage: route_preview --graph <name> --step <name> [options]");
    println!();
    println!("Options:");
    println!("  --hops <file>         hop file (default: resolved markov-hops.txt)");
    println!("  --rows <n>            rows to route (default 10000)");
    println!("  --edges <n>           available outgoing edges (default: hop count)");
    println!("  --strategy <code>     Markov or Random (default Markov)");
    println!("  --seed <n>            RNG seed (default 42)");
}
