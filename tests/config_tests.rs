/// Hop directory environment override. Kept in its own test binary so no
/// other test sees the variable change.

use hop_router::core::config::{resolve_hop_file, HOP_DIR_ENV, HOP_FILENAME};
use hop_router::{MarkovDistribution, RowDistribution};

const FIXTURE: &str = "tests/fixtures/markov-hops.txt";

// One test function: the environment is process-wide and tests run in parallel.
#[test]
fn env_dir_is_used_unless_builder_names_one() {
    let env_dir = tempfile::tempdir().unwrap();
    std::fs::copy(FIXTURE, env_dir.path().join(HOP_FILENAME)).unwrap();
    std::env::set_var(HOP_DIR_ENV, env_dir.path());

    assert_eq!(resolve_hop_file(None), env_dir.path().join(HOP_FILENAME));
    let mut markov = MarkovDistribution::builder().seed(1).build().unwrap();
    assert!(markov.select_edge("Fan Out", "Source", 3).unwrap() < 3);

    // An explicit directory wins over the variable.
    let explicit = tempfile::tempdir().unwrap();
    std::fs::write(
        explicit.path().join(HOP_FILENAME),
        "\"Only Here\" { \"a\" -> \"b\" [1.0] }\n",
    )
    .unwrap();
    let mut markov = MarkovDistribution::builder()
        .hop_dir(explicit.path())
        .seed(1)
        .build()
        .unwrap();
    assert_eq!(markov.select_edge("Only Here", "a", 1).unwrap(), 0);
    assert!(markov.table().graph("Fan Out").is_none());

    // An empty value counts as unset.
    std::env::set_var(HOP_DIR_ENV, "");
    assert_ne!(resolve_hop_file(None), env_dir.path().join(HOP_FILENAME));

    std::env::remove_var(HOP_DIR_ENV);
}
