use std::collections::BTreeSet;

use acyclic::{Dag, DagConfig, Error, ExtraTernary, ReachCache};
use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Naive acyclic graph: an edge set plus depth-first reachability, no
/// sidestructure. The behavioral reference for differential tests.
#[derive(Debug, Clone)]
struct NaiveDag {
    n: usize,
    edges: BTreeSet<(usize, usize)>,
}

impl NaiveDag {
    fn new(n: usize) -> Self {
        Self { n, edges: BTreeSet::new() }
    }

    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut visited = vec![false; self.n];
        let mut stack = vec![from];
        visited[from] = true;
        while let Some(v) = stack.pop() {
            for &(s, t) in self.edges.range((v, 0)..(v + 1, 0)) {
                debug_assert_eq!(s, v);
                if t == to {
                    return true;
                }
                if !visited[t] {
                    visited[t] = true;
                    stack.push(t);
                }
            }
        }
        false
    }

    /// `Ok(true)` newly inserted, `Ok(false)` duplicate, `Err(())` cycle.
    fn add_edge(&mut self, from: usize, to: usize) -> Result<bool, ()> {
        if self.reaches(to, from) {
            return Err(());
        }
        Ok(self.edges.insert((from, to)))
    }

    fn remove_edge(&mut self, from: usize, to: usize) -> bool {
        self.edges.remove(&(from, to))
    }
}

fn all_configs() -> Vec<DagConfig> {
    vec![
        DagConfig::default(),
        DagConfig {
            reach_cache: ReachCache::Enabled { extra: ExtraTernary::None },
            consistency_check: false,
        },
        DagConfig {
            reach_cache: ReachCache::Enabled { extra: ExtraTernary::User },
            consistency_check: false,
        },
        DagConfig { reach_cache: ReachCache::Disabled, consistency_check: false },
    ]
}

fn dag_with_vertices(capacity: usize, config: DagConfig) -> Dag {
    let mut dag = Dag::with_config(capacity, config);
    for v in 0..capacity {
        dag.create_vertex(v);
    }
    dag
}

//
// The literal seed scenarios, run under every configuration.
//

#[test]
fn direct_cycle_is_rejected() {
    for config in all_configs() {
        let mut dag = dag_with_vertices(2, config);
        assert_eq!(dag.set_edge(0, 1), Ok(true), "{config:?}");
        assert_eq!(dag.set_edge(1, 0), Err(Error::CycleInsertion(1, 0)), "{config:?}");
        assert!(dag.edge_exists(0, 1));
        assert!(!dag.edge_exists(1, 0), "failed insertion must leave the graph unchanged");
    }
}

#[test]
fn transitive_cycle_is_rejected() {
    for config in all_configs() {
        let mut dag = dag_with_vertices(3, config);
        dag.set_edge(0, 1).unwrap();
        dag.set_edge(1, 2).unwrap();
        assert_eq!(dag.set_edge(2, 0), Err(Error::CycleInsertion(2, 0)), "{config:?}");
    }
}

#[test]
fn deletion_unblocks_insertion() {
    for config in all_configs() {
        let mut dag = dag_with_vertices(3, config);
        dag.set_edge(0, 1).unwrap();
        dag.set_edge(1, 2).unwrap();
        assert!(dag.clear_edge(1, 2));
        assert_eq!(dag.set_edge(2, 0), Ok(true), "{config:?}");
    }
}

#[test]
fn diamond_rejects_back_edge() {
    for config in all_configs() {
        let mut dag = dag_with_vertices(5, config);
        dag.set_edge(0, 2).unwrap();
        dag.set_edge(1, 2).unwrap();
        dag.set_edge(1, 3).unwrap();
        dag.set_edge(2, 3).unwrap();
        dag.set_edge(4, 0).unwrap();
        dag.set_edge(4, 3).unwrap();
        assert_eq!(dag.set_edge(2, 4), Err(Error::CycleInsertion(2, 4)), "{config:?}");
    }
}

#[test]
fn dirty_then_clean_regression() {
    // A removal leaves a stale reach claim behind; the later queries must
    // neither trust the false positive (2 -> 0 is legal) nor miss the real
    // path 0 -> 3 -> 1 (1 -> 0 closes a cycle).
    for config in all_configs() {
        let mut dag = dag_with_vertices(4, config);
        dag.set_edge(1, 2).unwrap();
        assert!(dag.clear_edge(1, 2));
        dag.set_edge(3, 1).unwrap();
        dag.set_edge(0, 3).unwrap();
        assert_eq!(dag.set_edge(2, 0), Ok(true), "{config:?}: no path 0 -> 2 exists");
        assert_eq!(dag.set_edge(1, 0), Err(Error::CycleInsertion(1, 0)), "{config:?}");
    }
}

//
// Idempotence and replay laws.
//

#[test]
fn set_and_clear_are_idempotent() {
    for config in all_configs() {
        let mut dag = dag_with_vertices(3, config);
        assert_eq!(dag.set_edge(0, 1), Ok(true));
        assert_eq!(dag.set_edge(0, 1), Ok(false), "{config:?}: second set is a no-op");
        assert!(dag.clear_edge(0, 1));
        assert!(!dag.clear_edge(0, 1), "{config:?}: second clear is a no-op");
    }
}

#[test]
fn can_reach_is_repeatable() {
    for config in all_configs() {
        let mut dag = dag_with_vertices(4, config);
        dag.set_edge(0, 1).unwrap();
        dag.set_edge(1, 2).unwrap();
        dag.clear_edge(1, 2);
        dag.set_edge(2, 3).unwrap();
        for from in 0..4 {
            for to in 0..4 {
                if from == to {
                    continue;
                }
                let first = dag.can_reach(from, to);
                let second = dag.can_reach(from, to);
                assert_eq!(first, second, "{config:?}: {from} ~> {to} answer changed");
            }
        }
    }
}

#[test]
fn reverse_replay_restores_the_empty_graph() {
    let n = 10;
    for config in all_configs() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut dag = dag_with_vertices(n, config);
        let mut inserted: Vec<(usize, usize)> = Vec::new();

        for _ in 0..80 {
            let from = rng.gen_range(0..n);
            let to = rng.gen_range(0..n);
            if from == to {
                continue;
            }
            if let Ok(true) = dag.set_edge(from, to) {
                inserted.push((from, to));
            }
        }

        for &(from, to) in inserted.iter().rev() {
            assert!(dag.clear_edge(from, to), "{config:?}: replay lost edge {from} -> {to}");
        }

        for v in 0..n {
            assert_eq!(dag.out_degree(v), 0, "{config:?}");
            assert_eq!(dag.in_degree(v), 0, "{config:?}");
        }
        for from in 0..n {
            for to in 0..n {
                if from != to {
                    assert!(!dag.can_reach(from, to), "{config:?}: ghost path {from} ~> {to}");
                }
            }
        }
        assert!(dag.is_internally_consistent());
    }
}

//
// Differential testing against the naive implementation.
//

fn differential_fuzz(config: DagConfig, seed: u64, n: usize, ops: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut dag = dag_with_vertices(n, config);
    let mut naive = NaiveDag::new(n);

    for step in 0..ops {
        let remove = !naive.edges.is_empty() && rng.gen_bool(0.25);
        if remove {
            let (from, to) = naive.edges.iter().copied().choose(&mut rng).unwrap();
            assert!(dag.clear_edge(from, to), "step {step}: {config:?} lost edge {from} -> {to}");
            assert!(naive.remove_edge(from, to));
        } else {
            let from = rng.gen_range(0..n);
            let to = rng.gen_range(0..n);
            if from == to {
                continue;
            }
            let got = dag.set_edge(from, to);
            let expected = naive.add_edge(from, to);
            match (&got, &expected) {
                (Ok(a), Ok(b)) if a == b => {}
                (Err(Error::CycleInsertion(..)), Err(())) => {}
                _ => panic!(
                    "step {step}: {config:?} diverged on {from} -> {to}: got {got:?}, reference {expected:?}"
                ),
            }
        }

        // Periodic spot check so a divergence is caught near its cause.
        if step % 32 == 0 {
            let a = rng.gen_range(0..n);
            let b = rng.gen_range(0..n);
            if a != b {
                assert_eq!(
                    dag.can_reach(a, b),
                    naive.reaches(a, b),
                    "step {step}: {config:?} disagrees on {a} ~> {b}"
                );
            }
        }
    }

    for from in 0..n {
        for to in 0..n {
            if from == to {
                continue;
            }
            assert_eq!(
                dag.edge_exists(from, to),
                naive.edges.contains(&(from, to)),
                "{config:?}: final edge sets differ at {from} -> {to}"
            );
            assert_eq!(
                dag.can_reach(from, to),
                naive.reaches(from, to),
                "{config:?}: final reachability differs at {from} ~> {to}"
            );
        }
    }
    assert!(dag.is_internally_consistent());
}

#[test]
fn differential_fuzz_all_configs() {
    for config in all_configs() {
        for seed in [1, 2] {
            differential_fuzz(config, seed, 32, 512);
        }
    }
}

#[test]
fn differential_fuzz_with_consistency_checks() {
    // Smaller graph: with the checks on, every mutation verifies the whole
    // sidestructure against traversal ground truth (debug builds).
    let config = DagConfig {
        reach_cache: ReachCache::Enabled { extra: ExtraTernary::ReachWithoutLink },
        consistency_check: true,
    };
    differential_fuzz(config, 3, 12, 200);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Any script of random add/remove operations leaves the cached DAG in
    // agreement with the naive reference and internally consistent.
    #[test]
    fn prop_random_scripts_match_naive(
        script in prop::collection::vec((0usize..8, 0usize..8, any::<bool>()), 1..60),
    ) {
        let n = 8;
        let mut dag = dag_with_vertices(n, DagConfig::default());
        let mut naive = NaiveDag::new(n);

        for (from, to, remove) in script {
            if from == to {
                continue;
            }
            if remove {
                prop_assert_eq!(dag.clear_edge(from, to), naive.remove_edge(from, to));
            } else {
                let got = dag.set_edge(from, to);
                let expected = naive.add_edge(from, to);
                match (&got, &expected) {
                    (Ok(a), Ok(b)) if a == b => {}
                    (Err(Error::CycleInsertion(..)), Err(())) => {}
                    _ => prop_assert!(false, "diverged on {} -> {}: {:?} vs {:?}", from, to, got, expected),
                }
            }
        }

        for from in 0..n {
            for to in 0..n {
                if from != to {
                    prop_assert_eq!(dag.can_reach(from, to), naive.reaches(from, to));
                }
            }
        }
        prop_assert!(dag.is_internally_consistent());
    }
}
