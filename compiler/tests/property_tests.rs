// Property-based tests for partitioner and router invariants.
//
// Four categories:
// 1. Flow conservation: splitter/joiner weights sum to their declared totals
// 2. DP properties: monotonic bottleneck, trivial placement, single tile
// 3. Traceback consistency: every filter lands in exactly one partition
// 4. Routing: determinism and well-formed switch instructions
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use meshpart::config::TargetConfig;
use meshpart::cost::CostModel;
use meshpart::flow::{join_phases, join_steady, split_phases, split_steady, steady_state};
use meshpart::mesh::Mesh;
use meshpart::partition::partition;
use meshpart::pass::{PassId, StageCert};
use meshpart::pipeline::compile_graph;
use meshpart::stream::{Filter, Joiner, Splitter, StreamGraph, StreamNode};
use proptest::prelude::*;

// ── Generators ──────────────────────────────────────────────────────────────

fn arb_filter() -> impl Strategy<Value = StreamNode> {
    (1u64..100, 1u64..64, 0u32..3).prop_map(|(work, code, extra_peek)| {
        Filter::new("f", 1, 1, work)
            .with_code(code)
            .with_peek(1 + extra_peek)
            .into()
    })
}

/// One phase per branch, each sending `weights[i]` items to branch `i` only.
fn one_hot_phases(weights: &[u32]) -> Vec<Vec<u32>> {
    (0..weights.len())
        .map(|i| {
            let mut phase = vec![0; weights.len()];
            phase[i] = weights[i];
            phase
        })
        .collect()
}

/// Nested containers over 1:1 filters. Every arm consumes and produces
/// items at the same overall rate, so any nesting is balanced even where a
/// subtree is multirate inside.
fn arb_stream() -> impl Strategy<Value = StreamNode> {
    arb_filter().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4)
                .prop_map(|children| StreamNode::pipeline("p", children)),
            prop::collection::vec(inner.clone(), 2..4).prop_map(|branches| {
                let n = branches.len();
                StreamNode::split_join("sj", Splitter::uniform(n), branches, Joiner::uniform(n))
            }),
            // Duplicate split-join; a merge filter folds the n copies back to one.
            (prop::collection::vec(inner.clone(), 2..4), 1u64..50).prop_map(|(branches, work)| {
                let n = branches.len();
                StreamNode::pipeline(
                    "dup",
                    vec![
                        StreamNode::split_join("sj", Splitter::Duplicate, branches, Joiner::uniform(n)),
                        Filter::new("merge", n as u32, 1, work).into(),
                    ],
                )
            }),
            // Multi-phase round robin with matching joiner phases.
            prop::collection::vec((inner.clone(), 1u32..4), 2..4).prop_map(|pairs| {
                let (branches, weights): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
                let phases = one_hot_phases(&weights);
                StreamNode::split_join(
                    "phased",
                    Splitter::RoundRobin { phases: phases.clone() },
                    branches,
                    Joiner::RoundRobin { phases },
                )
            }),
            // Decimate by k, run the inner subtree, then expand by k.
            (inner.clone(), 2u32..4, 1u64..50).prop_map(|(body, k, work)| {
                StreamNode::pipeline(
                    "multirate",
                    vec![
                        Filter::new("down", k, 1, work).into(),
                        body,
                        Filter::new("up", 1, k, work).into(),
                    ],
                )
            }),
            (inner, arb_filter()).prop_map(|(body, back)| {
                StreamNode::feedback_loop(
                    "fb",
                    Joiner::uniform(2),
                    body,
                    Splitter::uniform(2),
                    back,
                    1,
                )
            }),
        ]
    })
}

fn arb_graph() -> impl Strategy<Value = StreamGraph> {
    arb_stream().prop_map(|root| StreamGraph::new(root).unwrap())
}

fn arb_phases() -> impl Strategy<Value = Vec<Vec<u32>>> {
    (1usize..5).prop_flat_map(|arity| {
        prop::collection::vec(prop::collection::vec(0u32..6, arity), 1..4)
    })
}

// ── Flow conservation ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn round_robin_flows_are_conserved(phases in arb_phases()) {
        let arity = phases[0].len();
        let splitter = Splitter::RoundRobin { phases: phases.clone() };
        let joiner = Joiner::RoundRobin { phases: phases.clone() };

        for flow in split_phases(&splitter, arity) {
            prop_assert!(flow.is_conserved());
        }
        for flow in join_phases(&joiner, arity) {
            prop_assert!(flow.is_conserved());
        }

        let split = split_steady(&splitter, arity);
        let join = join_steady(&joiner, arity);
        prop_assert!(split.is_conserved());
        prop_assert!(join.is_conserved());
        for child in 0..arity {
            let expected: u64 = phases.iter().map(|p| p[child] as u64).sum();
            prop_assert_eq!(split.push_weight(child).unwrap(), expected);
            prop_assert_eq!(join.pop_weight(child).unwrap(), expected);
        }
        prop_assert!(split.push_weight(arity).is_err());
        prop_assert!(join.pop_weight(arity).is_err());
    }

    #[test]
    fn solved_graphs_conserve_every_host(graph in arb_graph()) {
        let steady = steady_state(&graph).unwrap();
        for host in graph.root().hosts() {
            prop_assert!(steady.split_flow(host).unwrap().is_conserved());
            prop_assert!(steady.join_flow(host).unwrap().is_conserved());
            // 1:1 subtrees: what the splitter hands out comes back.
            prop_assert_eq!(steady.split_items(host), steady.join_items(host));
        }
    }
}

// ── DP properties ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn bottleneck_is_monotonic_in_budget(graph in arb_graph()) {
        let mut previous = u64::MAX;
        for tiles in 1..=6 {
            let result = partition(&graph, &TargetConfig::for_tile_count(tiles)).unwrap();
            prop_assert!(
                result.bottleneck() <= previous,
                "bottleneck rose from {} to {} at {} tiles",
                previous,
                result.bottleneck(),
                tiles
            );
            previous = result.bottleneck();
        }
    }

    #[test]
    fn one_tile_per_filter_needs_no_fusion(graph in arb_graph()) {
        let steady = steady_state(&graph).unwrap();
        let n = graph.filter_count();
        let config = TargetConfig::for_tile_count(n).with_overheads(0, 0);
        let result = partition(&graph, &config).unwrap();
        let heaviest = graph
            .filters()
            .iter()
            .map(|f| steady.multiplicity(f.id) * f.work)
            .max()
            .unwrap();
        prop_assert_eq!(result.bottleneck(), heaviest);
    }

    #[test]
    fn one_tile_per_filter_pays_only_host_overhead(graph in arb_graph()) {
        let steady = steady_state(&graph).unwrap();
        let config = TargetConfig::for_tile_count(graph.filter_count());
        let model = CostModel::new(&config);
        let result = partition(&graph, &config).unwrap();

        // Each host's overhead lands on the tile of its first filter.
        let expected = graph
            .filters()
            .iter()
            .map(|f| {
                let overhead: u64 = graph
                    .root()
                    .hosts()
                    .into_iter()
                    .filter(|&h| graph.node(h).unwrap().filters()[0].id == f.id)
                    .map(|h| model.host_overhead(&steady, h))
                    .sum();
                steady.multiplicity(f.id) * f.work + overhead
            })
            .max()
            .unwrap();
        prop_assert_eq!(result.bottleneck(), expected);
    }

    #[test]
    fn single_tile_holds_every_filter(graph in arb_graph()) {
        let result = partition(&graph, &TargetConfig::for_tile_count(1)).unwrap();
        prop_assert_eq!(result.partitions.len(), 1);
        prop_assert_eq!(result.partitions[0].filters.len(), graph.filter_count());
    }

    #[test]
    fn traceback_assigns_each_filter_once(graph in arb_graph(), tiles in 1usize..8) {
        let config = TargetConfig::for_tile_count(tiles);
        let result = partition(&graph, &config).unwrap();

        let mut assigned: Vec<_> = result
            .partitions
            .iter()
            .flat_map(|p| p.filters.iter().copied())
            .collect();
        assigned.sort();
        let mut expected: Vec<_> = graph.filters().iter().map(|f| f.id).collect();
        expected.sort();
        prop_assert_eq!(assigned, expected);

        let max_work = result.partitions.iter().map(|p| p.work).max().unwrap();
        prop_assert_eq!(max_work, result.bottleneck());
        prop_assert!(result.tiles_used() <= tiles);

        let rewritten = StreamGraph::new(result.rewritten.clone()).unwrap();
        prop_assert_eq!(rewritten.filter_count(), result.tiles_used());
    }
}

// ── Routing ─────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 30,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn compilation_is_deterministic(graph in arb_graph(), tiles in 1usize..8) {
        let config = TargetConfig::for_tile_count(tiles);
        let a = compile_graph(graph.clone(), config.clone(), PassId::Route).unwrap();
        let b = compile_graph(graph, config, PassId::Route).unwrap();
        prop_assert_eq!(&a.partitions.as_ref().unwrap().partitions, &b.partitions.as_ref().unwrap().partitions);
        let mesh_a = a.mesh.as_ref().unwrap();
        let mesh_b = b.mesh.as_ref().unwrap();
        prop_assert_eq!(
            a.switch.as_ref().unwrap().render(mesh_a).unwrap(),
            b.switch.as_ref().unwrap().render(mesh_b).unwrap()
        );
        prop_assert_eq!(a.provenance.graph_hash, b.provenance.graph_hash);
    }

    #[test]
    fn routes_connect_adjacent_tiles(graph in arb_graph(), tiles in 2usize..9) {
        let config = TargetConfig::for_tile_count(tiles);
        let state = compile_graph(graph, config.clone(), PassId::Route).unwrap();
        let mesh = Mesh::from_config(&config).unwrap();
        let program = state.switch.as_ref().unwrap();
        prop_assert!(state.route_cert.as_ref().unwrap().all_pass());

        for stream in &program.streams {
            prop_assert!(mesh.contains(stream.tile));
            for ins in &stream.instructions {
                prop_assert_eq!(ins.tile(), stream.tile);
                for &(src, dst) in ins.routes() {
                    for end in [src, dst] {
                        prop_assert!(mesh.contains(end));
                        if end != stream.tile {
                            prop_assert!(mesh.direction(stream.tile, end).is_ok());
                        }
                    }
                }
            }
        }

        let layout = state.layout.as_ref().unwrap();
        let routed: u64 = layout.dependencies.iter().map(|d| d.items).sum();
        prop_assert_eq!(program.words, routed);
    }
}
