// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

use proptest::prelude::*;

use dagflow::pipeline::DagBuilder;
use dagflow::{DagflowError, Parameters, Pipeline};

/// Build a pipeline of `n` tasks, declaring every candidate edge and keeping
/// the ones that are accepted.
fn build(n: usize, edges: &[(usize, usize)]) -> (Pipeline, Vec<(String, String)>) {
    let mut pipeline = Pipeline::new("prop");
    for i in 0..n {
        pipeline
            .define_task(format!("t{}", i), "noop", Parameters::new())
            .unwrap();
    }

    let mut accepted = Vec::new();
    for &(from, to) in edges {
        let (up, down) = (format!("t{}", from % n), format!("t{}", to % n));
        match pipeline.declare_dependency(&up, &down) {
            Ok(()) => accepted.push((up, down)),
            Err(DagflowError::Cycle { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    (pipeline, accepted)
}

proptest! {
    #[test]
    fn topological_order_respects_every_edge(
        n in 1_usize..12,
        edges in prop::collection::vec((0_usize..12, 0_usize..12), 0..40),
    ) {
        let (pipeline, accepted) = build(n, &edges);
        let order = DagBuilder::build(&pipeline).topological_order_names().unwrap();

        prop_assert_eq!(order.len(), n);
        let position = |name: &str| order.iter().position(|o| o == name).unwrap();
        for (up, down) in &accepted {
            prop_assert!(position(up) < position(down));
        }
    }

    #[test]
    fn rejected_cycle_leaves_graph_unchanged(
        n in 2_usize..10,
        edges in prop::collection::vec((0_usize..10, 0_usize..10), 0..30),
        probe in (0_usize..10, 0_usize..10),
    ) {
        let (mut pipeline, _) = build(n, &edges);
        let before: Vec<Vec<String>> =
            pipeline.tasks().iter().map(|t| t.upstream().to_vec()).collect();

        let (up, down) = (format!("t{}", probe.0 % n), format!("t{}", probe.1 % n));
        if let Err(DagflowError::Cycle { path }) = pipeline.declare_dependency(&up, &down) {
            let after: Vec<Vec<String>> =
                pipeline.tasks().iter().map(|t| t.upstream().to_vec()).collect();
            prop_assert_eq!(before, after);
            prop_assert_eq!(path.first(), Some(&up));
            prop_assert_eq!(path.last(), Some(&up));
        }
    }
}
