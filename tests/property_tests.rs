//! Property-based tests for gkc-graph
//!
//! Verifies CSR/CSC invariants hold for arbitrary edge lists

use gkc_graph::algorithms::{exclusive_prefix_sum, transpose_sequential, transpose_with};
use gkc_graph::storage::codec;
use gkc_graph::{ingest, CsrGraph, GraphConfig, IngestOptions, NodeId, Triple};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn build(num_vertices: usize, triples: &[Triple], symmetrize: bool) -> CsrGraph {
    let options = IngestOptions {
        symmetrize,
        declared_symmetric: false,
    };
    ingest(triples, num_vertices, options).unwrap().graph
}

// Property: ingestion produces a valid, sorted, duplicate-free CSR
proptest! {
    #[test]
    fn prop_ingest_valid_csr((n, triples) in prop_edge_list(1u32..60, 0usize..300)) {
        let graph = build(n, &triples, false);
        let (row_offsets, col_indices, edge_weights) = graph.csr_components();

        // Invariant 1: offsets start at zero and never decrease
        prop_assert_eq!(row_offsets[0], 0);
        prop_assert!(row_offsets.windows(2).all(|w| w[0] <= w[1]));

        // Invariant 2: last offset == number of stored neighbors
        prop_assert_eq!(*row_offsets.last().unwrap() as usize, col_indices.len());

        // Invariant 3: weights index-aligned with neighbors
        prop_assert_eq!(edge_weights.map(<[u32]>::len), Some(col_indices.len()));

        // Invariant 4: strictly ascending neighborhoods, no self-loops
        prop_assert!(graph.has_sorted_neighborhoods());
        prop_assert!(graph.iter_edges().all(|(r, c, _)| r != c));
    }
}

// Property: ingestion keeps exactly the first occurrence of every (row, col)
proptest! {
    #[test]
    fn prop_ingest_first_occurrence((n, triples) in prop_edge_list(1u32..30, 0usize..200)) {
        let graph = build(n, &triples, false);

        let mut expected = BTreeMap::new();
        for t in triples.iter().filter(|t| t.row != t.col) {
            expected.entry((t.row, t.col)).or_insert(t.weight);
        }
        let actual: BTreeMap<_, _> = graph.iter_edges().map(|(r, c, w)| ((r, c), w)).collect();
        prop_assert_eq!(actual, expected);
    }
}

// Property: symmetrized graphs equal their own transpose
proptest! {
    #[test]
    fn prop_symmetrized_is_symmetric((n, triples) in prop_edge_list(1u32..40, 0usize..200)) {
        let graph = build(n, &triples, true);
        let csc = graph.transpose().unwrap();
        let (ia, ja, _) = graph.csr_components();
        prop_assert_eq!(csc.csc_components(), (ia, ja));
    }
}

// Property: transpose(transpose(G)) == G and edge counts are preserved
proptest! {
    #[test]
    fn prop_transpose_roundtrip((n, triples) in prop_edge_list(1u32..80, 0usize..400)) {
        let graph = build(n, &triples, false).without_weights();
        let csc = graph.transpose().unwrap();

        prop_assert_eq!(csc.num_edges(), graph.num_edges());
        prop_assert!(csc.has_sorted_neighborhoods());

        let back = csc.transpose().unwrap();
        prop_assert_eq!(back, graph);
    }
}

// Property: (i, j) in CSR iff i appears in CSC column j
proptest! {
    #[test]
    fn prop_transpose_membership((n, triples) in prop_edge_list(1u32..40, 0usize..200)) {
        let graph = build(n, &triples, false);
        let csc = graph.transpose().unwrap();

        for (row, col, _) in graph.iter_edges() {
            let sources = csc.incoming_neighbors(NodeId(col)).unwrap();
            prop_assert!(sources.binary_search(&row).is_ok());
        }
        let in_degrees: usize = (0..n as u32).map(|v| csc.in_degree(NodeId(v)).unwrap()).sum();
        prop_assert_eq!(in_degrees, graph.num_edges());
    }
}

// Property: worker count and block size never change the result
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_transpose_deterministic(
        (n, triples) in prop_edge_list(1u32..200, 0usize..800),
        threads in 1usize..5,
        block in 1usize..64,
    ) {
        let graph = build(n, &triples, false);
        let (ia, ja, _) = graph.csr_components();

        let config = GraphConfig::default().with_threads(threads).with_prefix_block_len(block);
        let parallel = transpose_with(ia, ja, n, &config).unwrap();
        let sequential = transpose_sequential(ia, ja, n).unwrap();
        prop_assert_eq!(parallel, sequential);
    }
}

// Property: blocked prefix sum matches a running sum
proptest! {
    #[test]
    fn prop_prefix_sum(counts in prop::collection::vec(0u32..1000, 0..500), block in 1usize..100) {
        let mut offsets = vec![0; counts.len() + 1];
        exclusive_prefix_sum(&counts, &mut offsets, block);

        let mut running = 0;
        prop_assert_eq!(offsets[0], 0);
        for (i, &c) in counts.iter().enumerate() {
            running += c;
            prop_assert_eq!(offsets[i + 1], running);
        }
    }
}

// Property: codec round-trip is the identity
proptest! {
    #[test]
    fn prop_codec_roundtrip(values in prop::collection::vec(any::<u32>(), 0..2000), chunk in 1usize..300) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.bin");
        codec::write(&path, &values).unwrap();

        prop_assert_eq!(codec::size_of(&path).unwrap() as usize, values.len());
        let mut buf = vec![0; values.len()];
        prop_assert_eq!(codec::read_into_chunked(&path, &mut buf, chunk).unwrap(), values.len());
        prop_assert_eq!(buf, values);
    }
}

// Helper: vertex count plus an edge list over it
fn prop_edge_list(
    num_vertices: impl Strategy<Value = u32>,
    num_edges: impl Strategy<Value = usize>,
) -> impl Strategy<Value = (usize, Vec<Triple>)> {
    (num_vertices, num_edges).prop_flat_map(|(n, m)| {
        let edges = prop::collection::vec(
            (0..n, 0..n, 0u32..100).prop_map(|(row, col, weight)| Triple::new(row, col, weight)),
            0..=m,
        );
        (Just(n as usize), edges)
    })
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_empty_graph_invariants() {
        let graph = build(0, &[], false);
        let (row_offsets, col_indices, edge_weights) = graph.csr_components();

        assert_eq!(row_offsets, &[0]); // Single offset for empty graph
        assert!(col_indices.is_empty());
        assert_eq!(edge_weights, Some(&[][..]));
        assert_eq!(graph.num_nodes(), 0);

        let csc = graph.transpose().unwrap();
        assert_eq!(csc.num_nodes(), 0);
    }

    #[test]
    fn test_single_edge_invariants() {
        let graph = build(2, &[Triple::new(0, 1, 1)], false);
        let (row_offsets, col_indices, _) = graph.csr_components();

        // row_offsets: [0, 1, 1] (node 0 has 1 edge, node 1 has 0 edges)
        assert_eq!(row_offsets, &[0, 1, 1]);
        assert_eq!(col_indices, &[1]);

        let (col_offsets, row_indices) = graph.transpose().unwrap().into_parts();
        assert_eq!(&col_offsets[..], &[0, 0, 1]);
        assert_eq!(&row_indices[..], &[0]);
    }
}
