//! End-to-end construction walkthrough
//!
//! Run with: cargo run --example convert_and_transpose

use gkc_graph::storage::mtx::{convert, MatrixMarketHeader};
use gkc_graph::storage::sources::{read_sources, write_sources};
use gkc_graph::{CsrGraph, GraphConfig, GraphFiles, NodeId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("gkc-graph construction walkthrough\n");

    // 1. Matrix-Market entries (1-indexed lower triangle of a 5-cycle plus a chord)
    let header = MatrixMarketHeader::symmetric(5, 5, 6);
    let entries = [
        (2, 1, 3.0),
        (3, 2, 1.0),
        (4, 3, 4.0),
        (5, 4, 1.0),
        (5, 1, 5.0),
        (4, 1, 9.0),
    ];

    let dir = std::env::temp_dir().join("gkc_graph_demo");
    std::fs::create_dir_all(&dir)?;
    let files = GraphFiles::from_basename(dir.join("cycle"));

    println!("Converting {} entries...", entries.len());
    let report = convert(&header, entries, None, &files)?;
    println!(
        "  {} vertices, {} edges (symmetrized: {})",
        report.num_vertices, report.num_edges, report.symmetrized
    );
    if let Some(diagnostic) = report.diagnostic {
        println!("  note: {}", diagnostic.message());
    }

    // 2. Load the binary files (concurrently, off the async runtime)
    let config = GraphConfig::from_env();
    let graph = CsrGraph::read_binary(&files, &config).await?;
    println!("\nLoaded CSR: {} vertices, {} edges", graph.num_nodes(), graph.num_edges());

    // 3. Transpose
    let csc = graph.transpose_with(&config)?;
    for v in 0..csc.num_nodes() as u32 {
        println!("  in({v}) = {:?}", csc.incoming_neighbors(NodeId(v))?);
    }

    // 4. Derived layouts
    let lower = graph.lower_triangular()?;
    println!("\nLower triangle keeps {} of {} edges", lower.num_edges(), graph.num_edges());

    // 5. Sources for traversal kernels
    let path = write_sources(dir.join("cycle"), &[0, 3, 42])?;
    let sources = read_sources(&path, graph.num_nodes())?;
    println!("Sources: {sources:?}");

    Ok(())
}
