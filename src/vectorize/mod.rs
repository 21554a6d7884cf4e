//! Vectorization pipeline: skeleton bitmap → line/arc paths.
//!
//! 1. Pixel-graph extraction (nodes at ends and junctions, edges between)
//! 2. Greedy line/arc segmentation of each edge
//! 3. Joint gradient-descent refinement with adaptive splitting
//!
//! Stages 2 and 3 only look at one edge at a time, so they run in
//! parallel across edges.

pub mod fit;
pub mod optimize;
pub mod segment;
pub mod trace;

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::bitmap::BinaryImage;
use crate::config::VectorizeConfig;
use crate::vector::{Path, VectorImage};

use optimize::{optimize_edge, EdgePins, OptimizeOutcome};
use segment::segment_polyline;
use trace::{trace_graph, Edge, NodeIndex, NodeKind, PixelGraph};

/// Vectorize a skeleton with the default configuration.
pub fn vectorize_skeleton(image: &BinaryImage) -> VectorImage {
    vectorize_skeleton_with(image, &VectorizeConfig::default())
}

/// Vectorize a skeleton: trace it once, then segment and optimize every
/// edge independently. The output has one path per traced edge, in edge
/// order, and is identical for identical input.
pub fn vectorize_skeleton_with(image: &BinaryImage, config: &VectorizeConfig) -> VectorImage {
    let t_start = Instant::now();

    let graph = trace_graph(image);

    let run = |edge: &Edge| vectorize_edge(&graph, edge, config);
    let results: Vec<(Path, OptimizeOutcomeSummary)> = if config.parallel {
        graph.edges.par_iter().map(run).collect()
    } else {
        graph.edges.iter().map(run).collect()
    };

    let aborted = results.iter().filter(|(_, s)| s.aborted).count();
    let splits: usize = results.iter().map(|(_, s)| s.splits).sum();
    let paths: Vec<Path> = results
        .into_iter()
        .map(|(path, _)| path)
        .filter(|path| !path.segments.is_empty())
        .collect();

    let result = VectorImage {
        width: image.width(),
        height: image.height(),
        paths,
    };
    debug!(splits, aborted, "optimized edges");
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        paths = result.paths.len(),
        lines = result.line_count(),
        arcs = result.arc_count(),
        elapsed_ms = t_start.elapsed().as_millis() as u64,
        "vectorized skeleton"
    );
    result
}

/// The parts of an [`OptimizeOutcome`] the summary log needs.
struct OptimizeOutcomeSummary {
    splits: usize,
    aborted: bool,
}

fn vectorize_edge(
    graph: &PixelGraph,
    edge: &Edge,
    config: &VectorizeConfig,
) -> (Path, OptimizeOutcomeSummary) {
    let candidates = segment_polyline(&edge.points, config);
    let pins = if config.pin_junctions {
        EdgePins {
            start: is_junction(graph, edge.node_a),
            end: is_junction(graph, edge.node_b),
        }
    } else {
        EdgePins::default()
    };
    let OptimizeOutcome {
        segments,
        splits,
        aborted,
        ..
    } = optimize_edge(&edge.points, &candidates, pins, config);

    let closed = match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => first.start().distance(last.end()) < config.closed_epsilon,
        _ => false,
    };
    (
        Path {
            points: edge.points.clone(),
            closed,
            segments,
        },
        OptimizeOutcomeSummary { splits, aborted },
    )
}

fn is_junction(graph: &PixelGraph, node: Option<NodeIndex>) -> bool {
    node.is_some_and(|i| graph.nodes[i].kind == NodeKind::Junction)
}
