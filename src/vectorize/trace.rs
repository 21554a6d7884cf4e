//! Pixel-graph extraction from a skeleton bitmap.
//!
//! Nodes are foreground pixels whose neighbor count is not 2 (isolated
//! points, stroke ends, junctions). Edges are the pixel chains between
//! them, plus loop edges for closed curves that contain no node at all.
//!
//! Adjacency is 8-connected with stair-step suppression: a diagonal
//! neighbor only counts when neither of the two cardinal pixels it shares
//! with the center is foreground. Without this, every corner of a
//! 4-connected staircase would look like a three-way junction.

use std::collections::HashSet;

use kurbo::Point;
use tracing::debug;

use crate::bitmap::BinaryImage;

/// Index into [`PixelGraph::nodes`].
pub type NodeIndex = usize;
/// Index into [`PixelGraph::edges`].
pub type EdgeId = usize;

const DX: [isize; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY: [isize; 8] = [0, -1, -1, -1, 0, 1, 1, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// No neighbors.
    Isolated,
    /// One neighbor: a stroke end or spur tip.
    End,
    /// Three or more neighbors.
    Junction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Canonical pixel id, `y * width + x`.
    pub id: usize,
    pub point: Point,
    pub kind: NodeKind,
    pub degree: usize,
    /// Incident edges; a self-loop is listed once.
    pub edges: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    /// Ordered pixel centers, endpoints included.
    pub points: Vec<Point>,
    /// Node the walk started from; `None` for node-less loops.
    pub node_a: Option<NodeIndex>,
    /// Node the walk ended on; `None` for node-less loops.
    pub node_b: Option<NodeIndex>,
}

impl Edge {
    /// True when the walk returned to its starting pixel.
    pub fn is_closed(&self) -> bool {
        self.points.len() > 2 && self.points.first() == self.points.last()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelGraph {
    pub width: usize,
    pub height: usize,
    /// Nodes in raster order (ascending `id`).
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl PixelGraph {
    /// Node at pixel `(x, y)`, if that pixel is a node.
    pub fn node_at(&self, x: usize, y: usize) -> Option<&Node> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let id = y * self.width + x;
        self.nodes
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn num_junctions(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Junction)
            .count()
    }

    pub fn num_ends(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::End)
            .count()
    }
}

/// Build the pixel graph of a skeleton bitmap.
///
/// Iteration is raster order throughout, so the result is a pure function
/// of the bitmap.
pub fn trace_graph(image: &BinaryImage) -> PixelGraph {
    let grid = Grid::new(image);
    let n = grid.mask.len();

    let mut nodes = Vec::new();
    let mut node_at: Vec<Option<NodeIndex>> = vec![None; n];
    for p in 0..n {
        if !grid.mask[p] {
            continue;
        }
        let degree = grid.neighbors(p).count();
        if degree == 2 {
            continue;
        }
        node_at[p] = Some(nodes.len());
        nodes.push(Node {
            id: p,
            point: grid.point(p),
            kind: kind_from_degree(degree),
            degree,
            edges: Vec::new(),
        });
    }

    let mut visited: HashSet<u64> = HashSet::new();
    let mut edges: Vec<Edge> = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        let start = node.id;
        for first in grid.neighbors(start) {
            if visited.contains(&link_key(start, first)) {
                continue;
            }
            let pixels = walk(&grid, &node_at, &mut visited, start, first);
            let end = pixels[pixels.len() - 1];
            edges.push(Edge {
                id: edges.len(),
                points: pixels.iter().map(|&p| grid.point(p)).collect(),
                node_a: Some(index),
                node_b: node_at[end],
            });
        }
    }
    let node_edges = edges.len();

    // Whatever is left has no node on it: closed loops of degree-2 pixels.
    for p in 0..n {
        if !grid.mask[p] {
            continue;
        }
        for first in grid.neighbors(p) {
            if visited.contains(&link_key(p, first)) {
                continue;
            }
            let pixels = walk(&grid, &node_at, &mut visited, p, first);
            let end = pixels[pixels.len() - 1];
            edges.push(Edge {
                id: edges.len(),
                points: pixels.iter().map(|&q| grid.point(q)).collect(),
                node_a: node_at[p],
                node_b: node_at[end],
            });
        }
    }

    for edge in &edges {
        if let Some(a) = edge.node_a {
            nodes[a].edges.push(edge.id);
        }
        if let Some(b) = edge.node_b {
            if edge.node_a != Some(b) {
                nodes[b].edges.push(edge.id);
            }
        }
    }

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        loops = edges.len() - node_edges,
        "traced pixel graph"
    );

    PixelGraph {
        width: grid.width,
        height: grid.height,
        nodes,
        edges,
    }
}

/// Follow a chain from `start` through `first` until it reaches a node,
/// returns to `start`, or runs out of unvisited links.
fn walk(
    grid: &Grid,
    node_at: &[Option<NodeIndex>],
    visited: &mut HashSet<u64>,
    start: usize,
    first: usize,
) -> Vec<usize> {
    let mut pixels = vec![start, first];
    visited.insert(link_key(start, first));

    let mut cur = first;
    while cur != start && node_at[cur].is_none() {
        let next = grid
            .neighbors(cur)
            .find(|&nb| !visited.contains(&link_key(cur, nb)));
        let Some(next) = next else {
            break;
        };
        visited.insert(link_key(cur, next));
        pixels.push(next);
        cur = next;
    }

    pixels
}

/// Canonical key of an undirected pixel pair.
#[inline]
fn link_key(a: usize, b: usize) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

fn kind_from_degree(degree: usize) -> NodeKind {
    match degree {
        0 => NodeKind::Isolated,
        1 => NodeKind::End,
        _ => NodeKind::Junction,
    }
}

/// Unpacked occupancy mask with neighbor queries.
struct Grid {
    width: usize,
    height: usize,
    mask: Vec<bool>,
}

impl Grid {
    fn new(image: &BinaryImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let mut mask = vec![false; width * height];
        for (x, y) in image.foreground() {
            mask[y * width + x] = true;
        }
        Self {
            width,
            height,
            mask,
        }
    }

    fn point(&self, p: usize) -> Point {
        Point::new((p % self.width) as f64, (p / self.width) as f64)
    }

    #[inline]
    fn occupied(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        let (xu, yu) = (x as usize, y as usize);
        xu < self.width && yu < self.height && self.mask[yu * self.width + xu]
    }

    /// Connected neighbors of `p` in direction order.
    fn neighbors(&self, p: usize) -> impl Iterator<Item = usize> + '_ {
        let x = (p % self.width) as isize;
        let y = (p / self.width) as isize;
        (0..8).filter_map(move |dir| {
            let (dx, dy) = (DX[dir], DY[dir]);
            if !self.occupied(x + dx, y + dy) {
                return None;
            }
            if dx != 0 && dy != 0 && (self.occupied(x + dx, y) || self.occupied(x, y + dy)) {
                return None;
            }
            Some((y + dy) as usize * self.width + (x + dx) as usize)
        })
    }
}
