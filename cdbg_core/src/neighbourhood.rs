//! Neighbourhood extraction: the union of vertices reachable within a
//! radius of a seed set on the undirected unitig graph, split into connected
//! components.

use crate::edge_builder::Edge;
use crate::error::Result;
use petgraph::graphmap::UnGraphMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// The undirected unitig graph: vertices are unitig ids, edges are
/// unweighted (the orientation label from edge reconstruction is not needed for reachability).
pub type UnitigGraph = UnGraphMap<usize, ()>;

/// Builds the undirected unitig graph from `num_unitigs` vertices and the
/// edges edge reconstruction produced.
pub fn build_graph(num_unitigs: usize, edges: &[Edge]) -> UnitigGraph {
    let mut graph = UnGraphMap::with_capacity(num_unitigs, edges.len());
    for id in 0..num_unitigs {
        graph.add_node(id);
    }
    for edge in edges {
        graph.add_edge(edge.source, edge.target, ());
    }
    graph
}

/// The result of a neighbourhood extraction.
pub struct Neighbourhood {
    /// The union `U` of vertices within `radius` of some seed, ascending.
    pub vertices: Vec<usize>,
    /// `G[U]`'s connected components, in discovery order; each sorted ascending.
    pub components: Vec<Vec<usize>>,
}

/// Computes the radius-bounded neighbourhood of `seeds` on `graph` and its
/// connected components. Runs one bounded Dijkstra per seed,
/// terminating a seed's search as soon as the next finalized vertex would
/// exceed `radius` (valid for non-negative unit weights, since the heap
/// visits vertices in non-decreasing distance order). A seed id outside the
/// graph is warned about and skipped, not a fatal error.
pub fn extract(graph: &UnitigGraph, seeds: &[usize], radius: usize) -> Result<Neighbourhood> {
    let mut reached: HashSet<usize> = HashSet::new();

    for &seed in seeds {
        if !graph.contains_node(seed) {
            log::warn!("seed unitig {seed} is not a vertex of the unitig graph, skipping");
            continue;
        }

        let mut dist: HashMap<usize, usize> = HashMap::new();
        let mut heap: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();
        dist.insert(seed, 0);
        heap.push(Reverse((0, seed)));

        while let Some(Reverse((d, v))) = heap.pop() {
            if d > radius {
                break;
            }
            if d > *dist.get(&v).unwrap_or(&usize::MAX) {
                continue;
            }
            reached.insert(v);
            for neighbour in graph.neighbors(v) {
                let candidate = d + 1;
                if candidate <= radius && candidate < *dist.get(&neighbour).unwrap_or(&usize::MAX) {
                    dist.insert(neighbour, candidate);
                    heap.push(Reverse((candidate, neighbour)));
                }
            }
        }
    }

    let mut vertices: Vec<usize> = reached.into_iter().collect();
    vertices.sort_unstable();
    let components = connected_components(graph, &vertices);

    Ok(Neighbourhood { vertices, components })
}

/// Connected components of the subgraph of `graph` induced by `vertices`,
/// in discovery order (every vertex ends up in exactly one component).
fn connected_components(graph: &UnitigGraph, vertices: &[usize]) -> Vec<Vec<usize>> {
    let allowed: HashSet<usize> = vertices.iter().copied().collect();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut components = Vec::new();

    for &start in vertices {
        if visited.contains(&start) {
            continue;
        }
        let mut stack = vec![start];
        visited.insert(start);
        let mut component = Vec::new();
        while let Some(v) = stack.pop() {
            component.push(v);
            for neighbour in graph.neighbors(v) {
                if allowed.contains(&neighbour) && visited.insert(neighbour) {
                    stack.push(neighbour);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}
