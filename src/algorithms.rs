use std::collections::HashMap;

use indexmap::IndexMap;

use crate::models::{Graph, GraphEdge, GraphNode, GraphView, VertexId};

/// Which edge endpoint a vertex's neighbours are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Targets of edges leaving the vertex.
    Outgoing,
    /// Sources of edges entering the vertex.
    Incoming,
}

pub fn adjacency_map(graph: &Graph) -> HashMap<VertexId, Vec<VertexId>> {
    neighbour_map(graph, Direction::Outgoing)
}

pub fn reverse_adjacency_map(graph: &Graph) -> HashMap<VertexId, Vec<VertexId>> {
    neighbour_map(graph, Direction::Incoming)
}

fn neighbour_map(graph: &Graph, direction: Direction) -> HashMap<VertexId, Vec<VertexId>> {
    let mut adjacency: HashMap<VertexId, Vec<VertexId>> =
        HashMap::with_capacity(graph.vertices.len());
    for vertex in &graph.vertices {
        adjacency.insert(vertex.id, Vec::new());
    }
    for edge in &graph.edges {
        let (key, neighbour) = match direction {
            Direction::Outgoing => (edge.source_id, edge.target_id),
            Direction::Incoming => (edge.target_id, edge.source_id),
        };
        if !adjacency.contains_key(&neighbour) {
            // Skip dangling edges instead of failing the whole computation.
            continue;
        }
        if let Some(neighbours) = adjacency.get_mut(&key) {
            neighbours.push(neighbour);
        }
    }
    adjacency
}

/// Name-keyed adjacency list. Every vertex name is a key exactly once, in
/// vertex storage order; each value lists neighbour names in edge insertion
/// order. Vertices sharing a name accumulate under the same key.
pub fn named_adjacency(graph: &Graph, direction: Direction) -> IndexMap<String, Vec<String>> {
    let names = vertex_names(graph);
    let neighbours = neighbour_map(graph, direction);

    let mut output: IndexMap<String, Vec<String>> = IndexMap::with_capacity(graph.vertices.len());
    for vertex in &graph.vertices {
        let entry = output.entry(vertex.name.clone()).or_default();
        if let Some(ids) = neighbours.get(&vertex.id) {
            entry.extend(
                ids.iter()
                    .filter_map(|id| names.get(id))
                    .map(|name| (*name).to_string()),
            );
        }
    }
    output
}

/// Resolves stored foreign keys back to vertex names.
pub fn graph_view(graph: &Graph) -> GraphView {
    let names = vertex_names(graph);
    GraphView {
        id: graph.id,
        nodes: graph
            .vertices
            .iter()
            .map(|vertex| GraphNode {
                name: vertex.name.clone(),
            })
            .collect(),
        edges: graph
            .edges
            .iter()
            .filter_map(|edge| {
                let source = names.get(&edge.source_id)?;
                let target = names.get(&edge.target_id)?;
                Some(GraphEdge {
                    source: (*source).to_string(),
                    target: (*target).to_string(),
                })
            })
            .collect(),
    }
}

fn vertex_names(graph: &Graph) -> HashMap<VertexId, &str> {
    graph
        .vertices
        .iter()
        .map(|vertex| (vertex.id, vertex.name.as_str()))
        .collect()
}
