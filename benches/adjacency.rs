use std::hint::black_box;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use graph_store::algorithms::{Direction, named_adjacency};
use graph_store::models::{Edge, EdgeId, Graph, GraphId, Vertex, VertexId};

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn synthetic_graph(node_count: usize, edge_count: usize) -> Graph {
    let now = Utc::now().naive_utc();
    let vertices = (0..node_count)
        .map(|idx| Vertex {
            id: VertexId(idx as i64 + 1),
            name: format!("n{idx}"),
        })
        .collect::<Vec<_>>();

    let mut state = 0x1234_5678_9abc_def0u64;
    let edges = (0..edge_count)
        .map(|idx| {
            let source = (lcg_next(&mut state) as usize) % node_count;
            let target = (lcg_next(&mut state) as usize) % node_count;
            Edge {
                id: EdgeId(idx as i64 + 1),
                source_id: vertices[source].id,
                target_id: vertices[target].id,
            }
        })
        .collect();

    Graph {
        id: GraphId(1),
        name: None,
        created_at: now,
        updated_at: now,
        vertices,
        edges,
    }
}

fn bench_named_adjacency(c: &mut Criterion) {
    let mut group = c.benchmark_group("named_adjacency");
    for (nodes, edges) in [(100, 400), (1_000, 4_000), (10_000, 40_000)] {
        let graph = synthetic_graph(nodes, edges);
        group.throughput(Throughput::Elements(edges as u64));
        group.bench_with_input(BenchmarkId::new("outgoing", nodes), &graph, |b, graph| {
            b.iter(|| black_box(named_adjacency(graph, Direction::Outgoing)))
        });
        group.bench_with_input(BenchmarkId::new("incoming", nodes), &graph, |b, graph| {
            b.iter(|| black_box(named_adjacency(graph, Direction::Incoming)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_named_adjacency);
criterion_main!(benches);
