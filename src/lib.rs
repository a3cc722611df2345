pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod operations;

pub mod prelude {
    pub use crate::algorithms::{
        Direction, adjacency_map, graph_view, named_adjacency, reverse_adjacency_map,
    };
    #[cfg(feature = "api")]
    pub use crate::api::{GraphApp, HasPool};
    pub use crate::config::ServiceConfig;
    pub use crate::db::{
        connect, connect_in_memory, create_edge, create_graph, create_graph_tables, create_vertex,
        delete_graph, delete_vertex, get_graph, graph_exists, graph_summary, rename_graph,
        reset_graph_tables,
    };
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::models::{
        AdjacencyList, CreateGraphPayload, Edge, EdgeId, Graph, GraphCreated, GraphEdge, GraphId,
        GraphNode, GraphSummary, GraphView, RenameGraphPayload, Vertex, VertexId,
    };
    pub use crate::operations::GraphService;
}
