use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::algorithms::{self, Direction};
use crate::db;
use crate::error::{LibError, Result};
use crate::models::{
    AdjacencyList, CreateGraphPayload, Graph, GraphCreated, GraphId, GraphSummary, GraphView,
    VertexId,
};

/// Graph operations over a shared connection pool.
///
/// Each write runs inside one transaction; a transaction dropped before
/// `commit` is rolled back by sqlx, so every early return leaves the store
/// untouched.
#[derive(Clone)]
pub struct GraphService {
    pool: Arc<SqlitePool>,
}

impl GraphService {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub fn from_pool(pool: &SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool.clone()),
        }
    }

    pub fn pool(&self) -> Arc<SqlitePool> {
        Arc::clone(&self.pool)
    }

    /// Inserts the graph, its vertices in input order and then its edges,
    /// resolving edge endpoints by name. Duplicate node names are accepted;
    /// the last vertex with a given name is the one edges resolve to.
    #[tracing::instrument(skip_all, fields(nodes = payload.nodes.len(), edges = payload.edges.len()))]
    pub async fn create_graph(&self, payload: CreateGraphPayload) -> Result<GraphCreated> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", err.into()))?;

        let graph_id = db::create_graph(&mut tx, payload.name.as_deref()).await?;

        let mut vertex_ids: HashMap<&str, VertexId> = HashMap::with_capacity(payload.nodes.len());
        for node in &payload.nodes {
            let vertex_id = db::insert_vertex(&mut tx, graph_id, &node.name).await?;
            vertex_ids.insert(node.name.as_str(), vertex_id);
        }

        for edge in &payload.edges {
            let source_id = vertex_ids.get(edge.source.as_str());
            let target_id = vertex_ids.get(edge.target.as_str());
            let (Some(&source_id), Some(&target_id)) = (source_id, target_id) else {
                tracing::info!(edge_source = %edge.source, edge_target = %edge.target, "rejecting unresolved edge");
                return Err(LibError::invalid_edge(&edge.source, &edge.target));
            };
            db::insert_edge(&mut tx, graph_id, source_id, target_id).await?;
        }

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", err.into()))?;

        tracing::info!(%graph_id, "graph created");
        Ok(GraphCreated { id: graph_id })
    }

    pub async fn read_graph(&self, graph_id: GraphId) -> Result<GraphView> {
        let graph = self.load_graph(graph_id).await?;
        Ok(algorithms::graph_view(&graph))
    }

    pub async fn adjacency_list(&self, graph_id: GraphId) -> Result<AdjacencyList> {
        let graph = self.load_graph(graph_id).await?;
        Ok(AdjacencyList {
            adjacency_list: algorithms::named_adjacency(&graph, Direction::Outgoing),
        })
    }

    pub async fn reverse_adjacency_list(&self, graph_id: GraphId) -> Result<AdjacencyList> {
        let graph = self.load_graph(graph_id).await?;
        Ok(AdjacencyList {
            adjacency_list: algorithms::named_adjacency(&graph, Direction::Incoming),
        })
    }

    /// Deletes the first vertex named `name` together with its incident edges.
    /// The delete runs before any read so concurrent callers queue on the
    /// write lock.
    #[tracing::instrument(skip(self))]
    pub async fn delete_node(&self, graph_id: GraphId, name: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", err.into()))?;

        if !db::delete_vertex(&mut tx, graph_id, name).await? {
            if !db::graph_exists(&mut tx, graph_id).await? {
                return Err(LibError::graph_not_found(graph_id));
            }
            return Err(LibError::node_not_found(graph_id, name));
        }

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", err.into()))?;
        Ok(())
    }

    pub async fn graph_summary(&self, graph_id: GraphId) -> Result<GraphSummary> {
        let mut conn = self.acquire().await?;
        db::graph_summary(&mut conn, graph_id)
            .await?
            .ok_or_else(|| LibError::graph_not_found(graph_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn rename_graph(&self, graph_id: GraphId, name: Option<&str>) -> Result<GraphSummary> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", err.into()))?;

        if !db::rename_graph(&mut tx, graph_id, name).await? {
            return Err(LibError::graph_not_found(graph_id));
        }
        let summary = db::graph_summary(&mut tx, graph_id)
            .await?
            .ok_or_else(|| LibError::graph_not_found(graph_id))?;

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", err.into()))?;
        Ok(summary)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        let mut conn = self.acquire().await?;
        if db::delete_graph(&mut conn, graph_id).await? {
            Ok(())
        } else {
            Err(LibError::graph_not_found(graph_id))
        }
    }

    async fn load_graph(&self, graph_id: GraphId) -> Result<Graph> {
        let mut conn = self.acquire().await?;
        db::get_graph(&mut conn, graph_id)
            .await?
            .ok_or_else(|| LibError::graph_not_found(graph_id))
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|err| LibError::database("Failed to acquire connection", err.into()))
    }
}
