use std::str::FromStr;

use anyhow::anyhow;
use chrono::Utc;
use once_cell::sync::Lazy;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::config::ServiceConfig;
use crate::error::{LibError, Result};
use crate::models::{Edge, EdgeId, Graph, GraphId, GraphSummary, Vertex, VertexId};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| sqlx::migrate!("./migrations"));

/// Opens the pool described by `config`. Foreign keys are always enforced so
/// vertex and graph deletes cascade. Writers queue on the busy timeout
/// instead of failing with `database is locked`, and WAL keeps readers off
/// the write lock.
pub async fn connect(config: &ServiceConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|err| db_err("Invalid database URL", err))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.acquire_timeout);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .map_err(|err| db_err("Failed to connect to database", err))
}

/// Single-connection in-memory pool with the schema applied. Every connection
/// to `sqlite::memory:` is its own database, so the pool never grows or
/// recycles its one connection.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|err| db_err("Invalid database URL", err))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|err| db_err("Failed to open in-memory database", err))?;

    create_graph_tables(&pool).await?;
    Ok(pool)
}

pub async fn create_graph_tables(pool: &SqlitePool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Drops every graph table and the migration ledger, then migrates again.
pub async fn reset_graph_tables(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| db_err("Failed to start transaction", err))?;

    for table in ["edges", "vertices", "graphs", "_sqlx_migrations"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await
            .map_err(|err| db_err("Failed to drop graph tables", err))?;
    }

    tx.commit()
        .await
        .map_err(|err| db_err("Failed to commit transaction", err))?;

    tracing::warn!("graph tables dropped; recreating schema");
    create_graph_tables(pool).await
}

#[derive(Debug, Clone, FromRow)]
struct GraphRow {
    id: i64,
    name: Option<String>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct GraphSummaryRow {
    id: i64,
    name: Option<String>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
    node_count: i64,
    edge_count: i64,
}

#[derive(Debug, Clone, FromRow)]
struct VertexRow {
    id: i64,
    name: String,
}

#[derive(Debug, Clone, FromRow)]
struct EdgeRow {
    id: i64,
    source_id: i64,
    target_id: i64,
}

impl From<GraphSummaryRow> for GraphSummary {
    fn from(value: GraphSummaryRow) -> Self {
        Self {
            id: GraphId(value.id),
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
            node_count: value.node_count,
            edge_count: value.edge_count,
        }
    }
}

fn hydrate_graph(row: GraphRow, vertices: Vec<VertexRow>, edges: Vec<EdgeRow>) -> Graph {
    Graph {
        id: GraphId(row.id),
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
        vertices: vertices
            .into_iter()
            .map(|vertex| Vertex {
                id: VertexId(vertex.id),
                name: vertex.name,
            })
            .collect(),
        edges: edges
            .into_iter()
            .map(|edge| Edge {
                id: EdgeId(edge.id),
                source_id: VertexId(edge.source_id),
                target_id: VertexId(edge.target_id),
            })
            .collect(),
    }
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

pub async fn graph_exists(conn: &mut SqliteConnection, graph_id: GraphId) -> Result<bool> {
    let exists: (i64,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM graphs
            WHERE id = ?1
        )
        "#,
    )
    .bind(graph_id.0)
    .fetch_one(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to query graph", err))?;

    Ok(exists.0 != 0)
}

async fn vertex_graph(conn: &mut SqliteConnection, vertex_id: VertexId) -> Result<Option<GraphId>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT graph_id
        FROM vertices
        WHERE id = ?1
        "#,
    )
    .bind(vertex_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to query vertex", err))?;

    Ok(row.map(|(graph_id,)| GraphId(graph_id)))
}

pub async fn create_graph(conn: &mut SqliteConnection, name: Option<&str>) -> Result<GraphId> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        r#"
        INSERT INTO graphs (name, created_at, updated_at)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to create graph", err))?;

    let graph_id = GraphId(result.last_insert_rowid());
    tracing::debug!(%graph_id, "inserted graph");
    Ok(graph_id)
}

pub async fn create_vertex(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
    name: &str,
) -> Result<VertexId> {
    if !graph_exists(conn, graph_id).await? {
        return Err(LibError::graph_not_found(graph_id));
    }
    insert_vertex(conn, graph_id, name).await
}

/// Inserts a vertex without checking the graph. Callers must already know
/// `graph_id` exists, e.g. because they created it in the same transaction.
pub(crate) async fn insert_vertex(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
    name: &str,
) -> Result<VertexId> {
    let result = sqlx::query(
        r#"
        INSERT INTO vertices (graph_id, name)
        VALUES (?1, ?2)
        "#,
    )
    .bind(graph_id.0)
    .bind(name)
    .execute(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to write graph vertices", err))?;

    Ok(VertexId(result.last_insert_rowid()))
}

pub async fn create_edge(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
    source_id: VertexId,
    target_id: VertexId,
) -> Result<EdgeId> {
    for (role, vertex_id) in [("source", source_id), ("target", target_id)] {
        match vertex_graph(conn, vertex_id).await? {
            Some(owner) if owner == graph_id => {}
            Some(owner) => {
                return Err(LibError::invalid_reference(
                    format!("Edge {} vertex {} belongs to another graph", role, vertex_id),
                    anyhow!(
                        "vertex {} belongs to graph {}, not graph {}",
                        vertex_id,
                        owner,
                        graph_id
                    ),
                ));
            }
            None => {
                return Err(LibError::invalid_reference(
                    format!("Edge {} vertex {} not found", role, vertex_id),
                    anyhow!("vertex {} does not exist", vertex_id),
                ));
            }
        }
    }
    insert_edge(conn, graph_id, source_id, target_id).await
}

/// Inserts an edge without validating its endpoints.
pub(crate) async fn insert_edge(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
    source_id: VertexId,
    target_id: VertexId,
) -> Result<EdgeId> {
    let result = sqlx::query(
        r#"
        INSERT INTO edges (graph_id, source_id, target_id)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(graph_id.0)
    .bind(source_id.0)
    .bind(target_id.0)
    .execute(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to write graph edges", err))?;

    Ok(EdgeId(result.last_insert_rowid()))
}

pub async fn get_graph(conn: &mut SqliteConnection, graph_id: GraphId) -> Result<Option<Graph>> {
    let Some(graph) = sqlx::query_as::<_, GraphRow>(
        r#"
        SELECT id, name, created_at, updated_at
        FROM graphs
        WHERE id = ?1
        "#,
    )
    .bind(graph_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to query graph", err))?
    else {
        return Ok(None);
    };

    let vertices = sqlx::query_as::<_, VertexRow>(
        r#"
        SELECT id, name
        FROM vertices
        WHERE graph_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(graph_id.0)
    .fetch_all(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to query graph vertices", err))?;

    let edges = sqlx::query_as::<_, EdgeRow>(
        r#"
        SELECT id, source_id, target_id
        FROM edges
        WHERE graph_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(graph_id.0)
    .fetch_all(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to query graph edges", err))?;

    Ok(Some(hydrate_graph(graph, vertices, edges)))
}

pub async fn graph_summary(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
) -> Result<Option<GraphSummary>> {
    let row = sqlx::query_as::<_, GraphSummaryRow>(
        r#"
        SELECT
            g.id,
            g.name,
            g.created_at,
            g.updated_at,
            (SELECT COUNT(*) FROM vertices v WHERE v.graph_id = g.id) AS node_count,
            (SELECT COUNT(*) FROM edges e WHERE e.graph_id = g.id) AS edge_count
        FROM graphs g
        WHERE g.id = ?1
        "#,
    )
    .bind(graph_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to query graph", err))?;

    Ok(row.map(GraphSummary::from))
}

/// Deletes the lowest-id vertex named `name` in the graph. Incident edges go
/// with it through the `ON DELETE CASCADE` foreign keys.
///
/// The lookup and the delete are one statement, so a transaction that starts
/// here takes the write lock first and never has to upgrade a read lock.
pub async fn delete_vertex(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
    name: &str,
) -> Result<bool> {
    let deleted: Option<(i64,)> = sqlx::query_as(
        r#"
        DELETE FROM vertices
        WHERE id = (
            SELECT id
            FROM vertices
            WHERE graph_id = ?1
              AND name = ?2
            ORDER BY id ASC
            LIMIT 1
        )
        RETURNING id
        "#,
    )
    .bind(graph_id.0)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to delete vertex", err))?;

    let Some((vertex_id,)) = deleted else {
        return Ok(false);
    };

    tracing::debug!(%graph_id, vertex_id, "deleted vertex");
    Ok(true)
}

pub async fn rename_graph(
    conn: &mut SqliteConnection,
    graph_id: GraphId,
    name: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE graphs
        SET name = ?1,
            updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(name)
    .bind(Utc::now().naive_utc())
    .bind(graph_id.0)
    .execute(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to update graph", err))?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_graph(conn: &mut SqliteConnection, graph_id: GraphId) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM graphs
        WHERE id = ?1
        "#,
    )
    .bind(graph_id.0)
    .execute(&mut *conn)
    .await
    .map_err(|err| db_err("Failed to delete graph", err))?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count query should succeed");
    count
}
