use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

use crate::error::{ErrorKind, LibError};
use crate::models::{CreateGraphPayload, GraphId, RenameGraphPayload};
use crate::operations::GraphService;

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidEdge | ErrorKind::InvalidReference => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
        };

        if status.is_server_error() {
            tracing::error!(kind = ?self.0.kind, code = self.0.code, error = %self.0.source, "graph api request failed");
        } else {
            tracing::warn!(kind = ?self.0.kind, code = self.0.code, error = %self.0.source, "graph api request rejected");
        }

        let body = Json(json!({
            "code": self.0.code,
            "detail": self.0.public,
        }));
        (status, body).into_response()
    }
}

pub trait HasPool {
    fn pool(&self) -> Arc<sqlx::SqlitePool>;
}

pub trait GraphApp: HasPool {
    fn graphs(&self) -> GraphService {
        GraphService::new(self.pool())
    }
}

async fn create_graph_handler<S>(
    State(app): State<S>,
    Json(payload): Json<CreateGraphPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let created = app.graphs().create_graph(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_graph_handler<S>(
    State(app): State<S>,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graph = app.graphs().read_graph(graph_id).await?;
    Ok(Json(graph))
}

async fn adjacency_list_handler<S>(
    State(app): State<S>,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let adjacency = app.graphs().adjacency_list(graph_id).await?;
    Ok(Json(adjacency))
}

async fn reverse_adjacency_list_handler<S>(
    State(app): State<S>,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let adjacency = app.graphs().reverse_adjacency_list(graph_id).await?;
    Ok(Json(adjacency))
}

async fn delete_node_handler<S>(
    State(app): State<S>,
    Path((graph_id, node_name)): Path<(GraphId, String)>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    app.graphs().delete_node(graph_id, &node_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn graph_summary_handler<S>(
    State(app): State<S>,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let summary = app.graphs().graph_summary(graph_id).await?;
    Ok(Json(summary))
}

async fn rename_graph_handler<S>(
    State(app): State<S>,
    Path(graph_id): Path<GraphId>,
    Json(payload): Json<RenameGraphPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let summary = app
        .graphs()
        .rename_graph(graph_id, payload.name.as_deref())
        .await?;
    Ok(Json(summary))
}

async fn delete_graph_handler<S>(
    State(app): State<S>,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    app.graphs().delete_graph(graph_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Welcome to the graph store"
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

pub fn routes<S>() -> Router<S>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /api/graph [POST]");
    tracing::info!("Registering route /api/graph/{{graph_id}} [GET,PATCH,DELETE]");
    tracing::info!("Registering route /api/graph/{{graph_id}}/summary [GET]");
    tracing::info!("Registering route /api/graph/{{graph_id}}/adjacency_list [GET]");
    tracing::info!("Registering route /api/graph/{{graph_id}}/reverse_adjacency_list [GET]");
    tracing::info!("Registering route /api/graph/{{graph_id}}/node/{{node_name}} [DELETE]");

    Router::new()
        .route("/api/graph", post(create_graph_handler::<S>))
        .route(
            "/api/graph/{graph_id}",
            get(get_graph_handler::<S>)
                .patch(rename_graph_handler::<S>)
                .delete(delete_graph_handler::<S>),
        )
        .route(
            "/api/graph/{graph_id}/summary",
            get(graph_summary_handler::<S>),
        )
        .route(
            "/api/graph/{graph_id}/adjacency_list",
            get(adjacency_list_handler::<S>),
        )
        .route(
            "/api/graph/{graph_id}/reverse_adjacency_list",
            get(reverse_adjacency_list_handler::<S>),
        )
        .route(
            "/api/graph/{graph_id}/node/{node_name}",
            delete(delete_node_handler::<S>),
        )
}

/// Full application: graph routes plus `/` and `/healthz`, permissive CORS,
/// request tracing, and trailing-slash normalisation so `/api/graph/1/` and
/// `/api/graph/1` reach the same handler.
pub fn app<S>(state: S) -> NormalizePath<Router>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let router = Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(health_handler))
        .merge(routes::<S>())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    NormalizePath::trim_trailing_slash(router)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    use super::{GraphApp, HasPool, app};
    use crate::db::connect_in_memory;

    #[derive(Clone)]
    struct TestApp {
        pool: Arc<SqlitePool>,
    }

    impl HasPool for TestApp {
        fn pool(&self) -> Arc<SqlitePool> {
            Arc::clone(&self.pool)
        }
    }

    impl GraphApp for TestApp {}

    async fn test_app() -> TestApp {
        let pool = connect_in_memory().await.expect("in-memory pool");
        TestApp {
            pool: Arc::new(pool),
        }
    }

    async fn send(
        state: &TestApp,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = app(state.clone())
            .oneshot(request)
            .await
            .expect("infallible service");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn chain() -> Value {
        json!({
            "nodes": [{"name": "a"}, {"name": "b"}, {"name": "c"}],
            "edges": [{"source": "a", "target": "b"}, {"source": "b", "target": "c"}]
        })
    }

    #[tokio::test]
    async fn create_and_read_graph() {
        let state = test_app().await;

        let (status, body) = send(&state, Method::POST, "/api/graph/", Some(chain())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().expect("numeric id");

        let (status, body) = send(&state, Method::GET, &format!("/api/graph/{id}/"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!(id));
        assert_eq!(body["nodes"], chain()["nodes"]);
        assert_eq!(body["edges"], chain()["edges"]);
    }

    #[tokio::test]
    async fn adjacency_routes() {
        let state = test_app().await;
        let (_, body) = send(&state, Method::POST, "/api/graph", Some(chain())).await;
        let id = body["id"].as_i64().expect("numeric id");

        let (status, body) = send(
            &state,
            Method::GET,
            &format!("/api/graph/{id}/adjacency_list"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"adjacency_list": {"a": ["b"], "b": ["c"], "c": []}})
        );

        let (status, body) = send(
            &state,
            Method::GET,
            &format!("/api/graph/{id}/reverse_adjacency_list/"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"adjacency_list": {"a": [], "b": ["a"], "c": ["b"]}})
        );
    }

    #[tokio::test]
    async fn invalid_edge_is_bad_request() {
        let state = test_app().await;
        let payload = json!({
            "nodes": [{"name": "a"}, {"name": "b"}],
            "edges": [{"source": "a", "target": "c"}]
        });

        let (status, body) = send(&state, Method::POST, "/api/graph/", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_edge");
        assert!(
            body["detail"]
                .as_str()
                .expect("detail")
                .contains("Invalid edge")
        );
    }

    #[tokio::test]
    async fn missing_graph_is_not_found() {
        let state = test_app().await;

        for uri in [
            "/api/graph/777/",
            "/api/graph/777/adjacency_list/",
            "/api/graph/777/reverse_adjacency_list",
            "/api/graph/777/summary",
        ] {
            let (status, _) = send(&state, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }

        let (status, body) = send(&state, Method::DELETE, "/api/graph/777/node/a/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(
            body["detail"]
                .as_str()
                .expect("detail")
                .contains("Graph 777 not found")
        );
    }

    #[tokio::test]
    async fn delete_node_returns_no_content() {
        let state = test_app().await;
        let payload = json!({
            "nodes": [{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}],
            "edges": [
                {"source": "a", "target": "b"},
                {"source": "b", "target": "c"},
                {"source": "c", "target": "d"},
                {"source": "d", "target": "a"}
            ]
        });
        let (_, body) = send(&state, Method::POST, "/api/graph", Some(payload)).await;
        let id = body["id"].as_i64().expect("numeric id");

        let (status, body) =
            send(&state, Method::DELETE, &format!("/api/graph/{id}/node/b/"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (_, body) = send(&state, Method::GET, &format!("/api/graph/{id}"), None).await;
        assert_eq!(body["nodes"], json!([{"name": "a"}, {"name": "c"}, {"name": "d"}]));
        assert_eq!(
            body["edges"],
            json!([{"source": "c", "target": "d"}, {"source": "d", "target": "a"}])
        );

        let (status, body) =
            send(&state, Method::DELETE, &format!("/api/graph/{id}/node/b"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "node_not_found");
    }

    #[tokio::test]
    async fn rename_and_delete_graph() {
        let state = test_app().await;
        let (_, body) = send(&state, Method::POST, "/api/graph", Some(chain())).await;
        let id = body["id"].as_i64().expect("numeric id");

        let (status, body) = send(
            &state,
            Method::PATCH,
            &format!("/api/graph/{id}"),
            Some(json!({"name": "pipeline"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "pipeline");
        assert_eq!(body["node_count"], 3);
        assert_eq!(body["edge_count"], 2);

        let (status, _) = send(&state, Method::DELETE, &format!("/api/graph/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&state, Method::GET, &format!("/api/graph/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_and_health() {
        let state = test_app().await;
        let (status, body) = send(&state, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Welcome to the graph store");

        let (status, body) = send(&state, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }
}
