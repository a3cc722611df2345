use std::borrow::Cow;

use anyhow::anyhow;

use crate::models::GraphId;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    InvalidEdge,
    InvalidReference,
    NotFound,
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: Cow<'static, str>,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn database(public: impl Into<Cow<'static, str>>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Database,
            code: "database_error",
            public: public.into(),
            source,
        }
    }

    pub fn invalid_edge(source_name: &str, target_name: &str) -> Self {
        Self {
            kind: ErrorKind::InvalidEdge,
            code: "invalid_edge",
            public: format!(
                "Invalid edge: vertex not found for source={} or target={}",
                source_name, target_name
            )
            .into(),
            source: anyhow!(
                "edge {} -> {} references an undeclared node",
                source_name,
                target_name
            ),
        }
    }

    pub fn invalid_reference(public: impl Into<Cow<'static, str>>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidReference,
            code: "invalid_reference",
            public: public.into(),
            source,
        }
    }

    pub fn not_found(
        code: &'static str,
        public: impl Into<Cow<'static, str>>,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code,
            public: public.into(),
            source,
        }
    }

    pub fn graph_not_found(graph_id: GraphId) -> Self {
        Self::not_found(
            "graph_not_found",
            format!("Graph {} not found", graph_id),
            anyhow!("graph {} does not exist", graph_id),
        )
    }

    pub fn node_not_found(graph_id: GraphId, name: &str) -> Self {
        Self::not_found(
            "node_not_found",
            format!("Node {} not found", name),
            anyhow!("graph {} has no vertex named {:?}", graph_id, name),
        )
    }
}

impl std::fmt::Display for LibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.public)
    }
}

impl std::error::Error for LibError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl From<sqlx::Error> for LibError {
    fn from(value: sqlx::Error) -> Self {
        Self::database("Database request failed", anyhow!(value))
    }
}

impl From<sqlx::migrate::MigrateError> for LibError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::database("Database migration failed", anyhow!(value))
    }
}
