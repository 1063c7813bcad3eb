//! Almacén de mapas mentales sobre Neo4j: un nodo `(:MindMap)` por
//! documento, con el grafo serializado como JSON en `content`.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Row};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::config::Neo4jConfig;
use crate::error::{MindMapError, Result};
use crate::models::{MindMapRecord, MindMapStructure};
use crate::store::MindMapStore;

const RETURN_FIELDS: &str = "RETURN m.id AS id, m.title AS title, m.content AS content, \
                             m.user_id AS user_id, m.created_at AS created_at";

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub async fn connect(cfg: &Neo4jConfig) -> AnyResult<Self> {
        let url = Url::parse(&cfg.uri)?;
        let host = url.host_str().unwrap_or("localhost");
        let port = url.port().unwrap_or(7687);
        let addr = format!("{host}:{port}");

        info!("Conectando a Neo4j en {addr}...");
        let graph = Graph::new(&addr, &cfg.user, &cfg.password).await?;
        info!("Conexión a Neo4j OK");
        Ok(Self { graph })
    }

    /// Crea el constraint de unicidad sobre `:MindMap(id)`.
    pub async fn ensure_schema(&self) -> AnyResult<()> {
        self.graph
            .run(query(
                "CREATE CONSTRAINT mindmap_id IF NOT EXISTS
                 FOR (m:MindMap)
                 REQUIRE m.id IS UNIQUE",
            ))
            .await?;
        info!("Esquema de Neo4j asegurado (constraint de :MindMap creado).");
        Ok(())
    }

    async fn fetch(&self, cypher: &str, id: Uuid) -> Result<Option<MindMapRecord>> {
        let mut cursor = self
            .graph
            .execute(query(cypher).param("id", id.to_string()))
            .await?;
        match cursor.next().await? {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn field(row: &Row, key: &str) -> Result<String> {
    row.get::<String>(key)
        .ok_or_else(|| MindMapError::persistence(format!("Falta campo '{key}' en resultado de Neo4j")))
}

fn record_from_row(row: &Row) -> Result<MindMapRecord> {
    let id = Uuid::parse_str(&field(row, "id")?)
        .map_err(|e| MindMapError::persistence(format!("id inválido en Neo4j: {e}")))?;
    let content: MindMapStructure = serde_json::from_str(&field(row, "content")?)
        .map_err(|e| MindMapError::persistence(format!("contenido corrupto en Neo4j: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&field(row, "created_at")?)
        .map_err(|e| MindMapError::persistence(format!("fecha inválida en Neo4j: {e}")))?
        .with_timezone(&Utc);

    Ok(MindMapRecord {
        id,
        title: field(row, "title")?,
        content,
        user_id: field(row, "user_id")?,
        created_at,
    })
}

fn content_json(content: &MindMapStructure) -> Result<String> {
    serde_json::to_string(content).map_err(|e| MindMapError::persistence(e.to_string()))
}

#[async_trait]
impl MindMapStore for Neo4jStore {
    async fn insert(&self, record: MindMapRecord) -> Result<()> {
        self.graph
            .run(
                query(
                    "CREATE (m:MindMap {id: $id, title: $title, content: $content,
                                        user_id: $user_id, created_at: $created_at})",
                )
                .param("id", record.id.to_string())
                .param("title", record.title.clone())
                .param("content", content_json(&record.content)?)
                .param("user_id", record.user_id.clone())
                .param("created_at", record.created_at.to_rfc3339()),
            )
            .await?;
        Ok(())
    }

    async fn replace(
        &self,
        id: Uuid,
        title: Option<String>,
        content: MindMapStructure,
    ) -> Result<MindMapRecord> {
        let set_title = if title.is_some() { ", m.title = $title" } else { "" };
        let cypher = format!(
            "MATCH (m:MindMap {{id: $id}}) SET m.content = $content{set_title} {RETURN_FIELDS}"
        );

        let mut q = query(&cypher)
            .param("id", id.to_string())
            .param("content", content_json(&content)?);
        if let Some(title) = title {
            q = q.param("title", title);
        }

        let mut cursor = self.graph.execute(q).await?;
        match cursor.next().await? {
            Some(row) => record_from_row(&row),
            None => Err(MindMapError::NotFound(format!("mapa mental {id}"))),
        }
    }

    async fn get(&self, id: Uuid) -> Result<MindMapRecord> {
        let cypher = format!("MATCH (m:MindMap {{id: $id}}) {RETURN_FIELDS}");
        self.fetch(&cypher, id)
            .await?
            .ok_or_else(|| MindMapError::NotFound(format!("mapa mental {id}")))
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<MindMapRecord>> {
        let q = match user_id {
            Some(user) => query(&format!(
                "MATCH (m:MindMap) WHERE m.user_id = $user_id {RETURN_FIELDS} ORDER BY created_at DESC"
            ))
            .param("user_id", user.to_string()),
            None => query(&format!(
                "MATCH (m:MindMap) {RETURN_FIELDS} ORDER BY created_at DESC"
            )),
        };

        let mut cursor = self.graph.execute(q).await?;
        let mut records = Vec::new();
        while let Some(row) = cursor.next().await? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut cursor = self
            .graph
            .execute(
                query("MATCH (m:MindMap {id: $id}) WITH m, m.id AS id DETACH DELETE m RETURN id")
                    .param("id", id.to_string()),
            )
            .await?;
        match cursor.next().await? {
            Some(_) => Ok(()),
            None => Err(MindMapError::NotFound(format!("mapa mental {id}"))),
        }
    }

    fn backend(&self) -> &'static str {
        "neo4j"
    }

    async fn health(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }
}
