//! Persistencia de mapas mentales.
//!
//! El contenido se revalida antes de cada escritura, así lo persistido
//! siempre cumple los invariantes del grafo. Sin control de versiones: la
//! última escritura gana.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::{AppConfig, StorageBackend};
use crate::error::{MindMapError, Result};
use crate::models::{MindMapRecord, MindMapStructure, NewMindMap};
use crate::neo4j_client::Neo4jStore;
use crate::validator;

#[async_trait]
pub trait MindMapStore: Send + Sync {
    /// Guarda un registro ya construido.
    async fn insert(&self, record: MindMapRecord) -> Result<()>;

    /// Sobrescribe el contenido (y opcionalmente el título) de un registro.
    async fn replace(
        &self,
        id: Uuid,
        title: Option<String>,
        content: MindMapStructure,
    ) -> Result<MindMapRecord>;

    async fn get(&self, id: Uuid) -> Result<MindMapRecord>;

    /// Registros más recientes primero, opcionalmente de un solo usuario.
    async fn list(&self, user_id: Option<&str>) -> Result<Vec<MindMapRecord>>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    fn backend(&self) -> &'static str;

    /// Comprueba que el almacén responde.
    async fn health(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, new: NewMindMap) -> Result<MindMapRecord> {
        validator::validate(&new.content)?;
        let record = MindMapRecord {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            user_id: new.user_id,
            created_at: Utc::now(),
        };
        self.insert(record.clone()).await?;
        info!(
            "Mapa mental '{}' guardado ({} nodos) con id {}",
            record.title,
            record.content.nodes.len(),
            record.id
        );
        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        title: Option<String>,
        content: MindMapStructure,
    ) -> Result<MindMapRecord> {
        validator::validate(&content)?;
        let record = self.replace(id, title, content).await?;
        info!("Mapa mental {} actualizado", record.id);
        Ok(record)
    }
}

/// Construye el almacén configurado.
pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Arc<dyn MindMapStore>> {
    match cfg.storage_backend {
        StorageBackend::Memory => {
            info!("Usando almacenamiento en memoria (los mapas se pierden al reiniciar).");
            Ok(Arc::new(MemoryStore::default()))
        }
        StorageBackend::Neo4j => {
            let neo4j = cfg
                .neo4j
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Falta la configuración de Neo4j"))?;
            let store = Neo4jStore::connect(neo4j).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, MindMapRecord>>,
}

#[async_trait]
impl MindMapStore for MemoryStore {
    async fn insert(&self, record: MindMapRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn replace(
        &self,
        id: Uuid,
        title: Option<String>,
        content: MindMapStructure,
    ) -> Result<MindMapRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| MindMapError::NotFound(format!("mapa mental {id}")))?;
        if let Some(title) = title {
            record.title = title;
        }
        record.content = content;
        Ok(record.clone())
    }

    async fn get(&self, id: Uuid) -> Result<MindMapRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| MindMapError::NotFound(format!("mapa mental {id}")))
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<MindMapRecord>> {
        let mut records: Vec<MindMapRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| user_id.map_or(true, |u| r.user_id == u))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| MindMapError::NotFound(format!("mapa mental {id}")))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
