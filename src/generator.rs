//! Estrategias de generación de mapas mentales tras una única interfaz.
//!
//! Flujo por defecto (pipeline):
//!   1. Troceado del texto bajo el presupuesto de tokens.
//!   2. Extracción concurrente de temas, una llamada por trozo. Si falla
//!      cualquiera, falla la petición completa.
//!   3. Fusión de los resúmenes en el orden original de los trozos.
//!   4. Aplanado del árbol + layout radial + validación.
//!
//! Alternativa (una llamada): el modelo devuelve directamente nodos con
//! `level` y aristas; sólo queda el layout por niveles y la validación.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{info, warn};

use crate::chunker;
use crate::config::{AppConfig, GenerationStrategy};
use crate::error::{MindMapError, Result};
use crate::extractor::TopicExtractor;
use crate::layout;
use crate::llm::{strip_code_fences, Completer, CompletionRequest, CompletionStage};
use crate::merger::TopicMerger;
use crate::models::{ChunkSummary, MindMapStructure, TextChunk};
use crate::validator;

/// Título del nodo central cuando la petición no trae uno.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Nuevo mapa mental";

/// `texto → MindMapStructure`, independientemente de la estrategia.
#[async_trait]
pub trait MindMapGenerator: Send + Sync {
    async fn generate(&self, text: &str, title: &str) -> Result<MindMapStructure>;

    fn name(&self) -> &'static str;
}

/// Construye la estrategia configurada por defecto.
pub fn from_config(cfg: &AppConfig, completer: Arc<dyn Completer>) -> Arc<dyn MindMapGenerator> {
    match cfg.generation_strategy {
        GenerationStrategy::Pipeline => Arc::new(ChunkedGenerator::new(
            completer,
            cfg.max_chunk_tokens,
            cfg.level_spacing,
        )),
        GenerationStrategy::SingleCall => {
            Arc::new(SingleCallGenerator::new(completer, cfg.level_spacing))
        }
    }
}

// ---------------------------------------------------------------------
// PIPELINE: TROZOS → TEMAS → FUSIÓN
// ---------------------------------------------------------------------

/// Extracción por trozo + fusión. Es también lo que expone
/// `/summarize-chunks`.
#[derive(Clone)]
pub struct SummaryPipeline {
    extractor: TopicExtractor,
    merger: TopicMerger,
}

impl SummaryPipeline {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self {
            extractor: TopicExtractor::new(completer.clone()),
            merger: TopicMerger::new(completer),
        }
    }

    /// Lanza una extracción por trozo a la vez y espera a todas antes de
    /// fusionar. `try_join_all` conserva el orden de entrada.
    pub async fn summarize(&self, chunks: &[TextChunk]) -> Result<ChunkSummary> {
        if chunks.is_empty() {
            return Err(MindMapError::input("No se proporcionaron trozos de texto"));
        }

        info!("Procesando {} trozos...", chunks.len());
        let summaries = try_join_all(chunks.iter().map(|chunk| self.extractor.extract(chunk)))
            .await
            .inspect_err(|e| warn!("Falló la extracción de un trozo: {e}"))?;
        info!("Todos los trozos procesados, fusionando resúmenes...");

        self.merger.merge(summaries).await
    }

    /// Igual que [`SummaryPipeline::summarize`] partiendo de textos sueltos.
    pub async fn summarize_texts(&self, texts: &[String]) -> Result<ChunkSummary> {
        let chunks: Vec<TextChunk> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .enumerate()
            .map(|(index, text)| TextChunk {
                index,
                text: text.clone(),
                estimated_tokens: chunker::estimate_tokens(text),
            })
            .collect();
        self.summarize(&chunks).await
    }
}

/// Árbol de temas → grafo posicionado. Sin temas utilizables se devuelve el
/// mapa de reserva.
pub fn structure_from_summary(
    summary: ChunkSummary,
    title: &str,
    spacing: f64,
) -> Result<MindMapStructure> {
    match summary.into_root(title) {
        Some(root) => {
            let structure = layout::flatten_and_layout(&root, spacing);
            validator::validate(&structure)?;
            Ok(structure)
        }
        None => {
            warn!("El modelo no devolvió temas; se usa el mapa de reserva.");
            validator::fallback_structure(title, spacing)
        }
    }
}

pub struct ChunkedGenerator {
    pipeline: SummaryPipeline,
    max_chunk_tokens: usize,
    level_spacing: f64,
}

impl ChunkedGenerator {
    pub fn new(completer: Arc<dyn Completer>, max_chunk_tokens: usize, level_spacing: f64) -> Self {
        Self {
            pipeline: SummaryPipeline::new(completer),
            max_chunk_tokens,
            level_spacing,
        }
    }
}

#[async_trait]
impl MindMapGenerator for ChunkedGenerator {
    async fn generate(&self, text: &str, title: &str) -> Result<MindMapStructure> {
        let chunks = chunker::chunk_text(text, self.max_chunk_tokens)?;
        info!(
            "Texto dividido en {} trozos ({} tokens estimados)",
            chunks.len(),
            chunker::estimate_tokens(text)
        );

        let summary = self.pipeline.summarize(&chunks).await?;
        let structure = structure_from_summary(summary, title, self.level_spacing)?;
        info!(
            "Mapa mental generado: {} nodos, {} aristas",
            structure.nodes.len(),
            structure.edges.len()
        );
        Ok(structure)
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

// ---------------------------------------------------------------------
// UNA SOLA LLAMADA
// ---------------------------------------------------------------------

const SINGLE_CALL_PREAMBLE: &str = r#"
Eres un generador de mapas mentales que crea mapas jerárquicos y bien
organizados a partir de un texto. Sigue estas pautas:
1. Estructura jerárquica clara, con 3-4 niveles como máximo.
2. El tema principal es el nodo central (level 0).
3. Entre 4 y 6 ramas principales (level 1).
4. Nodos de nivel 2 sólo para subtemas importantes (3-4 por padre).
5. Nivel 3 sólo si hace falta (2-3 por padre).
6. Etiquetas concisas (máximo 30 caracteres), en el idioma del texto.

Devuelve ÚNICAMENTE un objeto JSON con esta estructura:
{
  "nodes": [
    { "id": "string", "label": "string", "level": 0, "parentId": "string opcional" }
  ],
  "edges": [
    { "id": "string", "source": "string", "target": "string" }
  ]
}
"#;

pub struct SingleCallGenerator {
    completer: Arc<dyn Completer>,
    level_spacing: f64,
}

impl SingleCallGenerator {
    pub fn new(completer: Arc<dyn Completer>, level_spacing: f64) -> Self {
        Self {
            completer,
            level_spacing,
        }
    }
}

#[async_trait]
impl MindMapGenerator for SingleCallGenerator {
    async fn generate(&self, text: &str, title: &str) -> Result<MindMapStructure> {
        if text.trim().is_empty() {
            return Err(MindMapError::input("No se proporcionó contenido"));
        }
        let tokens = chunker::estimate_tokens(text);
        if tokens > chunker::DEFAULT_MAX_CHUNK_TOKENS * 4 {
            warn!("Texto de {tokens} tokens estimados en una sola llamada; puede exceder el contexto del modelo");
        }

        let request = CompletionRequest {
            stage: CompletionStage::SingleCall,
            preamble: SINGLE_CALL_PREAMBLE.to_string(),
            prompt: text.to_string(),
            temperature: 0.3,
            max_tokens: 4000,
        };
        let response = self.completer.complete(request).await?;

        let raw: Value = serde_json::from_str(strip_code_fences(&response)).map_err(|e| {
            warn!("No se pudo parsear la respuesta del modelo: '{}'", response);
            MindMapError::parse(format!("la respuesta no es JSON válido: {e}"))
        })?;

        let empty = raw
            .get("nodes")
            .and_then(Value::as_array)
            .is_some_and(|nodes| nodes.is_empty());
        if empty {
            warn!("El modelo devolvió un mapa vacío; se usa el mapa de reserva.");
            return validator::fallback_structure(title, self.level_spacing);
        }

        let structure = layout::layout_leveled(&raw, self.level_spacing)?;
        info!(
            "Mapa mental generado en una llamada: {} nodos, {} aristas",
            structure.nodes.len(),
            structure.edges.len()
        );
        Ok(structure)
    }

    fn name(&self) -> &'static str {
        "single-call"
    }
}
