//! Fusión de las jerarquías de varios trozos en una sola.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{MindMapError, Result};
use crate::extractor::{parse_summary, summary_schema};
use crate::llm::{Completer, CompletionRequest, CompletionStage};
use crate::models::ChunkSummary;

const MERGE_PREAMBLE: &str = r#"
Estás fusionando varias jerarquías de temas, extraídas de distintas partes de
un mismo documento, en una única estructura coherente.
- Combina los temas casi idénticos en uno solo.
- Conserva el anidamiento jerárquico y el orden de las partes.
La salida DEBE ser un único objeto JSON válido. No incluyas explicaciones, solo el JSON.
"#;

#[derive(Clone)]
pub struct TopicMerger {
    completer: Arc<dyn Completer>,
}

impl TopicMerger {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    /// Fusiona los resúmenes en el orden original de los trozos.
    ///
    /// Con un único resumen se devuelve tal cual, sin llamar al modelo. Una
    /// respuesta mal formada hace fallar la fusión completa.
    pub async fn merge(&self, mut summaries: Vec<ChunkSummary>) -> Result<ChunkSummary> {
        match summaries.len() {
            0 => return Err(MindMapError::input("no hay resúmenes que fusionar")),
            1 => return Ok(summaries.remove(0)),
            _ => {}
        }

        let payload = serde_json::to_string_pretty(&summaries)
            .map_err(|e| MindMapError::parse(format!("no se pudieron serializar los resúmenes: {e}")))?;

        info!("Fusionando {} jerarquías de temas...", summaries.len());
        let request = CompletionRequest {
            stage: CompletionStage::Merge,
            preamble: MERGE_PREAMBLE.to_string(),
            prompt: format!(
                "Estas son las jerarquías de temas de las distintas partes del documento, en orden. Fusiónalas en una sola estructura coherente:\n\n{}\n\nDevuelve la estructura fusionada con este esquema JSON exacto:\n{}",
                payload,
                summary_schema()
            ),
            temperature: 0.3,
            max_tokens: 1500,
        };

        let response = self.completer.complete(request).await?;
        let merged = parse_summary(&response).inspect_err(|e| {
            warn!("Respuesta de fusión inválida: {}. Respuesta LLM: '{}'", e, response);
        })?;

        info!("Fusión completada: {} temas de primer nivel", merged.topics.len());
        Ok(merged)
    }
}
