//! Extracción de la jerarquía de temas de un trozo con una llamada al LLM.
//!
//! La respuesta del modelo se trata como entrada no fiable: JSON inválido o
//! un tema sin `title` en cualquier nivel hacen fallar la extracción. No hay
//! reintentos en esta capa.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{MindMapError, Result};
use crate::llm::{strip_code_fences, Completer, CompletionRequest, CompletionStage};
use crate::models::{ChunkSummary, TextChunk};

const EXTRACTION_PREAMBLE: &str = r#"
Estás analizando la parte {part} de un documento. Extrae las ideas clave y
organízalas como una jerarquía de temas.
- Sé conciso y céntrate en las ideas principales y sus relaciones.
- No pases de 3 niveles de profundidad.
- Títulos breves (máximo 30 caracteres), en el idioma del texto.
La salida DEBE ser un único objeto JSON válido. No incluyas explicaciones, solo el JSON.
"#;

/// Esquema JSON de `{ topics: [{ title, subtopics? }] }`, generado a partir
/// de los tipos de dominio.
pub fn summary_schema() -> &'static str {
    static SCHEMA: OnceLock<String> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema = schemars::schema_for!(ChunkSummary);
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    })
}

/// Valida y convierte la respuesta del modelo en un [`ChunkSummary`].
pub fn parse_summary(response: &str) -> Result<ChunkSummary> {
    let json = strip_code_fences(response);
    let mut value: Value = serde_json::from_str(json)
        .map_err(|e| MindMapError::parse(format!("la respuesta no es JSON válido: {e}")))?;

    let topics = match value.get_mut("topics") {
        Some(Value::Array(topics)) => topics,
        Some(_) => return Err(MindMapError::parse("'topics' debe ser una lista")),
        None => return Err(MindMapError::parse("falta 'topics' en la respuesta")),
    };

    let mut issues = Vec::new();
    for (i, topic) in topics.iter_mut().enumerate() {
        check_topic(topic, &format!("topics[{i}]"), &mut issues);
    }
    if !issues.is_empty() {
        return Err(MindMapError::parse(issues.join("; ")));
    }

    serde_json::from_value(value).map_err(|e| MindMapError::parse(e.to_string()))
}

/// Recorre un tema y sus descendientes anotando los problemas. Un
/// `subtopics: null` se trata como hoja.
fn check_topic(topic: &mut Value, path: &str, issues: &mut Vec<String>) {
    let Some(obj) = topic.as_object_mut() else {
        issues.push(format!("{path} no es un objeto"));
        return;
    };
    let has_title = obj
        .get("title")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        issues.push(format!("{path}: falta 'title'"));
    }
    if obj.get("subtopics").is_some_and(Value::is_null) {
        obj.remove("subtopics");
    }
    match obj.get_mut("subtopics") {
        None => {}
        Some(Value::Array(children)) => {
            for (i, child) in children.iter_mut().enumerate() {
                check_topic(child, &format!("{path}.subtopics[{i}]"), issues);
            }
        }
        Some(_) => issues.push(format!("{path}: 'subtopics' debe ser una lista")),
    }
}

/// Extractor de temas por trozo. Sin estado mutable compartido: varias
/// extracciones pueden ejecutarse a la vez.
#[derive(Clone)]
pub struct TopicExtractor {
    completer: Arc<dyn Completer>,
}

impl TopicExtractor {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    /// Una llamada al modelo para el trozo `chunk.index`.
    pub async fn extract(&self, chunk: &TextChunk) -> Result<ChunkSummary> {
        let request = CompletionRequest {
            stage: CompletionStage::Extract {
                chunk_index: chunk.index,
            },
            preamble: EXTRACTION_PREAMBLE.replace("{part}", &(chunk.index + 1).to_string()),
            prompt: format!(
                "Analiza este texto y extrae los temas y subtemas en una estructura jerárquica:\n\n{}\n\nDevuelve el análisis con este esquema JSON exacto:\n{}",
                chunk.text,
                summary_schema()
            ),
            temperature: 0.3,
            max_tokens: 1000,
        };

        let response = self.completer.complete(request).await?;
        let summary = parse_summary(&response).inspect_err(|e| {
            warn!(
                "Respuesta inválida del modelo para el trozo {}: {}. Respuesta LLM: '{}'",
                chunk.index, e, response
            );
        })?;

        info!(
            "Trozo {} analizado: {} temas de primer nivel",
            chunk.index,
            summary.topics.len()
        );
        Ok(summary)
    }
}
