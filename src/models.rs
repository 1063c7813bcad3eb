//! Modelos de dominio: temas jerárquicos, trozos de texto y el grafo
//! persistido (nodos + aristas) que consume el visor del frontend.
//!
//! Los nombres de campo serializados (`id`, `label`, `position{x,y}`,
//! `style`, `source`, `target`) son el contrato con el editor: deben
//! sobrevivir intactos a un ida y vuelta JSON.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Origen del texto bruto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Plain,
    Pdf,
    Audio,
}

/// Texto bruto de una petición de generación. Sólo vive durante la petición.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub text: String,
    pub source: SourceKind,
}

impl RawDocument {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: SourceKind::Plain,
        }
    }
}

/// Trozo de texto acotado en tokens estimados.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub estimated_tokens: usize,
}

/// Longitud máxima de una etiqueta de nodo sintetizada a partir del título.
pub const MAX_LABEL_CHARS: usize = 30;

/// Recorta un título a una etiqueta de nodo.
pub fn short_label(title: &str) -> String {
    title.trim().chars().take(MAX_LABEL_CHARS).collect::<String>().trim_end().to_string()
}

/// Nodo del árbol de temas extraído por el modelo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Topic {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtopics: Vec<Topic>,
}

impl Topic {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtopics: Vec::new(),
        }
    }

    pub fn with_subtopics(title: impl Into<String>, subtopics: Vec<Topic>) -> Self {
        Self {
            title: title.into(),
            subtopics,
        }
    }

    /// Número total de temas del subárbol (incluido este).
    pub fn count(&self) -> usize {
        1 + self.subtopics.iter().map(Topic::count).sum::<usize>()
    }
}

/// Bosque de temas de un trozo (o del documento completo tras la fusión).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkSummary {
    pub topics: Vec<Topic>,
}

impl ChunkSummary {
    /// Elige la raíz del mapa: un único tema de primer nivel es la raíz;
    /// varios se agrupan bajo un tema sintético con el título del documento.
    /// Sin temas no hay raíz utilizable.
    pub fn into_root(self, document_title: &str) -> Option<Topic> {
        let mut topics = self.topics;
        match topics.len() {
            0 => None,
            1 => topics.pop(),
            _ => Some(Topic::with_subtopics(short_label(document_title), topics)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Estilo visual de un nodo. Los valores son CSS tal cual los escriba el
/// editor (`"200px"` o `200` valen igual); las claves desconocidas se
/// conservan en `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub id: String,
    pub label: String,
    /// Profundidad en el árbol (0 = concepto central). Los mapas editados
    /// a mano pueden no traerlo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
}

/// Unidad persistida: el grafo completo con posiciones calculadas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindMapStructure {
    pub nodes: Vec<MindMapNode>,
    pub edges: Vec<MindMapEdge>,
}

#[cfg(test)]
impl MindMapStructure {
    pub fn node(&self, id: &str) -> Option<&MindMapNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Documento persistido en el almacén.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapRecord {
    pub id: Uuid,
    pub title: String,
    pub content: MindMapStructure,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Datos necesarios para crear un documento nuevo.
#[derive(Debug, Clone)]
pub struct NewMindMap {
    pub title: String,
    pub content: MindMapStructure,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn structure_survives_json_round_trip_with_editor_keys() {
        let raw = json!({
            "nodes": [
                {
                    "id": "node-0",
                    "label": "Central",
                    "level": 0,
                    "position": {"x": 0.0, "y": 0.0},
                    "style": {"background": "red", "fontSize": "16px", "boxShadow": "none"}
                },
                {"id": "node-1", "label": "Hijo", "position": {"x": 10.5, "y": -3.0}}
            ],
            "edges": [
                {"id": "e1", "source": "node-0", "target": "node-1", "type": "smoothstep",
                 "style": {"stroke": "blue", "strokeWidth": 2.0}}
            ]
        });

        let parsed: MindMapStructure = serde_json::from_value(raw.clone()).unwrap();
        let style = parsed.nodes[0].style.as_ref().unwrap();
        assert_eq!(style.font_size, Some(json!("16px")));
        assert_eq!(style.extra.get("boxShadow"), Some(&json!("none")));
        assert_eq!(parsed.nodes[1].level, None);

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back, raw);
        let again: MindMapStructure = serde_json::from_value(back).unwrap();
        assert_eq!(again, parsed);
    }

    #[test]
    fn style_values_keep_their_json_type() {
        let raw = json!({
            "nodes": [
                {"id": "a", "label": "A", "position": {"x": 0.0, "y": 0.0},
                 "style": {"width": 200, "fontSize": 14, "padding": "12px 20px"}},
                {"id": "b", "label": "B", "position": {"x": 1.0, "y": 1.0}}
            ],
            "edges": [
                {"id": "e", "source": "a", "target": "b", "style": {"strokeWidth": "2"}}
            ]
        });

        let parsed: MindMapStructure = serde_json::from_value(raw.clone()).unwrap();
        let style = parsed.nodes[0].style.as_ref().unwrap();
        assert_eq!(style.width, Some(json!(200)));
        assert_eq!(style.font_size, Some(json!(14)));
        let edge_style = parsed.edges[0].style.as_ref().unwrap();
        assert_eq!(edge_style.stroke_width, Some(json!("2")));

        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn summary_root_selection() {
        assert_eq!(ChunkSummary::default().into_root("Doc"), None);

        let single = ChunkSummary {
            topics: vec![Topic::new("A")],
        };
        assert_eq!(single.into_root("Doc"), Some(Topic::new("A")));

        let many = ChunkSummary {
            topics: vec![Topic::new("A"), Topic::new("B")],
        };
        let root = many.into_root("Doc").unwrap();
        assert_eq!(root.title, "Doc");
        assert_eq!(root.subtopics.len(), 2);
        assert_eq!(root.count(), 3);

        let long_title = "Apuntes completos del curso de sistemas operativos";
        let grouped = ChunkSummary {
            topics: vec![Topic::new("A"), Topic::new("B")],
        }
        .into_root(long_title)
        .unwrap();
        assert_eq!(grouped.title.chars().count(), MAX_LABEL_CHARS);
        assert!(long_title.starts_with(&grouped.title));
    }

    #[test]
    fn record_uses_storage_field_names() {
        let record = MindMapRecord {
            id: Uuid::nil(),
            title: "t".into(),
            content: MindMapStructure::default(),
            user_id: "u".into(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("user_id").is_some());
        assert!(value.get("created_at").is_some());
        assert!(value.get("content").unwrap().get("nodes").is_some());
    }
}
