//! Validación del grafo `{nodes, edges}`.
//!
//! Un único validador con dos puntos de uso: al consumir la respuesta de un
//! modelo (JSON no fiable) y antes de sobrescribir un mapa editado por el
//! usuario. Nunca corrige nada en silencio; todos los problemas encontrados
//! se devuelven juntos en un `StructureValidation`.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{MindMapError, Result};
use crate::layout;
use crate::models::{short_label, MindMapStructure, Topic};

/// Etiqueta del nodo central del mapa de reserva cuando no hay título.
const FALLBACK_ROOT_LABEL: &str = "Mapa mental";

fn non_empty_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Comprueba forma e integridad referencial sobre JSON crudo.
pub fn shape_issues(candidate: &Value) -> Vec<String> {
    let mut issues = Vec::new();

    if !candidate.is_object() {
        issues.push("se esperaba un objeto con 'nodes' y 'edges'".to_string());
        return issues;
    }

    let nodes = match candidate.get("nodes") {
        None => {
            issues.push("falta 'nodes'".to_string());
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            issues.push("'nodes' debe ser una lista".to_string());
            None
        }
    };
    let edges = match candidate.get("edges") {
        None => {
            issues.push("falta 'edges'".to_string());
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            issues.push("'edges' debe ser una lista".to_string());
            None
        }
    };

    let mut ids = HashSet::new();
    for (i, node) in nodes.into_iter().flatten().enumerate() {
        if !node.is_object() {
            issues.push(format!("nodes[{i}] no es un objeto"));
            continue;
        }
        match non_empty_str(node, "id") {
            Some(id) => {
                ids.insert(id);
            }
            None => issues.push(format!("nodes[{i}]: falta 'id'")),
        }
        if non_empty_str(node, "label").is_none() {
            issues.push(format!("nodes[{i}]: falta 'label'"));
        }
    }

    for (i, edge) in edges.into_iter().flatten().enumerate() {
        if !edge.is_object() {
            issues.push(format!("edges[{i}] no es un objeto"));
            continue;
        }
        if non_empty_str(edge, "id").is_none() {
            issues.push(format!("edges[{i}]: falta 'id'"));
        }
        for end in ["source", "target"] {
            match non_empty_str(edge, end) {
                None => issues.push(format!("edges[{i}]: falta '{end}'")),
                Some(id) if nodes.is_some() && !ids.contains(id) => issues.push(format!(
                    "edges[{i}]: '{end}' referencia un nodo inexistente: {id}"
                )),
                Some(_) => {}
            }
        }
    }

    issues
}

/// Invariantes del grafo tipado: ids únicos y no vacíos, extremos
/// existentes, sin bucles ni aristas duplicadas.
pub fn validate(structure: &MindMapStructure) -> Result<()> {
    let mut issues = Vec::new();
    let mut ids = HashSet::new();

    for node in &structure.nodes {
        if node.id.trim().is_empty() {
            issues.push("nodo con 'id' vacío".to_string());
            continue;
        }
        if !ids.insert(node.id.as_str()) {
            issues.push(format!("id de nodo duplicado: {}", node.id));
        }
        if node.label.trim().is_empty() {
            issues.push(format!("el nodo '{}' no tiene 'label'", node.id));
        }
    }

    let mut edge_ids = HashSet::new();
    let mut pairs = HashSet::new();
    for edge in &structure.edges {
        if edge.id.trim().is_empty() {
            issues.push("arista con 'id' vacío".to_string());
        } else if !edge_ids.insert(edge.id.as_str()) {
            issues.push(format!("id de arista duplicado: {}", edge.id));
        }
        for end in [&edge.source, &edge.target] {
            if !ids.contains(end.as_str()) {
                issues.push(format!(
                    "la arista '{}' referencia un nodo inexistente: {}",
                    edge.id, end
                ));
            }
        }
        if edge.source == edge.target {
            issues.push(format!("la arista '{}' es un bucle", edge.id));
        }
        if !pairs.insert((edge.source.as_str(), edge.target.as_str())) {
            issues.push(format!(
                "arista repetida {} -> {}",
                edge.source, edge.target
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(MindMapError::validation(&issues))
    }
}

/// Valida JSON no fiable y lo convierte en un grafo tipado.
pub fn validate_value(candidate: &Value) -> Result<MindMapStructure> {
    let issues = shape_issues(candidate);
    if !issues.is_empty() {
        return Err(MindMapError::validation(&issues));
    }

    let structure: MindMapStructure = serde_json::from_value(candidate.clone())
        .map_err(|e| MindMapError::validation(&[e.to_string()]))?;
    validate(&structure)?;
    Ok(structure)
}

/// Mapa de reserva de 3 nodos para salidas del modelo sin temas
/// utilizables. Se construye de cero y pasa por la validación.
pub fn fallback_structure(title: &str, spacing: f64) -> Result<MindMapStructure> {
    let root_label = match short_label(title) {
        t if t.is_empty() => FALLBACK_ROOT_LABEL.to_string(),
        t => t,
    };
    let tree = Topic::with_subtopics(
        root_label,
        vec![Topic::new("Sin temas reconocibles"), Topic::new("Revisa el texto")],
    );
    let structure = layout::flatten_and_layout(&tree, spacing);
    validate(&structure)?;
    Ok(structure)
}
