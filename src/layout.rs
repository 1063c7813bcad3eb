//! Motor de layout radial.
//!
//! Todos los nodos de un mismo nivel comparten un anillo centrado en el
//! origen global (no en su padre), repartidos a ángulos iguales empezando
//! "arriba" (-π/2). El radio es `nivel * separación`. El nivel 0 queda fijo
//! en el origen.
//!
//! Dos entradas posibles:
//!   - camino árbol: un [`Topic`] que se aplana en profundidad;
//!   - camino plano: nodos ya etiquetados con `level` + aristas, tal y como
//!     los devuelve la generación en una sola llamada.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{MindMapError, Result};
use crate::models::{EdgeStyle, MindMapEdge, MindMapNode, MindMapStructure, NodeStyle, Position, Topic};
use crate::validator;

/// Distancia radial entre niveles consecutivos.
pub const DEFAULT_LEVEL_SPACING: f64 = 250.0;

/// Posición del nodo `index` de `count` en el anillo de `level`.
pub fn radial_position(level: u32, index: usize, count: usize, spacing: f64) -> Position {
    if level == 0 || count == 0 {
        return Position::default();
    }
    let angle = index as f64 * (2.0 * PI / count as f64) - PI / 2.0;
    let radius = level as f64 * spacing;
    Position {
        x: radius * angle.cos(),
        y: radius * angle.sin(),
    }
}

/// Estilo derivado únicamente del nivel.
pub fn node_style(level: u32) -> NodeStyle {
    let root = level == 0;
    NodeStyle {
        background: Some(json!(if root { "hsl(var(--primary))" } else { "hsl(var(--background))" })),
        color: Some(json!(if root {
            "hsl(var(--primary-foreground))"
        } else {
            "hsl(var(--foreground))"
        })),
        border: Some(json!("1px solid hsl(var(--primary))")),
        border_radius: Some(json!("8px")),
        padding: Some(json!("12px 20px")),
        font_size: Some(json!(if root { "16px" } else { "14px" })),
        font_weight: Some(json!(if level <= 1 { "bold" } else { "normal" })),
        width: Some(json!("auto")),
        max_width: Some(json!("200px")),
        ..NodeStyle::default()
    }
}

/// Arista dirigida padre → hijo con la decoración del visor.
pub fn styled_edge(id: String, source: String, target: String) -> MindMapEdge {
    MindMapEdge {
        id,
        source,
        target,
        kind: Some("smoothstep".to_string()),
        animated: Some(false),
        style: Some(EdgeStyle {
            stroke: Some(json!("hsl(var(--primary))")),
            stroke_width: Some(json!(2)),
            ..EdgeStyle::default()
        }),
    }
}

fn leveled_node(id: String, label: String, level: u32) -> MindMapNode {
    MindMapNode {
        id,
        label,
        level: Some(level),
        position: Position::default(),
        style: Some(node_style(level)),
    }
}

/// Agrupa por nivel (conservando el orden de aparición) y asigna posiciones.
fn assign_positions(nodes: &mut [MindMapNode], spacing: f64) {
    let mut by_level: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if let Some(level) = node.level {
            by_level.entry(level).or_default().push(i);
        }
    }

    for (level, members) in by_level {
        let count = members.len();
        for (index, node_idx) in members.into_iter().enumerate() {
            nodes[node_idx].position = radial_position(level, index, count, spacing);
        }
    }
}

// ---------------------------------------------------------------------
// CAMINO ÁRBOL
// ---------------------------------------------------------------------

/// Aplana un árbol de temas en nodos `node-<n>` (preorden) y aristas
/// padre → hijo, y calcula el layout radial.
pub fn flatten_and_layout(root: &Topic, spacing: f64) -> MindMapStructure {
    let total = root.count();
    let mut structure = MindMapStructure {
        nodes: Vec::with_capacity(total),
        edges: Vec::with_capacity(total.saturating_sub(1)),
    };
    let mut counter = 0usize;
    walk(root, None, 0, &mut counter, &mut structure);
    assign_positions(&mut structure.nodes, spacing);
    structure
}

fn walk(
    topic: &Topic,
    parent: Option<&str>,
    level: u32,
    counter: &mut usize,
    out: &mut MindMapStructure,
) {
    let id = format!("node-{}", *counter);
    *counter += 1;

    out.nodes
        .push(leveled_node(id.clone(), topic.title.trim().to_string(), level));
    if let Some(parent_id) = parent {
        out.edges.push(styled_edge(
            format!("edge-{parent_id}-{id}"),
            parent_id.to_string(),
            id.clone(),
        ));
    }

    for child in &topic.subtopics {
        walk(child, Some(&id), level + 1, counter, out);
    }
}

// ---------------------------------------------------------------------
// CAMINO PLANO
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LeveledNode {
    id: String,
    label: String,
    #[serde(default)]
    level: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FlatEdge {
    id: String,
    source: String,
    target: String,
}

/// Posiciona una lista de nodos con `level` explícito y sus aristas.
///
/// Nunca se adivina un nivel: un nodo sin `level` o con una arista hacia un
/// id desconocido hace fallar la operación.
pub fn layout_leveled(candidate: &Value, spacing: f64) -> Result<MindMapStructure> {
    let issues = validator::shape_issues(candidate);
    if !issues.is_empty() {
        return Err(MindMapError::validation(&issues));
    }

    let nodes: Vec<LeveledNode> = serde_json::from_value(candidate["nodes"].clone())
        .map_err(|e| MindMapError::validation(&[format!("nodo inválido: {e}")]))?;
    let edges: Vec<FlatEdge> = serde_json::from_value(candidate["edges"].clone())
        .map_err(|e| MindMapError::validation(&[format!("arista inválida: {e}")]))?;

    let missing: Vec<String> = nodes
        .iter()
        .filter(|n| n.level.is_none())
        .map(|n| format!("el nodo '{}' no tiene nivel", n.id))
        .collect();
    if !missing.is_empty() {
        return Err(MindMapError::validation(&missing));
    }

    let roots = nodes.iter().filter(|n| n.level == Some(0)).count();
    if roots != 1 {
        return Err(MindMapError::validation(&[format!(
            "se esperaba exactamente un nodo de nivel 0 y hay {roots}"
        )]));
    }

    let mut structure = MindMapStructure {
        nodes: nodes
            .into_iter()
            .map(|n| leveled_node(n.id, n.label, n.level.unwrap_or_default()))
            .collect(),
        edges: edges
            .into_iter()
            .map(|e| styled_edge(e.id, e.source, e.target))
            .collect(),
    };
    assign_positions(&mut structure.nodes, spacing);

    validator::validate(&structure)?;
    Ok(structure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    fn distance(p: Position) -> f64 {
        (p.x * p.x + p.y * p.y).sqrt()
    }

    fn angle(p: Position) -> f64 {
        p.y.atan2(p.x)
    }

    #[test]
    fn first_sibling_points_up() {
        let p = radial_position(1, 0, 4, 100.0);
        assert!(p.x.abs() < EPS);
        assert!((p.y + 100.0).abs() < EPS);

        let p = radial_position(2, 1, 4, 100.0);
        assert!((p.x - 200.0).abs() < EPS);
        assert!(p.y.abs() < EPS);

        assert_eq!(radial_position(0, 3, 7, 100.0), Position::default());
    }

    #[test]
    fn two_children_are_opposite_on_first_ring() {
        let tree = Topic::with_subtopics("A", vec![Topic::new("B"), Topic::new("C")]);
        let map = flatten_and_layout(&tree, DEFAULT_LEVEL_SPACING);

        let ids: Vec<_> = map.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["node-0", "node-1", "node-2"]);
        let labels: Vec<_> = map.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        let levels: Vec<_> = map.nodes.iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![Some(0), Some(1), Some(1)]);
        assert_eq!(map.nodes[0].position, Position::default());

        let pairs: Vec<_> = map
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("node-0", "node-1"), ("node-0", "node-2")]);

        let b = map.nodes[1].position;
        let c = map.nodes[2].position;
        assert!((distance(b) - DEFAULT_LEVEL_SPACING).abs() < EPS);
        assert!((distance(c) - DEFAULT_LEVEL_SPACING).abs() < EPS);
        let separation = (angle(b) - angle(c)).abs();
        assert!((separation - PI).abs() < EPS);
    }

    #[test]
    fn flattened_edges_descend_exactly_one_level() {
        let tree = Topic::with_subtopics(
            "raíz",
            vec![
                Topic::with_subtopics(
                    "a",
                    vec![Topic::new("a1"), Topic::with_subtopics("a2", vec![Topic::new("a2x")])],
                ),
                Topic::new("b"),
                Topic::with_subtopics("c", vec![Topic::new("c1")]),
            ],
        );
        let map = flatten_and_layout(&tree, 150.0);
        assert_eq!(map.nodes.len(), tree.count());
        assert_eq!(map.edges.len(), tree.count() - 1);

        for edge in &map.edges {
            let parent = map.node(&edge.source).unwrap().level.unwrap();
            let child = map.node(&edge.target).unwrap().level.unwrap();
            assert_eq!(child, parent + 1);
        }
        for node in &map.nodes {
            let expected = node.level.unwrap() as f64 * 150.0;
            assert!((distance(node.position) - expected).abs() < 1e-6);
        }
        assert_eq!(map.nodes.iter().filter(|n| n.level == Some(0)).count(), 1);
        validator::validate(&map).unwrap();
    }

    #[test]
    fn style_depends_only_on_level() {
        assert_eq!(node_style(0).font_size, Some(json!("16px")));
        assert_eq!(node_style(1).font_weight, Some(json!("bold")));
        assert_eq!(node_style(2).font_weight, Some(json!("normal")));
        assert_eq!(node_style(3), node_style(7));
    }

    #[test]
    fn leveled_nodes_are_placed_per_ring() {
        let raw = json!({
            "nodes": [
                {"id": "root", "label": "Central", "level": 0},
                {"id": "a", "label": "A", "level": 1, "parentId": "root"},
                {"id": "b", "label": "B", "level": 1, "parentId": "root"},
                {"id": "a1", "label": "A1", "level": 2, "parentId": "a"}
            ],
            "edges": [
                {"id": "e1", "source": "root", "target": "a"},
                {"id": "e2", "source": "root", "target": "b"},
                {"id": "e3", "source": "a", "target": "a1"}
            ]
        });
        let map = layout_leveled(&raw, 100.0).unwrap();
        assert_eq!(map.nodes.len(), 4);
        assert_eq!(map.node("root").unwrap().position, Position::default());
        let a1 = map.node("a1").unwrap().position;
        assert!(a1.x.abs() < EPS && (a1.y + 200.0).abs() < EPS);
        assert_eq!(map.edges[0].kind.as_deref(), Some("smoothstep"));
    }

    #[test]
    fn leveled_node_without_level_is_rejected() {
        let raw = json!({
            "nodes": [
                {"id": "root", "label": "Central", "level": 0},
                {"id": "a", "label": "A"}
            ],
            "edges": [{"id": "e1", "source": "root", "target": "a"}]
        });
        let err = layout_leveled(&raw, 100.0).unwrap_err();
        assert!(matches!(err, MindMapError::StructureValidation(ref m) if m.contains("'a'")));
    }

    #[test]
    fn leveled_edge_to_unknown_node_is_rejected() {
        let raw = json!({
            "nodes": [{"id": "root", "label": "Central", "level": 0}],
            "edges": [{"id": "e1", "source": "root", "target": "fantasma"}]
        });
        let err = layout_leveled(&raw, 100.0).unwrap_err();
        assert!(matches!(err, MindMapError::StructureValidation(ref m) if m.contains("fantasma")));
    }

    #[test]
    fn leveled_structure_needs_a_single_root() {
        let raw = json!({
            "nodes": [
                {"id": "r1", "label": "Uno", "level": 0},
                {"id": "r2", "label": "Dos", "level": 0}
            ],
            "edges": []
        });
        assert!(matches!(
            layout_leveled(&raw, 100.0),
            Err(MindMapError::StructureValidation(_))
        ));
    }
}
