//! GraphNormalizer — raw backend records → canonical [`Node`]/[`Edge`].
//!
//! Raw records are loose JSON: fields may sit at the top level or inside a
//! `properties` object, `status` may be a scalar, a vector or a string, and
//! `bloom_qa_pairs` may be a list or a JSON-encoded string. Nothing here
//! fails; malformed input is coerced to safe defaults.
//!
//! ```text
//! raw nodes ──► id assignment ──► dedup by id ──► Node[]
//! raw edges ──► endpoint lookup ──► unique edge ids ──► Edge[]
//! ```

use hashbrown::HashSet;
use serde_json::{Map, Value as Json};

use crate::ident::IdAllocator;
use crate::model::*;

/// Normalize a raw graph export. Pure function over its inputs.
///
/// Nodes are deduplicated by id, keeping the first occurrence. Edges whose
/// endpoints are absent from the node set are kept; the cluster engine
/// filters them at display time.
pub fn normalize(raw_nodes: &[Json], raw_edges: &[Json]) -> (Vec<Node>, Vec<Edge>) {
    let mut seen = HashSet::with_capacity(raw_nodes.len());
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    let mut dropped = 0usize;

    for (index, record) in raw_nodes.iter().enumerate() {
        let node = normalize_node(record, index);
        if seen.insert(node.id.clone()) {
            nodes.push(node);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "duplicate node ids dropped during normalization");
    }

    let edges = normalize_edges(raw_edges);
    (nodes, edges)
}

/// Normalize one raw node record. `index` seeds the fallback id.
pub fn normalize_node(record: &Json, index: usize) -> Node {
    let fields = Fields::of(record);

    let uuid = fields.text("uuid");
    let id = uuid
        .clone()
        .or_else(|| fields.text("id"))
        .or_else(|| fields.text("node_name"))
        .unwrap_or_else(|| format!("node_{index}"));

    Node {
        uuid: uuid.unwrap_or_else(|| id.clone()),
        name: fields.text("node_name").or_else(|| fields.text("name")).unwrap_or_default(),
        description: fields.text("description").unwrap_or_default(),
        grade: fields.text("grade").unwrap_or_default(),
        subject: fields.text("subject").unwrap_or_default(),
        publisher: fields.text("publisher").unwrap_or_default(),
        status: MasteryVector::coerce(fields.get("status")),
        qa_pairs: parse_qa_pairs(fields.get("bloom_qa_pairs").or_else(|| fields.get("qa_pairs"))),
        id,
    }
}

/// Normalize raw edge records, giving every edge a unique id.
///
/// Missing ids are generated from the endpoints and relation; any collision
/// gets an incrementing `_N` suffix.
pub fn normalize_edges(raw_edges: &[Json]) -> Vec<Edge> {
    let mut ids = IdAllocator::new();
    raw_edges
        .iter()
        .map(|record| {
            let fields = Fields::of(record);
            let from = fields
                .text("start_uuid")
                .or_else(|| fields.text("from"))
                .unwrap_or_default();
            let to = fields
                .text("end_uuid")
                .or_else(|| fields.text("to"))
                .unwrap_or_default();
            let kind = RelationKind::parse(&fields.text("type").unwrap_or_default());
            let base = fields
                .text("id")
                .unwrap_or_else(|| format!("e_{from}_{kind}_{to}"));

            Edge {
                id: ids.allocate(&base),
                from,
                to,
                kind,
                description: fields.text("description").unwrap_or_default(),
            }
        })
        .collect()
}

/// Parse QA pairs from a native list or a JSON-encoded string.
/// Anything unparsable yields an empty list.
pub fn parse_qa_pairs(value: Option<&Json>) -> Vec<QaPair> {
    match value {
        Some(Json::Array(items)) => items.iter().filter_map(qa_pair).collect(),
        Some(Json::String(s)) => match serde_json::from_str::<Json>(s) {
            Ok(Json::Array(items)) => items.iter().filter_map(qa_pair).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn qa_pair(item: &Json) -> Option<QaPair> {
    let map = item.as_object()?;
    let text = |key: &str| map.get(key).and_then(scalar_text).unwrap_or_default();
    Some(QaPair {
        level: text("level"),
        question: text("question"),
        answer: text("answer"),
    })
}

/// Field lookup over a record and its nested `properties` object.
/// Nested values win.
struct Fields<'a> {
    top: Option<&'a Map<String, Json>>,
    props: Option<&'a Map<String, Json>>,
}

impl<'a> Fields<'a> {
    fn of(record: &'a Json) -> Self {
        let top = record.as_object();
        let props = top
            .and_then(|m| m.get("properties"))
            .and_then(Json::as_object);
        Self { top, props }
    }

    fn get(&self, key: &str) -> Option<&'a Json> {
        let present = |m: Option<&'a Map<String, Json>>| m.and_then(|m| m.get(key)).filter(|v| !v.is_null());
        present(self.props).or_else(|| present(self.top))
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_text).filter(|s| !s.is_empty())
    }
}

fn scalar_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
